//! live_rocket - a small HTTP/1.1 web stack on raw sockets
//!
//! Request pipeline: listener → connection → codec → route table →
//! middleware chain → handler → codec.

pub mod app;
pub mod config;
pub mod http;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod template;

pub use app::{App, AppBuilder, Resource, Route};
pub use config::{Config, Limits};
pub use http::headers::Headers;
pub use http::request::{Method, Request, Version};
pub use http::response::{Body, Response, ResponseBuilder, StatusCode};
pub use middleware::{Handler, HandlerResult, Middleware, Next, from_fn, handler_fn};
pub use routing::{ParamValue, PathParams};
pub use server::Server;
pub use template::{Render, Templates};
