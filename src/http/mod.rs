//! HTTP/1.1 protocol layer.
//!
//! # Architecture
//!
//! - **`headers`**: insertion-ordered, case-insensitive header map
//! - **`request`**: request representation, query strings and body helpers
//! - **`response`**: response representation, status codes, builder and helpers
//! - **`parser`**: decodes one request from a byte buffer
//! - **`writer`**: encodes a response (fixed length or chunked) onto a stream
//! - **`connection`**: the per-connection request/response state machine
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌───────────────────┐
//!        │  AwaitingRequest  │ ← read + parse; incomplete input reads again
//!        └──────┬────────────┘
//!               │ request parsed          (malformed → 400, then Closed)
//!               ▼
//!        ┌───────────────────┐
//!        │    Dispatching    │ ← route, middleware chain, handler
//!        └──────┬────────────┘
//!               │ response ready
//!               ▼
//!        ┌───────────────────┐
//!        │    Responding     │ ← encode and write
//!        └──────┬────────────┘
//!               ├─ keep-alive → AwaitingRequest (same connection)
//!               └─ close / idle timeout / write failure → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use live_rocket::{App, Config, http::connection::Connection};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Arc::new(App::builder().get("/", |_, res| { res.send("hi"); Ok(()) }).build()?);
//!     let config = Arc::new(Config::default());
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (socket, addr) = listener.accept().await?;
//!         let (app, config) = (app.clone(), config.clone());
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, addr.to_string(), app, config);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod parser;
pub mod connection;
pub mod writer;
