//! Route table and the path-pattern grammar.
//!
//! Patterns are made of literal segments and typed placeholders:
//!
//! ```text
//! /users/<int:id>        int, coerced to i64
//! /hello/<name>          string (the default type)
//! /files/<path:rest>     greedy, must be the last segment
//! ```
//!
//! `float` and `uuid` placeholders are also understood. A placeholder whose
//! value fails its type predicate does not match, so resolution falls through
//! to the next candidate instead of failing.

pub mod pattern;
pub mod table;

use thiserror::Error;

use crate::http::request::Method;

pub use pattern::{BuildError, ParamType, ParamValue, PathParams, RoutePattern};
pub use table::{RouteEntry, RouteMatch, RouteTable};

/// Startup-time registration failures. These are fatal: an application with
/// a bad route table never starts serving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route conflict: {method} {pattern} overlaps {existing}")]
    Conflict {
        method: Method,
        pattern: String,
        existing: String,
    },

    #[error("route name '{0}' is already registered")]
    DuplicateName(String),

    #[error("resource '{0}' has no methods")]
    EmptyResource(String),
}

/// Request-time routing outcomes other than a match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no route matches the request path")]
    NotFound,

    #[error("path exists but does not accept this method")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error("no route named '{0}'")]
    UnknownRouteName(String),

    #[error("route '{route}' needs a value for '{param}'")]
    MissingParameter { route: String, param: String },

    #[error("route '{route}' cannot take '{value}' for '{param}'")]
    InvalidParameter {
        route: String,
        param: String,
        value: String,
    },
}
