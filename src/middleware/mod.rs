//! Handlers, middleware and the chain that runs them.
//!
//! A chain is an ordered list of middleware ending in one terminal handler.
//! Each middleware receives a [`Next`] cursor over the rest of the chain:
//! calling [`Next::run`] proceeds, dropping it short-circuits and whatever the
//! response holds at that point is sent.
//!
//! ```ignore
//! let auth = from_fn(|req, res, next| {
//!     if req.header("Authorization").is_none() {
//!         res.set_status(StatusCode::Unauthorized);
//!         return Ok(());
//!     }
//!     next.run(req, res)
//! });
//! ```

use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::Response;

/// Outcome of a handler or middleware. An `Err` aborts the chain and is
/// answered with a 500.
pub type HandlerResult = anyhow::Result<()>;

/// Terminal route function.
pub trait Handler: Send + Sync {
    fn call(&self, req: &Request, res: &mut Response) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync,
{
    fn call(&self, req: &Request, res: &mut Response) -> HandlerResult {
        self(req, res)
    }
}

pub trait Middleware: Send + Sync {
    fn handle(&self, req: &Request, res: &mut Response, next: Next<'_>) -> HandlerResult;
}

impl<F> Middleware for F
where
    F: Fn(&Request, &mut Response, Next<'_>) -> HandlerResult + Send + Sync,
{
    fn handle(&self, req: &Request, res: &mut Response, next: Next<'_>) -> HandlerResult {
        self(req, res, next)
    }
}

/// Wraps a closure as shared middleware.
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&Request, &mut Response, Next<'_>) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a shared handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Cursor over the part of the chain that has not run yet.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Runs the next middleware, or the terminal handler once the
    /// middleware list is exhausted.
    pub fn run(self, req: &Request, res: &mut Response) -> HandlerResult {
        match self.remaining.split_first() {
            Some((current, rest)) => current.handle(
                req,
                res,
                Next {
                    remaining: rest,
                    handler: self.handler,
                },
            ),
            None => self.handler.call(req, res),
        }
    }
}

/// Compiled middleware order for one route: global first, then route-scoped,
/// each group in registration order.
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn build(global: &[Arc<dyn Middleware>], route: &[Arc<dyn Middleware>]) -> Self {
        Self {
            layers: global.iter().chain(route).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs the chain with `handler` at the end.
    pub fn execute(&self, req: &Request, res: &mut Response, handler: &dyn Handler) -> HandlerResult {
        Next {
            remaining: &self.layers,
            handler,
        }
        .run(req, res)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("layers", &self.layers.len()).finish()
    }
}
