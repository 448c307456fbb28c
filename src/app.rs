//! Application assembly.
//!
//! All mutation happens on [`AppBuilder`] before serving starts. `build`
//! compiles the route table and every route's middleware chain into an
//! [`App`], which is then shared read-only (behind an `Arc`) by every
//! connection.

use std::sync::Arc;

use tracing::{error, info};

use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::middleware::{Chain, Handler, HandlerResult, Middleware};
use crate::routing::{RegistrationError, RouteError, RouteTable};

/// Registration-time description of one route.
pub struct Route {
    method: Method,
    pattern: String,
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
    name: Option<String>,
}

impl Route {
    pub fn new<H>(method: Method, pattern: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        Self::with_handler(method, pattern, Arc::new(handler))
    }

    pub fn with_handler(method: Method, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            handler,
            middleware: Vec::new(),
            name: None,
        }
    }

    pub fn get<H>(pattern: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(Method::GET, pattern, handler)
    }

    pub fn post<H>(pattern: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(Method::POST, pattern, handler)
    }

    /// Name used for reverse lookup (`url_for`, `redirect_to_route`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Route-scoped middleware; runs after all global middleware.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// Several methods served under one pattern, sharing route middleware.
///
/// ```ignore
/// App::builder().resource(
///     Resource::new("/items/<int:id>")
///         .get(show)
///         .put(replace)
///         .delete(remove)
///         .middleware(auth),
/// )
/// ```
pub struct Resource {
    pattern: String,
    handlers: Vec<(Method, Arc<dyn Handler>)>,
    middleware: Vec<Arc<dyn Middleware>>,
    name: Option<String>,
}

macro_rules! resource_methods {
    ($($fn_name:ident => $method:expr),* $(,)?) => {
        $(
            pub fn $fn_name<H>(mut self, handler: H) -> Self
            where
                H: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
            {
                let handler: Arc<dyn Handler> = Arc::new(handler);
                self.handlers.push(($method, handler));
                self
            }
        )*
    };
}

impl Resource {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            handlers: Vec::new(),
            middleware: Vec::new(),
            name: None,
        }
    }

    resource_methods! {
        get => Method::GET,
        post => Method::POST,
        put => Method::PUT,
        patch => Method::PATCH,
        delete => Method::DELETE,
    }

    /// Runs for every method of the resource, after global middleware.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Reverse-lookup name; attached to the first registered method.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

macro_rules! method_shorthands {
    ($($fn_name:ident => $method:expr),* $(,)?) => {
        $(
            pub fn $fn_name<H>(self, pattern: &str, handler: H) -> Self
            where
                H: Fn(&Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
            {
                self.route(Route::new($method, pattern, handler))
            }
        )*
    };
}

/// Collects global middleware and routes. Registration errors are kept and
/// reported by [`AppBuilder::build`], so a bad table never starts serving.
#[derive(Default)]
pub struct AppBuilder {
    table: RouteTable,
    global: Vec<Arc<dyn Middleware>>,
    errors: Vec<RegistrationError>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global middleware, run for every matched route in registration order.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.global.push(middleware);
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        if let Err(e) = self.table.register(
            route.method,
            &route.pattern,
            route.handler,
            route.middleware,
            route.name,
        ) {
            self.errors.push(e);
        }
        self
    }

    /// Registers every method of `resource` under its pattern.
    pub fn resource(mut self, resource: Resource) -> Self {
        let Resource {
            pattern,
            handlers,
            middleware,
            mut name,
        } = resource;

        if handlers.is_empty() {
            self.errors.push(RegistrationError::EmptyResource(pattern));
            return self;
        }
        for (method, handler) in handlers {
            self = self.route(Route {
                method,
                pattern: pattern.clone(),
                handler,
                middleware: middleware.clone(),
                name: name.take(),
            });
        }
        self
    }

    method_shorthands! {
        get => Method::GET,
        post => Method::POST,
        put => Method::PUT,
        delete => Method::DELETE,
        patch => Method::PATCH,
        head => Method::HEAD,
        options => Method::OPTIONS,
    }

    /// Freezes the configuration. Returns the first registration error.
    pub fn build(self) -> Result<App, RegistrationError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let chains = self
            .table
            .entries()
            .iter()
            .map(|entry| Chain::build(&self.global, &entry.middleware))
            .collect();

        info!(
            routes = self.table.len(),
            global_middleware = self.global.len(),
            "application built"
        );

        Ok(App {
            table: self.table,
            chains,
        })
    }
}

/// Immutable, fully built application.
#[derive(Debug)]
pub struct App {
    table: RouteTable,
    chains: Vec<Chain>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    pub fn url_for<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, RouteError>
    where
        K: Into<String>,
        V: ToString,
    {
        self.table.url_for(name, params)
    }

    /// Resolves the request, runs the matched route's chain and returns the
    /// finished response.
    ///
    /// 404 and 405 are answered without running any middleware. A handler or
    /// middleware error becomes a 500, as does a route redirect that cannot
    /// be resolved.
    pub fn dispatch(&self, mut request: Request) -> Response {
        let (index, params) = match self.table.resolve(request.method, &request.path) {
            Ok(m) => (m.index, m.params),
            Err(RouteError::MethodNotAllowed { allowed }) => {
                return Response::method_not_allowed(&allowed);
            }
            Err(_) => return Response::not_found(),
        };
        request.params = params;

        let entry = &self.table.entries()[index];
        let mut response = Response::new();

        if let Err(e) = self.chains[index].execute(&request, &mut response, entry.handler.as_ref()) {
            let cause = format!("{:#}", e);
            error!(
                method = %request.method,
                path = %request.path,
                route = %entry.pattern,
                error = %cause,
                "handler failed"
            );
            return Response::internal_error();
        }

        if let Some(redirect) = response.route_redirect.take() {
            match self.table.url_for(&redirect.name, redirect.params) {
                Ok(location) => {
                    response.redirect(location, redirect.permanent);
                }
                Err(e) => {
                    error!(route = %redirect.name, error = %e, "cannot resolve redirect target");
                    return Response::internal_error();
                }
            }
        }

        response
    }
}

