use std::sync::Arc;

use tracing::debug;

use crate::http::request::Method;
use crate::middleware::{Handler, Middleware};
use crate::routing::pattern::{BuildError, PathParams, RoutePattern};
use crate::routing::{RegistrationError, RouteError};

/// One registered route. Immutable once the table is built.
pub struct RouteEntry {
    pub method: Method,
    pub pattern: RoutePattern,
    pub name: Option<String>,
    pub handler: Arc<dyn Handler>,
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("name", &self.name)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Successful resolution: the winning entry, its registration index and the
/// coerced path parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub index: usize,
    pub params: PathParams,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and stores the route.
    ///
    /// Fails if the pattern is malformed, if a route of the same method and
    /// shape exists, or if `name` is already taken.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn Handler>,
        middleware: Vec<Arc<dyn Middleware>>,
        name: Option<String>,
    ) -> Result<usize, RegistrationError> {
        let compiled = RoutePattern::parse(pattern)?;

        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.method == method && e.pattern.same_shape(&compiled))
        {
            return Err(RegistrationError::Conflict {
                method,
                pattern: pattern.to_string(),
                existing: existing.pattern.to_string(),
            });
        }

        if let Some(name) = &name {
            if self.entries.iter().any(|e| e.name.as_deref() == Some(name)) {
                return Err(RegistrationError::DuplicateName(name.clone()));
            }
        }

        debug!(method = %method, pattern, "registered route");

        self.entries.push(RouteEntry {
            method,
            pattern: compiled,
            name,
            handler,
            middleware,
        });
        Ok(self.entries.len() - 1)
    }

    /// Picks the most specific route for `method` and `path`.
    ///
    /// Candidates are ranked position by position (literal, then typed, then
    /// greedy) and finally by registration order. If nothing matches under
    /// `method` but something matches under another method, the result is
    /// `MethodNotAllowed` with every such method.
    pub fn resolve(&self, method: Method, path: &str) -> Result<RouteMatch<'_>, RouteError> {
        let mut best: Option<(Vec<_>, usize, PathParams)> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.method != method {
                if !allowed.contains(&entry.method) && entry.pattern.matches(path).is_some() {
                    allowed.push(entry.method);
                }
                continue;
            }

            let Some(params) = entry.pattern.matches(path) else {
                continue;
            };
            let ranks = entry.pattern.ranks();
            let better = match &best {
                None => true,
                // entries are visited in registration order, so ties keep the earlier one
                Some((best_ranks, _, _)) => ranks < *best_ranks,
            };
            if better {
                best = Some((ranks, index, params));
            }
        }

        match best {
            Some((_, index, params)) => Ok(RouteMatch {
                entry: &self.entries[index],
                index,
                params,
            }),
            None if allowed.is_empty() => Err(RouteError::NotFound),
            None => {
                allowed.sort();
                Err(RouteError::MethodNotAllowed { allowed })
            }
        }
    }

    /// Reverse lookup: the concrete path of the route called `name`.
    pub fn url_for<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, RouteError>
    where
        K: Into<String>,
        V: ToString,
    {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
            .ok_or_else(|| RouteError::UnknownRouteName(name.to_string()))?;

        let values: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();

        entry
            .pattern
            .build_path(&values)
            .map_err(|err| match err {
                BuildError::Missing(param) => RouteError::MissingParameter {
                    route: name.to_string(),
                    param,
                },
                BuildError::Invalid { param, value } => RouteError::InvalidParameter {
                    route: name.to_string(),
                    param,
                    value,
                },
            })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
