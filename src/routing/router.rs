//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled (rule, methods, handler) bindings in registration order
//! - Resolve a (path, method) pair to exactly one handler
//! - Report `MethodNotAllowed` distinctly from `NotFound`
//!
//! # Design Decisions
//! - Immutable once built; the server shares a snapshot via `Arc` without locks
//! - O(n) scan in registration order; first structural match wins
//! - A route that allows GET also allows HEAD

use std::fmt;
use std::sync::Arc;

use http::Method;
use thiserror::Error;

use crate::entrypoint::Handler;
use crate::routing::matcher::{PathParams, PathPattern, PatternError};

/// Error raised when a route cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("rule {0} accepts no methods")]
    NoMethods(String),
}

/// Parse method names, uppercasing them (`"get"` → `GET`).
pub fn parse_methods<S: AsRef<str>>(names: &[S]) -> Result<Vec<Method>, RouteError> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref().trim().to_ascii_uppercase();
            Method::from_bytes(name.as_bytes()).map_err(|_| RouteError::InvalidMethod(name))
        })
        .collect()
}

/// A single immutable binding.
pub struct Route {
    pattern: PathPattern,
    methods: Vec<Method>,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn rule(&self) -> &str {
        self.pattern.rule()
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("rule", &self.pattern.rule())
            .field("methods", &self.methods)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// A resolved route.
pub struct RouteMatch {
    pub handler: Arc<dyn Handler>,
    pub params: PathParams,
}

/// Outcome of a route table lookup.
pub enum Resolution {
    Matched(RouteMatch),
    /// The path matched at least one route, but none accepts the method.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Matched(m) => f
                .debug_struct("Matched")
                .field("handler", &m.handler.name())
                .field("params", &m.params)
                .finish(),
            Resolution::MethodNotAllowed { allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("allowed", allowed)
                .finish(),
            Resolution::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Ordered collection of route bindings.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from handlers, each contributing its own rule and methods.
    pub fn from_handlers<'a, I>(handlers: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = &'a Arc<dyn Handler>>,
    {
        let mut table = Self::new();
        for handler in handlers {
            table.register(handler.rule(), handler.methods(), Arc::clone(handler))?;
        }
        Ok(table)
    }

    /// Add a route. Later registrations lose ties against earlier ones.
    pub fn register(
        &mut self,
        rule: &str,
        methods: &[Method],
        handler: Arc<dyn Handler>,
    ) -> Result<(), RouteError> {
        let pattern = PathPattern::parse(rule)?;
        if methods.is_empty() {
            return Err(RouteError::NoMethods(rule.to_string()));
        }

        let mut allowed: Vec<Method> = Vec::with_capacity(methods.len() + 1);
        for method in methods {
            if !allowed.contains(method) {
                allowed.push(method.clone());
            }
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }

        tracing::debug!(rule, methods = ?allowed, handler = handler.name(), "Route registered");

        self.routes.push(Route {
            pattern,
            methods: allowed,
            handler,
        });
        Ok(())
    }

    /// Remove every route owned by `handler`. Returns how many were removed.
    pub fn unregister(&mut self, handler: &Arc<dyn Handler>) -> usize {
        let before = self.routes.len();
        self.routes.retain(|route| !same_handler(&route.handler, handler));
        before - self.routes.len()
    }

    /// Resolve a request path and method.
    pub fn resolve(&self, path: &str, method: &Method) -> Resolution {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.methods.contains(method) {
                return Resolution::Matched(RouteMatch {
                    handler: Arc::clone(&route.handler),
                    params,
                });
            }
            for m in &route.methods {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::MethodNotAllowed { allowed }
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Handler identity is the allocation, not the rule.
pub(crate) fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
