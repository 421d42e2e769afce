//! Route-bound handlers.
//!
//! An [`Entrypoint`] binds a rule and method set to business logic and a
//! [`ResponseFormat`]. The format decides the wire shape: see
//! [`WebFormat`](crate::entrypoint::WebFormat) and
//! [`ApiFormat`](crate::entrypoint::ApiFormat).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::Method;

use crate::entrypoint::{Bridge, Reply, ServiceError};
use crate::http::{IncomingRequest, Response};
use crate::routing::{parse_methods, PathPattern, RouteError};
use crate::worker::{service, ServiceCall, ServiceMethod, WorkerContext};

/// What the dispatcher invokes for a matched route.
pub trait Handler: Send + Sync {
    /// Entrypoint name; the middle segment of every call id.
    fn name(&self) -> &str;

    fn rule(&self) -> &str;

    fn methods(&self) -> &[Method];

    /// Produce exactly one response for `request`. Never fails.
    fn handle_request<'a>(&'a self, bridge: &'a Bridge, request: IncomingRequest) -> BoxFuture<'a, Response>;
}

/// Converts a worker outcome into a response.
pub trait ResponseFormat: Send + Sync + 'static {
    fn handle_response(&self, context: Option<&WorkerContext>, reply: Reply) -> Response;

    fn handle_exception(&self, context: Option<&WorkerContext>, error: &ServiceError) -> Response;
}

/// Business logic bound to a route, formatted by `F`.
pub struct Entrypoint<F> {
    name: String,
    rule: String,
    methods: Vec<Method>,
    service: ServiceMethod,
    format: F,
}

impl<F: ResponseFormat> Entrypoint<F> {
    /// Validate the rule and methods and bind `service` to them.
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        rule: impl Into<String>,
        methods: &[S],
        service: ServiceMethod,
        format: F,
    ) -> Result<Self, RouteError> {
        let rule = rule.into();
        PathPattern::parse(&rule)?;
        let methods = parse_methods(methods)?;
        if methods.is_empty() {
            return Err(RouteError::NoMethods(rule));
        }

        Ok(Self {
            name: name.into(),
            rule,
            methods,
            service,
            format,
        })
    }

    pub fn format(&self) -> &F {
        &self.format
    }
}

impl<F> fmt::Debug for Entrypoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entrypoint")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl<F: ResponseFormat> Handler for Entrypoint<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn rule(&self) -> &str {
        &self.rule
    }

    fn methods(&self) -> &[Method] {
        &self.methods
    }

    fn handle_request<'a>(&'a self, bridge: &'a Bridge, request: IncomingRequest) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let outcome = bridge.handle_request(&self.name, &self.service, request).await;
            let context = outcome.context.as_ref();
            match outcome.result {
                Ok(reply) => self.format.handle_response(context, reply),
                Err(error) => {
                    tracing::debug!(
                        entrypoint = %self.name,
                        call_id = context.map(|c| c.call_id.as_str()).unwrap_or(""),
                        exc_type = error.exc_type(),
                        error = %error,
                        "Entrypoint failed"
                    );
                    self.format.handle_exception(context, &error)
                }
            }
        })
    }
}

/// Builder returned by [`web`](crate::app::web) and [`api`](crate::app::api).
#[derive(Debug, Clone)]
pub struct EntrypointBuilder<F> {
    rule: String,
    methods: Vec<String>,
    name: Option<String>,
    format: F,
}

impl<F: ResponseFormat> EntrypointBuilder<F> {
    pub fn new(rule: impl Into<String>, format: F) -> Self {
        Self {
            rule: rule.into(),
            methods: vec!["GET".to_string()],
            name: None,
            format,
        }
    }

    /// Accepted methods. Defaults to `GET` (which implies `HEAD`).
    pub fn methods<S: AsRef<str>>(mut self, methods: &[S]) -> Self {
        self.methods = methods.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    /// Entrypoint name used in call ids. Defaults to the rule.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Bind an async closure as the business logic.
    pub fn service<S, Fut>(self, f: S) -> Result<Arc<Entrypoint<F>>, RouteError>
    where
        S: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, ServiceError>> + Send + 'static,
    {
        self.service_method(service(f))
    }

    /// Bind an already boxed [`ServiceMethod`].
    pub fn service_method(self, method: ServiceMethod) -> Result<Arc<Entrypoint<F>>, RouteError> {
        let name = self.name.unwrap_or_else(|| self.rule.clone());
        Entrypoint::new(name, self.rule, &self.methods, method, self.format).map(Arc::new)
    }
}
