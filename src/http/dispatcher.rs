//! Per-request dispatch.
//!
//! # Responsibilities
//! - Resolve the request against the route table snapshot
//! - Answer `NotFound` / `MethodNotAllowed` without touching a handler
//! - Invoke the matched handler and return its response unchanged
//! - Contain handler panics as a 500 so the connection task survives

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::FutureExt;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Body;

use crate::entrypoint::{Bridge, ServiceError};
use crate::http::request::{BoxError, IncomingRequest};
use crate::http::Response;
use crate::routing::{Resolution, RouteTable};

/// Shared by every connection of a started server. Read-only.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    bridge: Arc<Bridge>,
    debug: bool,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, bridge: Arc<Bridge>) -> Self {
        Self {
            routes,
            bridge,
            debug: false,
        }
    }

    /// Put the panic type and message in the body of a handler panic 500.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Produce exactly one response for `request`.
    pub async fn dispatch<B>(&self, request: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = match self.routes.resolve(&path, &method) {
            Resolution::NotFound => {
                tracing::debug!(method = %method, path = %path, "No route matched");
                Response::standard(StatusCode::NOT_FOUND)
            }
            Resolution::MethodNotAllowed { allowed } => {
                tracing::debug!(method = %method, path = %path, allowed = ?allowed, "Method not allowed");
                Response::method_not_allowed(&allowed)
            }
            Resolution::Matched(matched) => {
                let handler = matched.handler;
                let incoming = IncomingRequest::new(request, matched.params);
                match AssertUnwindSafe(handler.handle_request(&self.bridge, incoming))
                    .catch_unwind()
                    .await
                {
                    Ok(response) => response,
                    Err(panic) => {
                        let error = ServiceError::from_panic(panic);
                        tracing::error!(
                            entrypoint = handler.name(),
                            path = %path,
                            error = %error,
                            "Handler panicked"
                        );
                        if self.debug {
                            Response::text(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                format!("{}\n{}", error.exc_type(), error.message()),
                            )
                        } else {
                            Response::standard(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    }
                }
            }
        };

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request served"
        );

        response.into_http()
    }
}
