//! HTTP entrypoints for a service container.
//!
//! Requests are accepted on a shared listener, matched to a registered
//! entrypoint, and run on a worker separate from the connection task. The
//! connection waits on a single-use slot for the worker's outcome, then
//! formats it as raw HTTP ([`app::web`]) or as a JSON envelope ([`app::api`]).

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Entrypoints and workers
pub mod app;
pub mod entrypoint;
pub mod worker;

// Cross-cutting concerns
pub mod observability;

pub use crate::config::ContainerConfig;
pub use crate::entrypoint::{ApiHandler, Handler, Reply, ServiceError, WebHandler};
pub use crate::http::{ServerRegistry, WebServer};
pub use crate::worker::{ServiceCall, WorkerPool};
