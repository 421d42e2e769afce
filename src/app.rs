//! Entrypoint declaration helpers.
//!
//! ```no_run
//! use http_entrypoint::app;
//! use http_entrypoint::entrypoint::Reply;
//! use http_entrypoint::worker::ServiceCall;
//!
//! let ping = app::web("/ping")
//!     .service(|_call: ServiceCall| async move { Ok(Reply::from("pong")) })
//!     .expect("valid rule");
//! ```

use crate::entrypoint::{ApiFormat, EntrypointBuilder, WebFormat};

/// Declare a raw HTTP entrypoint at `rule`.
pub fn web(rule: impl Into<String>) -> EntrypointBuilder<WebFormat> {
    EntrypointBuilder::new(rule, WebFormat)
}

/// Declare a JSON envelope entrypoint at `rule`.
pub fn api(rule: impl Into<String>) -> EntrypointBuilder<ApiFormat> {
    EntrypointBuilder::new(rule, ApiFormat)
}
