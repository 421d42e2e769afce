//! Entrypoints: route-bound handlers and the bridge to workers.
//!
//! # Data Flow
//! ```text
//! Dispatcher (matched route)
//!     → handler.rs (Entrypoint::handle_request)
//!     → bridge.rs (read body, extract context, submit, wait on slot.rs)
//!     → [worker runs business logic, deposits outcome]
//!     → web.rs | api.rs (format Reply or ServiceError)
//!     → Response
//! ```

pub mod api;
pub mod bridge;
pub mod error;
pub mod handler;
pub mod reply;
pub mod slot;
pub mod web;

pub use api::{ApiEnvelope, ApiFormat};
pub use bridge::{Bridge, BridgeOutcome};
pub use error::{split_error_line, RemoteError, ServiceError};
pub use handler::{Entrypoint, EntrypointBuilder, Handler, ResponseFormat};
pub use reply::{Payload, Reply};
pub use slot::{rendezvous, Deposit, Rendezvous, SlotError};
pub use web::WebFormat;

/// Raw HTTP entrypoint.
pub type WebHandler = Entrypoint<WebFormat>;

/// JSON envelope entrypoint.
pub type ApiHandler = Entrypoint<ApiFormat>;
