//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, one task per connection, hyper HTTP/1.1)
//!     → dispatcher.rs (route lookup, 404/405, panic containment)
//!     → request.rs (IncomingRequest → ServiceRequest)
//!     → [handler + bridge + worker]
//!     → response.rs (byte-exact response)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod registry;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use registry::{ServerKey, ServerRegistry};
pub use request::{BoxError, IncomingRequest, RequestBody, ServiceRequest};
pub use response::{Response, APPLICATION_JSON, TEXT_PLAIN};
pub use server::{ServerError, WebServer};
