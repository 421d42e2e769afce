//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (bind, accept, connection open/close, route misses,
//!       worker start/finish keyed by call_id, stop)
//!     → logging.rs (fmt subscriber, EnvFilter)
//! ```

pub mod logging;

pub use logging::init_logging;
