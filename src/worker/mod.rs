//! Worker scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! Bridge
//!     → WorkerScheduler::spawn_worker(entrypoint, call, context data, on_complete)
//!     → pool.rs (own tokio task, bounded by max_workers)
//!     → business logic (ServiceMethod)
//!     → on_complete(context, outcome) deposits into the bridge's slot
//! ```
//!
//! # Design Decisions
//! - Business logic never runs on the connection task
//! - Panics are caught on the worker task and reported as failures
//! - The completion handler always runs, whatever the outcome

pub mod context;
pub mod pool;

pub use context::{ContextData, ContextExtractor, EmptyContext, PrefixedHeaders, WorkerContext};
pub use pool::{
    service, CompletionHandler, ServiceCall, ServiceFuture, ServiceMethod, SubmitError, WorkerCall,
    WorkerPool, WorkerScheduler,
};
