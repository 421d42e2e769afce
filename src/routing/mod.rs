//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, method)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (compiled rule, path parameter binding)
//!     → Return: Matched(handler, params) | MethodNotAllowed | NotFound
//!
//! Route Compilation (at server start):
//!     registered handlers
//!     → compile rules
//!     → freeze as immutable RouteTable snapshot
//! ```

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathPattern, PatternError};
pub use router::{parse_methods, Resolution, Route, RouteError, RouteMatch, RouteTable};
