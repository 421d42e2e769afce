//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → schema.rs (partition [webserver] into host/port, TLS, engine options)
//!     → validation.rs (semantic checks)
//!     → WebServerConfig (immutable, read once at listener setup)
//! ```
//!
//! # Design Decisions
//! - Config is read once per listener; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CertRequirement, ContainerConfig, ObservabilityConfig, ServerOptions, TlsOptions, TlsVersion,
    WebServerConfig, WorkerConfig, DEFAULT_WEBSERVER_HOST, DEFAULT_WEBSERVER_PORT,
    WEBSERVER_CONFIG_KEY,
};
pub use validation::{validate, ValidationError};
