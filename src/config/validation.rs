//! Configuration validation.
//!
//! Serde handles the syntactic side; this pass checks value ranges and
//! cross-field requirements, returning every problem rather than the first.

use thiserror::Error;

use crate::config::schema::{CertRequirement, WebServerConfig};

/// A single semantic problem in a web server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("worker_timeout_ms must be greater than zero when set")]
    ZeroWorkerTimeout,

    #[error("TLS is configured but certfile is missing")]
    MissingCertificate,

    #[error("TLS is configured but keyfile is missing")]
    MissingPrivateKey,

    #[error("cert_reqs requires ca_certs to verify client certificates")]
    MissingCaBundle,
}

/// Validate a partitioned web server configuration.
pub fn validate(config: &WebServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.server.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.server.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.server.worker_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroWorkerTimeout);
    }

    if let Some(tls) = &config.tls {
        if tls.certfile.is_none() {
            errors.push(ValidationError::MissingCertificate);
        }
        if tls.keyfile.is_none() {
            errors.push(ValidationError::MissingPrivateKey);
        }
        if tls.cert_reqs != CertRequirement::None && tls.ca_certs.is_none() {
            errors.push(ValidationError::MissingCaBundle);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
