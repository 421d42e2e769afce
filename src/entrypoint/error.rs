//! Failures produced by business logic (or on its behalf).
//!
//! Every failure has an exception-style type name and a message. The two
//! handler variants render them differently: the web handler as a status code
//! plus a two-line body, the API handler as a `ServerError:<kind>` envelope.

use std::any::Any;

use thiserror::Error;

/// A declared business-logic error with its own sub-code.
///
/// On the wire it is the single line `"<kind> <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} {message}")]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Split a pre-formatted `"Kind message"` line on its first whitespace.
    ///
    /// A line without whitespace is all kind and no message.
    pub fn parse(line: &str) -> Self {
        let (kind, message) = split_error_line(line);
        Self::new(kind, message)
    }
}

/// Outcome of a failed unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Client input was rejected.
    #[error("{0}")]
    BadRequest(String),

    /// Raised deliberately by business logic.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Anything else, including panics, submission failures and timeouts.
    #[error("{message}")]
    Unexpected { exc_type: String, message: String },
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest(message.into())
    }

    pub fn remote(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Remote(RemoteError::new(kind, message))
    }

    pub fn unexpected(exc_type: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Unexpected {
            exc_type: exc_type.into(),
            message: message.into(),
        }
    }

    /// Wrap any error, naming it after its type (`std::io::Error` → `Error`).
    pub fn from_error<E: std::error::Error + 'static>(err: E) -> Self {
        let full = std::any::type_name::<E>();
        let base = full.split('<').next().unwrap_or(full);
        let name = base.rsplit("::").next().unwrap_or(base);
        Self::unexpected(name, err.to_string())
    }

    /// Describe a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "worker panicked".to_string()
        };
        Self::unexpected("Panic", message)
    }

    /// Exception-style type name.
    pub fn exc_type(&self) -> &str {
        match self {
            ServiceError::BadRequest(_) => "BadRequest",
            ServiceError::Remote(remote) => &remote.kind,
            ServiceError::Unexpected { exc_type, .. } => exc_type,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::BadRequest(message) => message,
            ServiceError::Remote(remote) => &remote.message,
            ServiceError::Unexpected { message, .. } => message,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, ServiceError::BadRequest(_))
    }

    /// The single-line `"<type> <message>"` form.
    pub fn error_line(&self) -> String {
        match self {
            ServiceError::Remote(remote) => remote.to_string(),
            other => format!("{} {}", other.exc_type(), other.message()),
        }
    }

    /// `(sub_err, err_msg)` as reported in the API error envelope.
    pub fn sub_error(&self) -> (String, String) {
        let line = self.error_line();
        let (sub_err, err_msg) = split_error_line(&line);
        (sub_err.to_string(), err_msg.to_string())
    }
}

/// Split on the first whitespace; both halves trimmed. No whitespace means no message.
pub fn split_error_line(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((head, tail)) => (head.trim(), tail.trim()),
        None => (line.trim(), ""),
    }
}
