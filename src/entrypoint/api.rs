//! Structured JSON envelope formatting.
//!
//! Every reply, success or failure, is HTTP 200 with a body of the form
//! `{"code": ..., "errs": ..., "data": ..., "call_id": ...}`. Errors live in
//! the body only.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entrypoint::{Reply, ResponseFormat, ServiceError};
use crate::http::Response;
use crate::worker::WorkerContext;

pub const SUCCESS_CODE: &str = "Request:Success";
pub const ERROR_CODE_PREFIX: &str = "ServerError:";

/// Wire body of an API reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub code: String,
    pub errs: String,
    pub data: Value,
    pub call_id: String,
}

impl ApiEnvelope {
    pub fn success(data: Value, call_id: impl Into<String>) -> Self {
        Self {
            code: SUCCESS_CODE.to_string(),
            errs: String::new(),
            data,
            call_id: call_id.into(),
        }
    }

    pub fn failure(error: &ServiceError, call_id: impl Into<String>) -> Self {
        let (sub_err, err_msg) = error.sub_error();
        Self {
            code: format!("{}{}", ERROR_CODE_PREFIX, sub_err),
            errs: err_msg,
            data: Value::Null,
            call_id: call_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Wraps every outcome in an [`ApiEnvelope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiFormat;

impl ApiFormat {
    fn call_id(context: Option<&WorkerContext>) -> &str {
        context.map(WorkerContext::short_call_id).unwrap_or("")
    }

    fn render(envelope: &ApiEnvelope) -> Response {
        match Response::json(StatusCode::OK, envelope) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize API envelope");
                Response::standard(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl ResponseFormat for ApiFormat {
    fn handle_response(&self, context: Option<&WorkerContext>, reply: Reply) -> Response {
        match reply.to_json() {
            Ok(data) => Self::render(&ApiEnvelope::success(data, Self::call_id(context))),
            Err(error) => self.handle_exception(context, &error),
        }
    }

    fn handle_exception(&self, context: Option<&WorkerContext>, error: &ServiceError) -> Response {
        Self::render(&ApiEnvelope::failure(error, Self::call_id(context)))
    }
}
