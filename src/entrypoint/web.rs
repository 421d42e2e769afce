//! Raw HTTP formatting.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

use crate::entrypoint::{Payload, Reply, ResponseFormat, ServiceError};
use crate::http::{Response, APPLICATION_JSON, TEXT_PLAIN};
use crate::worker::WorkerContext;

/// Passes replies through as HTTP: `(payload, status)`, `(payload, headers,
/// status)` or a bare payload with 200. Failures are 400 for bad requests and
/// 500 for everything else, with a two-line plain text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebFormat;

impl WebFormat {
    fn build(&self, context: Option<&WorkerContext>, payload: Payload, mut headers: HeaderMap, status: u16) -> Response {
        let status = match StatusCode::from_u16(status) {
            Ok(status) => status,
            Err(_) => {
                let error = ServiceError::unexpected("ValueError", format!("invalid status code {}", status));
                return self.handle_exception(context, &error);
            }
        };

        let (body, content_type) = match payload {
            Payload::Text(text) => (Bytes::from(text), TEXT_PLAIN),
            Payload::Binary(bytes) => (bytes, TEXT_PLAIN),
            Payload::Json(value) => match serde_json::to_vec(&value) {
                Ok(body) => (Bytes::from(body), APPLICATION_JSON),
                Err(e) => return self.handle_exception(context, &ServiceError::from_error(e)),
            },
        };

        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        Response::new(status, headers, body)
    }
}

impl ResponseFormat for WebFormat {
    fn handle_response(&self, context: Option<&WorkerContext>, reply: Reply) -> Response {
        match reply {
            Reply::Full(response) => response,
            Reply::WithStatus(payload, status) => self.build(context, payload, HeaderMap::new(), status),
            Reply::WithHeaders(payload, headers, status) => self.build(context, payload, headers, status),
            Reply::Bare(payload) => self.build(context, payload, HeaderMap::new(), 200),
        }
    }

    fn handle_exception(&self, _context: Option<&WorkerContext>, error: &ServiceError) -> Response {
        let status = if error.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Response::text(status, format!("{}\n{}", error.exc_type(), error.message()))
    }
}
