//! Response type written back to the connection.
//!
//! A [`Response`] is built once by a handler (or the dispatcher for routing
//! errors) and never mutated afterwards; [`Response::into_http`] converts it
//! byte-exact into a hyper response.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ALLOW, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use http_body_util::Full;
use serde::Serialize;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// Status, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Plain text body.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        Self::new(status, headers, body)
    }

    /// JSON body serialized from `value`.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        Ok(Self::new(status, headers, body))
    }

    /// Standard error page for routing and protocol failures.
    pub fn standard(status: StatusCode) -> Self {
        let description = match status {
            StatusCode::BAD_REQUEST => "The browser (or proxy) sent a request that this server could not understand.",
            StatusCode::NOT_FOUND => "The requested URL was not found on the server. If you entered the URL manually please check your spelling and try again.",
            StatusCode::METHOD_NOT_ALLOWED => "The method is not allowed for the requested URL.",
            StatusCode::PAYLOAD_TOO_LARGE => "The data value transmitted exceeds the capacity limit.",
            _ => "The server encountered an internal error and was unable to complete your request.",
        };
        let body = format!(
            "{} {}\n{}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            description
        );
        Self::text(status, body)
    }

    /// 405 with an `Allow` header listing the accepted methods.
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        let response = Self::standard(StatusCode::METHOD_NOT_ALLOWED);
        match HeaderValue::from_str(&allow) {
            Ok(value) => response.with_header(ALLOW, value),
            Err(_) => response,
        }
    }

    /// Add a header during construction.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Convert into a hyper response without touching status, headers or body.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
