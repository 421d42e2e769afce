//! Request types.
//!
//! # Responsibilities
//! - Hold a parsed request on the connection task ([`IncomingRequest`])
//! - Read the body in full, under the configured size limit
//! - Freeze it into the read-only [`ServiceRequest`] handed to workers
//!
//! # Design Decisions
//! - The body stays unread (`Pending`) until the bridge asks for it, so route
//!   misses never pay for a body read
//! - A `ServiceRequest` has no mutable state; it is shared with the worker via `Arc`

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, Uri, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::de::DeserializeOwned;

use crate::entrypoint::ServiceError;
use crate::routing::PathParams;

/// Boxed error type carried by request bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request body as held by the connection task.
pub enum RequestBody {
    /// Not read yet ("shallow").
    Pending(UnsyncBoxBody<Bytes, BoxError>),
    /// Fully buffered.
    Buffered(Bytes),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Pending(_) => f.write_str("Pending"),
            RequestBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
        }
    }
}

/// A parsed request owned by its connection task.
#[derive(Debug)]
pub struct IncomingRequest {
    parts: http::request::Parts,
    params: PathParams,
    body: RequestBody,
}

impl IncomingRequest {
    /// Wrap an HTTP request and the parameters bound by its route.
    pub fn new<B>(request: http::Request<B>, params: PathParams) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            params,
            body: RequestBody::Pending(body.map_err(Into::into).boxed_unsync()),
        }
    }

    /// Wrap a request whose body is already in memory.
    pub fn buffered(request: http::Request<Bytes>, params: PathParams) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            params,
            body: RequestBody::Buffered(body),
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// True while the body has not been read.
    pub fn is_shallow(&self) -> bool {
        matches!(self.body, RequestBody::Pending(_))
    }

    /// Read the body in full (at most `limit` bytes) and freeze the request.
    ///
    /// Read failures and oversized bodies are client errors.
    pub async fn materialize(self, limit: usize) -> Result<ServiceRequest, ServiceError> {
        let body = match self.body {
            RequestBody::Buffered(bytes) if bytes.len() > limit => return Err(too_large(limit)),
            RequestBody::Buffered(bytes) => bytes,
            RequestBody::Pending(body) => read_body(body, limit).await?,
        };

        let http::request::Parts {
            method,
            uri,
            version,
            headers,
            ..
        } = self.parts;

        Ok(ServiceRequest {
            method,
            uri,
            version,
            headers,
            params: self.params,
            body,
        })
    }
}

/// Read data frames until the body ends, failing as soon as `limit` is passed.
async fn read_body(mut body: UnsyncBoxBody<Bytes, BoxError>, limit: usize) -> Result<Bytes, ServiceError> {
    let mut buf = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| ServiceError::bad_request(format!("failed to read request body: {}", e)))?;
        // Trailers carry no payload.
        if let Ok(data) = frame.into_data() {
            if buf.len() + data.len() > limit {
                return Err(too_large(limit));
            }
            buf.extend_from_slice(&data);
        }
    }
    Ok(buf.freeze())
}

fn too_large(limit: usize) -> ServiceError {
    ServiceError::bad_request(format!("request body exceeds {} bytes", limit))
}

/// The read-only request handed to business logic.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    params: PathParams,
    body: Bytes,
}

impl ServiceRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> Result<&str, ServiceError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| ServiceError::bad_request(format!("request body is not valid UTF-8: {}", e)))
    }

    /// The body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ServiceError::bad_request(format!("failed to decode JSON object: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn incoming(body: &'static str) -> IncomingRequest {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/items/3?verbose=1")
            .header("x-trace", "abc")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        let mut params = PathParams::new();
        params.insert("id".into(), "3".into());
        IncomingRequest::new(request, params)
    }

    #[tokio::test]
    async fn materialize_reads_the_whole_body() {
        let request = incoming(r#"{"qty":2}"#);
        assert!(request.is_shallow());
        assert_eq!(request.path(), "/items/3");

        let request = request.materialize(1024).await.unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.query(), Some("verbose=1"));
        assert_eq!(request.header("x-trace"), Some("abc"));
        assert_eq!(request.param("id"), Some("3"));

        let value: serde_json::Value = request.json().unwrap();
        assert_eq!(value["qty"], 2);
    }

    #[tokio::test]
    async fn oversized_body_is_a_bad_request() {
        let err = incoming("0123456789").materialize(4).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
        assert!(err.to_string().contains("exceeds 4 bytes"));
    }

    #[tokio::test]
    async fn body_exactly_at_the_limit_is_accepted() {
        let request = incoming("0123").materialize(4).await.unwrap();
        assert_eq!(request.body().as_ref(), b"0123");
    }

    #[tokio::test]
    async fn buffered_requests_are_not_shallow() {
        let request = http::Request::builder()
            .uri("/")
            .body(Bytes::from_static(b"hello"))
            .unwrap();
        let request = IncomingRequest::buffered(request, PathParams::new());
        assert!(!request.is_shallow());

        let request = request.materialize(5).await.unwrap();
        assert_eq!(request.body().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn invalid_json_is_a_bad_request() {
        let request = incoming("not json").materialize(1024).await.unwrap();
        assert!(matches!(request.json::<serde_json::Value>(), Err(ServiceError::BadRequest(_))));
        assert_eq!(request.text().unwrap(), "not json");
    }
}
