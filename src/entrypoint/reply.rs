//! What business logic hands back on success.

use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;

use crate::entrypoint::ServiceError;
use crate::http::Response;

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
    Json(Value),
}

impl Payload {
    /// JSON rendering used by the API envelope. Binary data is decoded lossily.
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Binary(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Payload::Json(value) => value.clone(),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Binary(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(value))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Successful worker result, in one of four shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A finished response, passed through untouched by the web handler.
    Full(Response),
    /// `(payload, status)`.
    WithStatus(Payload, u16),
    /// `(payload, headers, status)`.
    WithHeaders(Payload, HeaderMap, u16),
    /// A bare payload; status 200.
    Bare(Payload),
}

impl Reply {
    /// JSON rendering for the API envelope's `data` field.
    ///
    /// Tuple shapes become arrays. A finished response has no JSON form.
    pub fn to_json(&self) -> Result<Value, ServiceError> {
        match self {
            Reply::Bare(payload) => Ok(payload.to_json()),
            Reply::WithStatus(payload, status) => Ok(Value::Array(vec![payload.to_json(), Value::from(*status)])),
            Reply::WithHeaders(payload, headers, status) => {
                let headers: serde_json::Map<String, Value> = headers
                    .iter()
                    .map(|(name, value)| {
                        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                        (name.as_str().to_string(), Value::String(value))
                    })
                    .collect();
                Ok(Value::Array(vec![payload.to_json(), Value::Object(headers), Value::from(*status)]))
            }
            Reply::Full(_) => Err(ServiceError::unexpected(
                "TypeError",
                "Object of type Response is not JSON serializable",
            )),
        }
    }
}

impl From<Response> for Reply {
    fn from(value: Response) -> Self {
        Reply::Full(value)
    }
}

macro_rules! bare_reply_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Reply::Bare(Payload::from(value))
                }
            }
        )*
    };
}

bare_reply_from!(&str, String, Bytes, Vec<u8>, Value);

impl From<Payload> for Reply {
    fn from(value: Payload) -> Self {
        Reply::Bare(value)
    }
}

impl<P: Into<Payload>> From<(P, u16)> for Reply {
    fn from((payload, status): (P, u16)) -> Self {
        Reply::WithStatus(payload.into(), status)
    }
}

impl<P: Into<Payload>> From<(P, HeaderMap, u16)> for Reply {
    fn from((payload, headers, status): (P, HeaderMap, u16)) -> Self {
        Reply::WithHeaders(payload.into(), headers, status)
    }
}
