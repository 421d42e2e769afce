//! Call context threaded through worker execution.

use std::collections::HashMap;

use http::HeaderMap;

/// Metadata extracted from request headers, before a call id exists.
pub type ContextData = HashMap<String, String>;

/// Correlation metadata for one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerContext {
    /// Dot separated: `<service>.<entrypoint>.<unique id>`.
    pub call_id: String,
    pub data: ContextData,
}

impl WorkerContext {
    pub fn new(call_id: impl Into<String>, data: ContextData) -> Self {
        Self {
            call_id: call_id.into(),
            data,
        }
    }

    /// Last dot-separated segment of the call id.
    pub fn short_call_id(&self) -> &str {
        self.call_id.rsplit('.').next().unwrap_or(&self.call_id)
    }
}

/// Maps request headers to context data.
///
/// Must be pure and must not fail; anything it cannot use is ignored.
pub trait ContextExtractor: Send + Sync {
    fn extract(&self, headers: &HeaderMap) -> ContextData;
}

/// Extracts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContext;

impl ContextExtractor for EmptyContext {
    fn extract(&self, _headers: &HeaderMap) -> ContextData {
        ContextData::new()
    }
}

/// Copies every header starting with `prefix` into the context, prefix stripped.
#[derive(Debug, Clone)]
pub struct PrefixedHeaders {
    prefix: String,
}

impl PrefixedHeaders {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_ascii_lowercase(),
        }
    }
}

impl ContextExtractor for PrefixedHeaders {
    fn extract(&self, headers: &HeaderMap) -> ContextData {
        headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(&self.prefix)?;
                let value = value.to_str().ok()?;
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn short_call_id_is_last_segment() {
        let ctx = WorkerContext::new("orders.create.4f2a", ContextData::new());
        assert_eq!(ctx.short_call_id(), "4f2a");

        let ctx = WorkerContext::new("plain", ContextData::new());
        assert_eq!(ctx.short_call_id(), "plain");
    }

    #[test]
    fn prefixed_headers_are_copied() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ctx-user", HeaderValue::from_static("ada"));
        headers.insert("x-ctx-", HeaderValue::from_static("ignored"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        let data = PrefixedHeaders::new("X-Ctx-").extract(&headers);
        assert_eq!(data.len(), 1);
        assert_eq!(data["user"], "ada");

        assert!(EmptyContext.extract(&headers).is_empty());
    }
}
