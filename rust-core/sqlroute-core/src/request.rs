//! # HTTP Request
//!
//! Request wrapper with the body collected once and the query string parsed
//! up front. Implements [`ValueSource`] so the parameter resolver can read
//! query, body and header values without seeing hyper types.

use crate::error::{Error, Result};
use crate::json::decode_body;
use crate::params::ValueSource;
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Request};
use serde_json::Value;
use std::collections::HashMap;

/// Query flag that adds the match trace to "not found" responses
pub const DEBUG_FLAG: &str = "_dbg";

/// HTTP request as seen by handlers
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Method name as received, upper-cased
    method_name: String,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters; repeated keys hold an array
    query_params: HashMap<String, Value>,
    /// Request headers
    headers: HeaderMap,
    /// Decoded body object
    body_json: Value,
}

impl ApiRequest {
    /// Create a request manually (for testing/internal use)
    ///
    /// `path` may carry a query string.
    pub fn new(method: Method, path: &str, headers_map: HashMap<String, String>, body: Option<Bytes>) -> Self {
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path.to_string(), None),
        };

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(&v)) {
                headers.insert(n, v);
            }
        }

        Self::assemble(method, method.as_str().to_string(), path, query_string, headers, body.as_deref())
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` if the declared or actual body size
    /// exceeds `max_body_size`.
    pub async fn from_hyper_with_limit(req: Request<hyper::body::Incoming>, max_body_size: usize) -> Result<Self> {
        let method = Method::from_hyper(req.method());
        let method_name = req.method().as_str().to_uppercase();

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);

        let headers = req.headers().clone();
        if let Some(content_len) = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok())
        {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let body = match BodyExt::collect(req.into_body()).await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                if bytes.len() > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: bytes.len(),
                    });
                }
                Some(bytes)
            }
            Err(_) => None,
        };

        Ok(Self::assemble(method, method_name, path, query_string, headers, body.as_deref()))
    }

    fn assemble(
        method: Method,
        method_name: String,
        path: String,
        query_string: Option<String>,
        headers: HeaderMap,
        body: Option<&[u8]>,
    ) -> Self {
        let query_params = parse_query_string(query_string.as_deref());
        let body_json = decode_body(body.unwrap_or_default());
        Self {
            method,
            method_name,
            path,
            query_string,
            query_params,
            headers,
            body_json,
        }
    }

    /// Method name as received (extension methods keep their own name)
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.headers.get(name.to_lowercase().as_str()))
            .and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            self.headers.insert(n, v);
        }
    }

    /// First value of a query parameter, as text
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        match self.query_params.get(key)? {
            Value::Array(items) => items.first().and_then(Value::as_str),
            other => other.as_str(),
        }
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Decoded body object (empty when the body is absent or not JSON)
    #[must_use]
    pub const fn body_json(&self) -> &Value {
        &self.body_json
    }

    /// Whether the caller asked for the match trace
    #[must_use]
    pub fn debug_requested(&self) -> bool {
        matches!(self.query_value(DEBUG_FLAG), Some("1" | "true"))
    }
}

impl ValueSource for ApiRequest {
    fn query(&self, key: &str) -> Option<Value> {
        self.query_params.get(key).cloned()
    }

    fn body(&self, key: &str) -> Option<Value> {
        self.body_json.get(key).cloned()
    }

    fn header(&self, key: &str) -> Option<Value> {
        Self::header(self, key).map(|v| Value::String(v.to_string()))
    }
}

/// Parse a form-urlencoded query string
///
/// A key seen more than once maps to an array of its values in order.
fn parse_query_string(query: Option<&str>) -> HashMap<String, Value> {
    let mut params: HashMap<String, Value> = HashMap::new();
    let Some(query) = query else {
        return params;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(&*key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_query_string(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&json!("1")));
        assert_eq!(result.get("limit"), Some(&json!("10")));
    }

    #[test]
    fn test_parse_query_string_empty() {
        assert!(parse_query_string(None).is_empty());
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_query_string(Some("name=John+Doe&city=New%20York"));
        assert_eq!(result.get("name"), Some(&json!("John Doe")));
        assert_eq!(result.get("city"), Some(&json!("New York")));
    }

    #[test]
    fn test_parse_query_string_repeated_keys() {
        let result = parse_query_string(Some("tag=a&tag=b&tag=c"));
        assert_eq!(result.get("tag"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_request_value_source() {
        let mut headers = HashMap::new();
        headers.insert("X-Tenant".to_string(), "acme".to_string());
        let req = ApiRequest::new(
            Method::Post,
            "/api/api-builder/items?_dbg=1&q=x",
            headers,
            Some(Bytes::from_static(br#"{"x": 5}"#)),
        );

        assert_eq!(req.path, "/api/api-builder/items");
        assert_eq!(req.query_string(), Some("_dbg=1&q=x"));
        assert_eq!(ValueSource::query(&req, "q"), Some(json!("x")));
        assert_eq!(ValueSource::body(&req, "x"), Some(json!(5)));
        assert_eq!(ValueSource::header(&req, "x-tenant"), Some(json!("acme")));
        assert_eq!(ValueSource::header(&req, "X-TENANT"), Some(json!("acme")));
        assert!(req.debug_requested());
    }

    #[test]
    fn test_non_json_body_is_empty_object() {
        let req = ApiRequest::new(Method::Post, "/x", HashMap::new(), Some(Bytes::from_static(b"a=1")));
        assert_eq!(req.body_json(), &json!({}));
        assert!(!req.debug_requested());
    }

    #[test]
    fn test_method_name_follows_method() {
        let req = ApiRequest::new(Method::Patch, "/x", HashMap::new(), None);
        assert_eq!(req.method_name(), "PATCH");
    }
}
