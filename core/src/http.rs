//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `DiscoveryClient::build_*` methods
//! produce `HttpRequest` values without touching the network; a `Transport`
//! executes them and hands back an `HttpResponse`.
//!
//! Query parameters are kept apart from the URL so the transport does the
//! query-string encoding and tests can assert on the pairs directly.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Request payload. At most one kind of body is ever attached.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    None,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    pub fn is_none(&self) -> bool {
        matches!(self, RequestBody::None)
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn parts(&self) -> &[FormPart] {
        match self {
            RequestBody::Multipart(parts) => parts,
            _ => &[],
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is the service URL plus the endpoint path, with every path segment
/// already percent-encoded. It never carries a query string.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::None,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Insert a header unless one with the same name is already present.
    /// Returns whether the header was inserted.
    pub fn insert_header_if_absent(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.header(name).is_some() {
            return false;
        }
        self.headers.push((name.to_string(), value.into()));
        true
    }

    /// Replace any header with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Append a query parameter only when a value is present.
    pub fn push_query<V: ToString>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.query.push((name.to_string(), value.to_string()));
        }
    }

    pub(crate) fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by a `Transport` after executing an `HttpRequest`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Response envelope handed back to callers: status, headers and the
/// parsed JSON body, if there was one.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub result: Option<serde_json::Value>,
}

impl DetailedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the body into a caller-defined model.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.result.unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "http://localhost/v2".to_string())
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut req = request();
        req.headers.push(("User-Agent".to_string(), "mine".to_string()));
        assert_eq!(req.header("user-agent"), Some("mine"));
        assert!(req.header("accept").is_none());
    }

    #[test]
    fn insert_if_absent_keeps_existing_value() {
        let mut req = request();
        req.headers.push(("user-agent".to_string(), "caller".to_string()));
        assert!(!req.insert_header_if_absent("User-Agent", "sdk"));
        assert!(req.insert_header_if_absent("Accept", "application/json"));
        assert_eq!(req.header("User-Agent"), Some("caller"));
        assert_eq!(req.headers.len(), 2);
    }

    #[test]
    fn set_header_replaces_existing_value() {
        let mut req = request();
        req.headers.push(("authorization".to_string(), "old".to_string()));
        req.set_header("Authorization", "new");
        assert_eq!(req.headers, vec![("Authorization".to_string(), "new".to_string())]);
    }

    #[test]
    fn push_query_skips_unset_values() {
        let mut req = request();
        req.push_query("count", Some(5));
        req.push_query::<String>("field", None);
        assert_eq!(req.query, vec![("count".to_string(), "5".to_string())]);
    }

    #[test]
    fn success_range_is_2xx() {
        let mut resp = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 302;
        assert!(!resp.is_success());
    }
}
