//! The seam between request building and network I/O.
//!
//! # Design
//! `DiscoveryClient` never performs I/O itself; it hands each finished
//! `HttpRequest` to a `Transport`. `UreqTransport` is the blocking default.
//! Tests and hosts with their own HTTP stack implement the trait directly.
//!
//! Non-2xx responses are returned as data, not errors, so status handling
//! stays in the client.

use std::time::Duration;

use crate::error::DiscoveryError;
use crate::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Executes one HTTP exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, DiscoveryError>;
}

/// Blocking transport backed by a `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bound every exchange, connect through body, by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn decorate<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.query {
        builder = builder.query(name, value);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, DiscoveryError> {
        let result = match request.method {
            HttpMethod::Get => decorate(self.agent.get(&request.url), request).call(),
            HttpMethod::Delete => decorate(self.agent.delete(&request.url), request).call(),
            HttpMethod::Post => {
                let builder = decorate(self.agent.post(&request.url), request);
                match &request.body {
                    RequestBody::None => builder.send_empty(),
                    RequestBody::Json(value) => {
                        let body = serde_json::to_vec(value).map_err(DiscoveryError::Serialization)?;
                        builder.content_type("application/json").send(&body[..])
                    }
                    RequestBody::Multipart(parts) => {
                        let boundary = multipart_boundary();
                        let body = encode_multipart(parts, &boundary);
                        builder
                            .content_type(format!("multipart/form-data; boundary={boundary}"))
                            .send(&body[..])
                    }
                }
            }
        };

        let mut response = result.map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        // Whole body, any size; invalid UTF-8 is replaced rather than rejected.
        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse { status, headers, body })
    }
}

/// Random boundary that cannot collide with document content in practice.
pub fn multipart_boundary() -> String {
    format!("discovery-{}", uuid::Uuid::new_v4().simple())
}

/// Render parts as a `multipart/form-data` body (RFC 7578).
pub fn encode_multipart(parts: &[FormPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape_quoted(&part.name));
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
        }
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        out.extend_from_slice(&part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}
