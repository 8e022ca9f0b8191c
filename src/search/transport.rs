//! Transport collaborator used by the search gateway
//!
//! The gateway only needs "GET with params and headers, return JSON". The
//! [`Transport`] trait captures exactly that so tests and embedders can swap
//! the HTTP stack for a stub.

use std::time::Duration;

/// A GET request with query parameters and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A decoded JSON response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub data: serde_json::Value,
}

/// Failures reported by a transport
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("response is not valid JSON: {0}")]
    Decode(String),
}

/// Executes one GET request and returns its JSON body.
///
/// Implementations are expected to reject non-2xx statuses and to enforce
/// their own timeout.
pub trait Transport: Send + Sync {
    fn get(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Keep error bodies short enough to be useful in messages.
#[cfg_attr(not(feature = "http"), allow(dead_code))]
fn truncate_body(mut body: String) -> String {
    const LIMIT: usize = 256;
    if body.len() > LIMIT {
        let mut end = LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::{Error, Result};
    use reqwest::blocking::Client;
    use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

    /// `reqwest`-backed transport with a fixed request timeout
    pub struct HttpTransport {
        client: Client,
        timeout: Duration,
    }

    impl HttpTransport {
        pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(user_agent)
                .default_headers(headers)
                .build()
                .map_err(|e| {
                    Error::ConfigError(format!("Failed to build HTTP client: {}", e))
                })?;
            Ok(Self { client, timeout })
        }

        fn classify(&self, err: reqwest::Error) -> TransportError {
            if err.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Network(err.to_string())
            }
        }
    }

    impl Transport for HttpTransport {
        fn get(&self, request: &TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
            let mut builder = self.client.get(&request.url).query(&request.params);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let resp = builder.send().map_err(|e| self.classify(e))?;
            let status = resp.status().as_u16();
            let body = resp.text().map_err(|e| self.classify(e))?;

            if !(200..300).contains(&status) {
                return Err(TransportError::Status {
                    status,
                    body: truncate_body(body),
                });
            }

            let data = serde_json::from_str(&body)
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            Ok(TransportResponse { status, data })
        }
    }
}
