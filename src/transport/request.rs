use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// One request/response exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Caller-supplied deadline, enforced by the transport
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Request-style transport port
///
/// Non-success statuses, timeouts and connection failures come back as
/// `AudioError::Transport`. Retry policy, if any, belongs here and not in
/// the session controller.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = TransportRequest::post("https://example.test/v1/audio")
            .bearer("sk-test")
            .header("Content-Type", "application/json")
            .body(b"{}".to_vec())
            .timeout(Some(Duration::from_secs(30)));

        assert_eq!(request.header_value("authorization"), Some("Bearer sk-test"));
        assert_eq!(request.header_value("content-type"), Some("application/json"));
        assert_eq!(request.body, b"{}");
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }
}
