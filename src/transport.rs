use crate::error::Result;
use crate::wrapper::TransportWrapper;
use reqwest::blocking::{Client, ClientBuilder, Request};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::io::Read;
use std::time::Duration;
use url::Url;

/// Capability to send an HTTP request and receive a response.
pub trait HttpTransport: Send + Sync {
    /// Send the request. An error means no response was received at all.
    fn send(&self, request: Request) -> Result<HttpResponse>;

    /// Capability query used to detect transports decorated by
    /// [`TransportWrapper`], so they are never wrapped twice.
    fn as_wrapper(&self) -> Option<&TransportWrapper> {
        None
    }
}

/// Raw response as produced by a transport, body not yet read
pub struct HttpResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Final URL, after any redirects were followed
    pub url: Url,
    /// Response headers
    pub headers: HeaderMap,
    /// Unread body; dropping it releases the underlying connection
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// Create a response with an empty body
    pub fn new(status: StatusCode, url: Url) -> Self {
        HttpResponse {
            status,
            url,
            headers: HeaderMap::new(),
            body: Box::new(std::io::empty()),
        }
    }

    /// Replace the body with an in-memory buffer
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Box::new(std::io::Cursor::new(body.into()));
        self
    }

    /// Replace the headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Settings for the default reqwest-based transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Overall request timeout
    pub timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            pool_max_idle_per_host: 50,
            timeout: Duration::from_secs(300), // 5 minutes
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Set the overall request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Transport backed by a blocking reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create the default transport with optimized settings for connection
    /// pooling and timeouts
    pub fn new() -> Result<Self> {
        Self::with_config(&TransportConfig::default())
    }

    pub fn with_config(config: &TransportConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }

    /// Use an already configured reqwest client
    pub fn from_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: Request) -> Result<HttpResponse> {
        let response = self.client.execute(request)?;
        Ok(HttpResponse {
            status: response.status(),
            url: response.url().clone(),
            headers: response.headers().clone(),
            body: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.pool_max_idle_per_host, 50);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));

        let config = config.with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_reqwest_transport_is_not_a_wrapper() {
        let transport = ReqwestTransport::new().unwrap();
        assert!(transport.as_wrapper().is_none());
    }

    #[test]
    fn test_http_response_body() {
        let mut response = HttpResponse::new(
            StatusCode::OK,
            Url::parse("https://x.atlassian.net/").unwrap(),
        )
        .with_body("hello");

        let mut body = String::new();
        response.body.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
    }
}
