use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// ResponseEnvelope is the normalized result of a single call.
/// The body is buffered in full before classification, so it can be read
/// any number of times after the connection has been released.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// HTTP status code
    pub code: StatusCode,

    /// Final resolved URL (after redirects)
    pub endpoint: Url,

    /// HTTP method of the request
    pub method: Method,

    /// Response headers as received
    pub headers: HeaderMap,

    /// Raw body bytes
    pub bytes: Vec<u8>,
}

impl ResponseEnvelope {
    pub fn new(
        code: StatusCode,
        endpoint: Url,
        method: Method,
        headers: HeaderMap,
        bytes: Vec<u8>,
    ) -> Self {
        ResponseEnvelope {
            code,
            endpoint,
            method,
            headers,
            bytes,
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Body as text, with invalid UTF-8 replaced
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Decode the buffered body into the target type
    pub fn json<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.bytes)
    }

    /// Location header resolved against the endpoint, if present and valid
    pub fn location(&self) -> Option<Url> {
        let value = self.headers.get(LOCATION)?.to_str().ok()?;
        self.endpoint.join(value).ok()
    }

    /// Extract the handle of a server-side task started by this call.
    ///
    /// The handle is the last path segment of the Location header, of a body
    /// consisting of a task URL, or of the resolved endpoint, in that order.
    pub fn task_id(&self) -> Option<String> {
        self.location()
            .and_then(|location| last_segment(&location))
            .or_else(|| self.body_url().and_then(|url| last_segment(&url)))
            .or_else(|| last_segment(&self.endpoint))
    }

    /// Body interpreted as an absolute URL, either bare or as a JSON string
    fn body_url(&self) -> Option<Url> {
        let text = std::str::from_utf8(&self.bytes).ok()?.trim();
        if text.is_empty() {
            return None;
        }

        let candidate = match serde_json::from_str::<String>(text) {
            Ok(s) => s,
            Err(_) => text.to_string(),
        };

        Url::parse(candidate.trim()).ok()
    }
}

fn last_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}
