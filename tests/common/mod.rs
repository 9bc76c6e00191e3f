#![allow(dead_code)]

use atlasrest::{HttpResponse, HttpTransport, Request, Result, StatusCode};
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// What the mock saw of a request
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(self.body.as_ref().expect("request has no body")).unwrap()
    }
}

/// Canned answer; `url` overrides the request URL as the final resolved URL
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
    pub url: Option<String>,
    pub headers: Vec<(&'static str, String)>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Reply {
            status,
            body: body.into(),
            url: None,
            headers: Vec::new(),
        }
    }

    pub fn at(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

/// Transport that records requests and answers from a queue.
/// An empty queue answers 200 with `{}`.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    pub requests: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("no request was sent")
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: Request) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(Recorded {
            method: request.method().to_string(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
            body: request.body().and_then(|b| b.as_bytes()).map(|b| b.to_vec()),
            timeout: request.timeout().copied(),
        });

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::new(200, "{}"));

        let url = match &reply.url {
            Some(url) => Url::parse(url).unwrap(),
            None => request.url().clone(),
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &reply.headers {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }

        Ok(HttpResponse::new(StatusCode::from_u16(reply.status).unwrap(), url)
            .with_headers(headers)
            .with_body(reply.body))
    }
}
