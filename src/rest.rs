use crate::archive::IssueArchivalService;
use crate::auth::Credentials;
use crate::client::ClientBuilder;
use crate::error::{Error, Result};
use crate::oauth::OAuth2Service;
use crate::response::ResponseEnvelope;
use crate::transport::{HttpResponse, HttpTransport};
use reqwest::blocking::{Body, Request};
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Version of the REST API targeted by the resource services
pub const API_VERSION: &str = "3";

/// Header that disables the server's XSRF check on upload requests
pub const NO_CHECK_HEADER: &str = "x-atlassian-token";

const APPLICATION_JSON: &str = "application/json";

/// Per-call cancellation context: an optional deadline that is applied to
/// the outgoing request and bounds the network exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without a deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        RequestContext {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        RequestContext {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `Some(ZERO)` once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Client for the remote REST API.
///
/// Holds the site every relative path is resolved against, the shared
/// credential state and the (possibly wrapped) transport.
pub struct Client {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) auth: Arc<Credentials>,
    pub(crate) oauth: Option<OAuth2Service>,
    pub(crate) site: Url,
}

impl Client {
    /// Start configuring a client for `site`
    pub fn builder(site: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(site)
    }

    /// Client for `site` using the default transport and no options
    pub fn new(site: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(site).build()
    }

    /// Base URL, always ending with a path separator
    pub fn site(&self) -> &Url {
        &self.site
    }

    /// Credential state shared with the transport
    pub fn auth(&self) -> &Credentials {
        &self.auth
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// OAuth2 capability, if installed
    pub fn oauth(&self) -> Option<&OAuth2Service> {
        self.oauth.as_ref()
    }

    /// Issue archival operations
    pub fn archive(&self) -> IssueArchivalService<'_> {
        IssueArchivalService::new(self, API_VERSION)
    }

    /// Build a request for `path`, relative to the site.
    ///
    /// # Arguments
    /// * `ctx` - Cancellation context; its deadline becomes the request timeout
    /// * `method` - HTTP method
    /// * `path` - Path and query relative to the site
    /// * `content_type` - Explicit content type; marks the request as an upload
    /// * `body` - Value serialized as the JSON payload
    pub fn new_request<B>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<&B>,
    ) -> Result<Request>
    where
        B: Serialize + ?Sized,
    {
        let payload = match body {
            Some(body) => Some(serde_json::to_vec(body).map_err(Error::Serialize)?),
            None => None,
        };
        self.assemble(ctx, method, path, content_type, payload)
    }

    /// Build a request whose payload is sent verbatim, e.g. a pre-built
    /// multipart body.
    pub fn new_raw_request(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Request> {
        self.assemble(ctx, method, path, content_type, Some(body))
    }

    fn assemble(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        payload: Option<Vec<u8>>,
    ) -> Result<Request> {
        let url = self.site.join(path)?;
        let mut request = Request::new(method, url);

        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        if payload.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }

        if let Some(content_type) = content_type.filter(|c| !c.is_empty()) {
            headers.insert(CONTENT_TYPE, header_value(content_type, "content type")?);
            headers.insert(
                HeaderName::from_static(NO_CHECK_HEADER),
                HeaderValue::from_static("no-check"),
            );
        }

        // basic auth wins when both schemes are configured
        if let Some(authorization) = self.auth.authorization_header() {
            headers.insert(AUTHORIZATION, header_value(&authorization, "authorization")?);
        }

        if let Some(agent) = self.auth.get_user_agent() {
            headers.insert(USER_AGENT, header_value(&agent, "user agent")?);
        }

        if let Some(payload) = payload {
            *request.body_mut() = Some(Body::from(payload));
        }

        if let Some(remaining) = ctx.remaining() {
            if remaining.is_zero() {
                return Err(Error::RequestBuild("context deadline exceeded".to_string()));
            }
            *request.timeout_mut() = Some(remaining);
        }

        Ok(request)
    }

    /// Send the request and classify the outcome.
    ///
    /// The body is read in full and the connection released before the
    /// status is looked at. Non-2xx statuses come back as errors that still
    /// carry the envelope.
    pub fn call(&self, request: Request) -> Result<ResponseEnvelope> {
        let method = request.method().clone();
        let start = Instant::now();

        let HttpResponse {
            status,
            url,
            headers,
            mut body,
        } = self.transport.send(request).map_err(|e| {
            debug!(method = %method, error = %e, "transport failure");
            e
        })?;

        let mut bytes = Vec::new();
        let read = body.read_to_end(&mut bytes);
        drop(body);

        let envelope = ResponseEnvelope::new(status, url, method, headers, bytes);

        debug!(
            method = %envelope.method,
            endpoint = %envelope.endpoint,
            status = envelope.code.as_u16(),
            elapsed = ?start.elapsed(),
            "call completed"
        );

        if let Err(source) = read {
            return Err(Error::Body {
                source,
                response: Box::new(envelope),
            });
        }

        if !envelope.is_success() {
            return Err(Error::from_status(envelope));
        }

        Ok(envelope)
    }

    /// Send the request and decode the successful body into `T`
    pub fn call_into<T>(&self, request: Request) -> Result<(T, ResponseEnvelope)>
    where
        T: DeserializeOwned,
    {
        let envelope = self.call(request)?;
        match envelope.json() {
            Ok(value) => Ok((value, envelope)),
            Err(source) => Err(Error::Decode {
                source,
                response: Box::new(envelope),
            }),
        }
    }

    /// Make a JSON request and unmarshal the response into the target type
    ///
    /// # Arguments
    /// * `ctx` - Cancellation context
    /// * `method` - HTTP method (GET, POST, PUT, etc.)
    /// * `path` - API endpoint path relative to the site
    /// * `body` - Optional request body
    pub fn apply<T, B>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.new_request(ctx, method, path, None, body)?;
        let (value, _) = self.call_into(request)?;
        Ok(value)
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::RequestBuild(format!("invalid {} header: {}", what, e)))
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("site", &self.site.as_str())
            .field("auth", &self.auth)
            .field("oauth", &self.oauth.is_some())
            .field("wrapped", &self.transport.as_wrapper().is_some())
            .finish()
    }
}
