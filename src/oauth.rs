use crate::error::{Error, Result};
use crate::token::{Token, TokenResponse};
use crate::token_source::TokenRefresher;
use crate::transport::HttpTransport;
use chrono::Utc;
use reqwest::blocking::{Body, Request};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://auth.atlassian.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://auth.atlassian.com/oauth/token";
pub const DEFAULT_RESOURCES_URL: &str =
    "https://api.atlassian.com/oauth/token/accessible-resources";
pub const DEFAULT_AUDIENCE: &str = "api.atlassian.com";

/// Configuration of the OAuth2 (3LO) application
#[derive(Clone)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub resources_url: String,
    pub audience: String,
    /// Upper bound on every exchange with the authorization server
    pub timeout: Duration,
}

impl OAuth2Config {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        OAuth2Config {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            resources_url: DEFAULT_RESOURCES_URL.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Point the service at a different authorization server
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject configurations that cannot complete any exchange
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::Config("OAuth client id cannot be empty".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(Error::Config("OAuth client secret cannot be empty".to_string()));
        }
        if self.redirect_uri.is_empty() {
            return Err(Error::Config("OAuth redirect URI cannot be empty".to_string()));
        }
        for url in [&self.authorize_url, &self.token_url, &self.resources_url] {
            Url::parse(url)
                .map_err(|e| Error::Config(format!("invalid OAuth endpoint {:?}: {}", url, e)))?;
        }
        Ok(())
    }
}

// Implement Debug manually to avoid exposing the client secret
impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A site the token grants access to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibleResource {
    /// Cloud id
    pub id: String,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, rename = "avatarUrl")]
    pub avatar_url: Option<String>,
}

#[derive(Serialize)]
struct AuthorizationCodeGrant<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Serialize)]
struct RefreshTokenGrant<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Client for the OAuth2 authorization server
#[derive(Clone)]
pub struct OAuth2Service {
    config: OAuth2Config,
    transport: Arc<dyn HttpTransport>,
}

impl OAuth2Service {
    /// Create the service; exchanges are sent through `transport`
    pub fn new(transport: Arc<dyn HttpTransport>, config: OAuth2Config) -> Result<Self> {
        config.validate()?;
        Ok(OAuth2Service { config, transport })
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Random value for the `state` parameter of the consent URL
    pub fn generate_state() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// URL the user is sent to in order to grant access
    pub fn authorization_url(&self, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("audience", &self.config.audience)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", state)
            .append_pair("response_type", "code")
            .append_pair("prompt", "consent");
        Ok(url)
    }

    /// Trade the authorization code from the redirect for a token
    pub fn exchange_authorization_code(&self, code: &str) -> Result<Token> {
        if code.is_empty() {
            return Err(Error::TokenRefresh("authorization code cannot be empty".to_string()));
        }

        let grant = AuthorizationCodeGrant {
            grant_type: "authorization_code",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            code,
            redirect_uri: &self.config.redirect_uri,
        };
        self.token_request(&grant)
    }

    /// Trade a refresh token for a new token
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<Token> {
        if refresh_token.is_empty() {
            return Err(Error::NoRefreshToken);
        }

        let grant = RefreshTokenGrant {
            grant_type: "refresh_token",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            refresh_token,
        };
        self.token_request(&grant)
    }

    /// Sites the access token can be used against
    pub fn accessible_resources(&self, access_token: &str) -> Result<Vec<AccessibleResource>> {
        let url = Url::parse(&self.config.resources_url)?;
        let mut request = self.request(Method::GET, url);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|e| Error::RequestBuild(format!("invalid access token: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let body = self.exchange(request)?;
        serde_json::from_slice(&body).map_err(|e| Error::TokenRefresh(e.to_string()))
    }

    fn token_request<G: Serialize>(&self, grant: &G) -> Result<Token> {
        let url = Url::parse(&self.config.token_url)?;
        let mut request = self.request(Method::POST, url);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let payload = serde_json::to_vec(grant).map_err(Error::Serialize)?;
        *request.body_mut() = Some(Body::from(payload));

        let body = self.exchange(request)?;
        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::TokenRefresh(format!("malformed token response: {}", e)))?;
        if response.access_token.is_empty() {
            return Err(Error::TokenRefresh("token response without access token".to_string()));
        }

        debug!(expires_in = ?response.expires_in, "token issued by authorization server");
        Ok(Token::from_response(response, Utc::now()))
    }

    fn request(&self, method: Method, url: Url) -> Request {
        let mut request = Request::new(method, url);
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        *request.timeout_mut() = Some(self.config.timeout);
        request
    }

    fn exchange(&self, request: Request) -> Result<Vec<u8>> {
        let response = self.transport.send(request)?;
        let status = response.status;
        let mut reader = response.body;
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        drop(reader);

        if !status.is_success() {
            let message = serde_json::from_slice::<OAuthErrorBody>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(Error::TokenRefresh(format!("{}: {}", status, message)));
        }

        Ok(body)
    }
}

impl TokenRefresher for OAuth2Service {
    fn refresh(&self, refresh_token: &str) -> Result<Token> {
        self.refresh_access_token(refresh_token)
    }
}

impl std::fmt::Debug for OAuth2Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Service")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
