//! Client assembly.
//!
//! A [`ClientBuilder`] collects options and applies them in order to a
//! half-built [`Client`] when [`ClientBuilder::build`] is called. The first
//! failing option aborts the build; no partially configured client is ever
//! returned.

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::oauth::{OAuth2Config, OAuth2Service};
use crate::rest::Client;
use crate::store::{TokenCallback, TokenStore};
use crate::token::Token;
use crate::token_source::TokenSource;
use crate::transport::{HttpTransport, ReqwestTransport, TransportConfig};
use crate::wrapper::{extract_base_transport, TransportWrapper};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A single configuration step applied to a half-built client
#[derive(Clone)]
pub enum ClientOption {
    /// Install the OAuth2 capability
    OAuth(OAuth2Config),
    /// Renew the given token automatically; requires [`ClientOption::OAuth`] first
    AutoRenewalToken(Token),
    /// `OAuth` followed by `AutoRenewalToken`
    OAuthWithAutoRenewal(OAuth2Config, Token),
    /// Persist refreshed tokens
    TokenStore(Arc<dyn TokenStore>),
    /// Get notified of refreshed tokens
    TokenCallback(TokenCallback),
    /// Key under which tokens are stored, defaults to the OAuth client id
    StoreKey(String),
}

impl ClientOption {
    fn name(&self) -> &'static str {
        match self {
            ClientOption::OAuth(_) => "oauth",
            ClientOption::AutoRenewalToken(_) => "auto_renewal_token",
            ClientOption::OAuthWithAutoRenewal(..) => "oauth_with_auto_renewal",
            ClientOption::TokenStore(_) => "token_store",
            ClientOption::TokenCallback(_) => "token_callback",
            ClientOption::StoreKey(_) => "store_key",
        }
    }

    fn apply(self, client: &mut Client) -> Result<()> {
        match self {
            ClientOption::OAuth(config) => {
                let base = extract_base_transport(&client.transport);
                let service = OAuth2Service::new(base, config)?;
                client.oauth = Some(service);
            }
            ClientOption::AutoRenewalToken(token) => {
                if token.access_token.is_empty() && !token.has_refresh_token() {
                    return Err(Error::Config(
                        "token cannot be empty for auto-renewal".to_string(),
                    ));
                }
                let oauth = client.oauth.clone().ok_or(Error::OAuthNotConfigured)?;

                let mut wrapper = TransportWrapper::wrap(&client.transport);
                if wrapper.hooks().key.is_empty() {
                    wrapper = wrapper.with_store_key(oauth.config().client_id.clone());
                }

                client.auth.set_bearer_token(token.access_token.as_str());
                let source = TokenSource::new(token, Arc::new(oauth));
                client.transport = wrapper
                    .with_token_source(source, Arc::clone(&client.auth))
                    .into_transport();
            }
            ClientOption::OAuthWithAutoRenewal(config, token) => {
                ClientOption::OAuth(config).apply(client)?;
                ClientOption::AutoRenewalToken(token).apply(client)?;
            }
            ClientOption::TokenStore(store) => {
                client.transport = TransportWrapper::wrap(&client.transport)
                    .with_store(store)
                    .into_transport();
            }
            ClientOption::TokenCallback(callback) => {
                client.transport = TransportWrapper::wrap(&client.transport)
                    .with_callback(callback)
                    .into_transport();
            }
            ClientOption::StoreKey(key) => {
                if key.is_empty() {
                    return Err(Error::Config("token store key cannot be empty".to_string()));
                }
                client.transport = TransportWrapper::wrap(&client.transport)
                    .with_store_key(key)
                    .into_transport();
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClientOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builder for [`Client`]
pub struct ClientBuilder {
    site: String,
    transport: Option<Arc<dyn HttpTransport>>,
    transport_config: TransportConfig,
    options: Vec<ClientOption>,
}

impl ClientBuilder {
    pub fn new(site: impl Into<String>) -> Self {
        ClientBuilder {
            site: site.into(),
            transport: None,
            transport_config: TransportConfig::default(),
            options: Vec::new(),
        }
    }

    /// Send requests through `transport` instead of the default reqwest client
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Settings for the default transport; ignored when a transport is given
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Append an option; options are applied in the order they were added
    pub fn option(mut self, option: ClientOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_oauth(self, config: OAuth2Config) -> Self {
        self.option(ClientOption::OAuth(config))
    }

    pub fn with_auto_renewal_token(self, token: Token) -> Self {
        self.option(ClientOption::AutoRenewalToken(token))
    }

    pub fn with_oauth_with_auto_renewal(self, config: OAuth2Config, token: Token) -> Self {
        self.option(ClientOption::OAuthWithAutoRenewal(config, token))
    }

    pub fn with_token_store(self, store: Arc<dyn TokenStore>) -> Self {
        self.option(ClientOption::TokenStore(store))
    }

    pub fn with_token_callback(self, callback: TokenCallback) -> Self {
        self.option(ClientOption::TokenCallback(callback))
    }

    pub fn with_store_key(self, key: impl Into<String>) -> Self {
        self.option(ClientOption::StoreKey(key.into()))
    }

    /// Validate the site, then apply every option in order
    pub fn build(self) -> Result<Client> {
        let site = normalize_site(&self.site)?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_config(&self.transport_config)?),
        };

        let mut client = Client {
            transport,
            auth: Arc::new(Credentials::new()),
            oauth: None,
            site,
        };

        for option in self.options {
            let name = option.name();
            option.apply(&mut client).map_err(|e| {
                debug!(option = name, error = %e, "client option rejected");
                e
            })?;
        }

        Ok(client)
    }
}

/// Parse the site, making sure it ends in a path separator
fn normalize_site(site: &str) -> Result<Url> {
    if site.is_empty() {
        return Err(Error::NoSite);
    }

    let mut site = site.to_string();
    if !site.ends_with('/') {
        site.push('/');
    }

    let url = Url::parse(&site).map_err(|source| Error::InvalidSite {
        site: site.clone(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidSite {
            site,
            source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        });
    }

    Ok(url)
}
