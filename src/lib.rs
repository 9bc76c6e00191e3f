//! # atlasrest - authenticated REST transport for issue-tracker APIs
//!
//! The transport layer every resource call goes through: client assembly
//! from ordered options, OAuth2 token renewal layered over any HTTP
//! transport, request building and response classification.
//!
//! ## Features
//!
//! - Relative-path request building against a normalized site URL
//! - Basic auth, bearer token and user-agent credentials
//! - OAuth2 with automatic, single-flight token renewal
//! - Pluggable token persistence and refresh notification
//! - Normalized envelopes with a fixed status error taxonomy
//! - Task handle extraction for operations that complete asynchronously
//!
//! ## Basic Usage
//!
//! ```no_run
//! use atlasrest::{Client, Method, RequestContext};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Myself {
//!     #[serde(rename = "accountId")]
//!     account_id: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("https://your-domain.atlassian.net")?;
//!     client.auth().set_basic_auth("user@example.com", "api-token");
//!
//!     let ctx = RequestContext::background();
//!     let request = client.new_request::<()>(&ctx, Method::GET, "rest/api/3/myself", None, None)?;
//!     let (me, response): (Myself, _) = client.call_into(request)?;
//!
//!     println!("{} ({})", me.account_id, response.code);
//!     Ok(())
//! }
//! ```
//!
//! ## OAuth2 with automatic renewal
//!
//! ```no_run
//! use atlasrest::{Client, MemoryTokenStore, OAuth2Config, Token};
//! use std::sync::Arc;
//!
//! let config = OAuth2Config::new("client-id", "client-secret", "https://app.example.com/callback")
//!     .with_scopes(["read:jira-work", "offline_access"]);
//! let token = Token::new("access-token").with_refresh_token("refresh-token");
//!
//! let client = Client::builder("https://api.atlassian.com/ex/jira/cloud-id")
//!     .with_oauth(config)
//!     .with_token_store(Arc::new(MemoryTokenStore::new()))
//!     .with_auto_renewal_token(token)
//!     .build()?;
//! # Ok::<(), atlasrest::Error>(())
//! ```

pub mod archive;
pub mod auth;
pub mod client;
pub mod error;
pub mod oauth;
pub mod response;
pub mod rest;
pub mod store;
pub mod token;
pub mod token_source;
pub mod transport;
pub mod wrapper;

// Re-export main types for convenience
pub use archive::{IssueArchivalExportPayload, IssueArchivalService, IssueArchivalSyncResponse};
pub use auth::Credentials;
pub use client::{ClientBuilder, ClientOption};
pub use error::{Error, Result};
pub use oauth::{AccessibleResource, OAuth2Config, OAuth2Service};
pub use response::ResponseEnvelope;
pub use rest::{Client, RequestContext, API_VERSION};
pub use store::{FileTokenStore, MemoryTokenStore, TokenCallback, TokenHooks, TokenStore};
pub use token::Token;
pub use token_source::{TokenRefresher, TokenSource};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportConfig};
pub use wrapper::{extract_base_transport, unwrap_transport, TransportWrapper};

// Re-export the HTTP vocabulary used in the public API
pub use reqwest::blocking::Request;
pub use reqwest::{Method, StatusCode};
