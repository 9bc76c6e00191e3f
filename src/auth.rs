//! Credential state shared between the client and its transport.
//!
//! Each field is independently readable and writable; a write is visible to
//! every request built afterwards. Writes to several fields are not applied
//! atomically as a group.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::{PoisonError, RwLock};

#[derive(Default)]
struct CredentialState {
    basic_auth: Option<(String, String)>,
    bearer_token: Option<String>,
    user_agent: Option<String>,
}

/// Credentials holds basic-auth, bearer-token and user-agent values.
/// No validation of the content is performed, only presence is observable.
#[derive(Default)]
pub struct Credentials {
    state: RwLock<CredentialState>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&CredentialState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write(&self, f: impl FnOnce(&mut CredentialState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    pub fn set_basic_auth(&self, user: impl Into<String>, pass: impl Into<String>) {
        let pair = (user.into(), pass.into());
        self.write(|s| s.basic_auth = Some(pair));
    }

    pub fn has_basic_auth(&self) -> bool {
        self.read(|s| s.basic_auth.is_some())
    }

    pub fn get_basic_auth(&self) -> Option<(String, String)> {
        self.read(|s| s.basic_auth.clone())
    }

    pub fn clear_basic_auth(&self) {
        self.write(|s| s.basic_auth = None);
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.write(|s| s.bearer_token = Some(token));
    }

    /// An empty bearer token counts as absent
    pub fn has_bearer_token(&self) -> bool {
        self.read(|s| s.bearer_token.as_deref().is_some_and(|t| !t.is_empty()))
    }

    pub fn get_bearer_token(&self) -> Option<String> {
        self.read(|s| s.bearer_token.clone().filter(|t| !t.is_empty()))
    }

    pub fn set_user_agent(&self, agent: impl Into<String>) {
        let agent = agent.into();
        self.write(|s| s.user_agent = Some(agent));
    }

    pub fn has_user_agent(&self) -> bool {
        self.read(|s| s.user_agent.as_deref().is_some_and(|a| !a.is_empty()))
    }

    pub fn get_user_agent(&self) -> Option<String> {
        self.read(|s| s.user_agent.clone().filter(|a| !a.is_empty()))
    }

    /// Value for the `Authorization` header, basic auth taking priority over
    /// the bearer token.
    pub fn authorization_header(&self) -> Option<String> {
        self.read(|s| {
            if let Some((user, pass)) = &s.basic_auth {
                return Some(basic_auth_header(user, pass));
            }
            s.bearer_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| format!("Bearer {}", t))
        })
    }
}

/// Encode "user:pass" in Base64 and prepend "Basic "
fn basic_auth_header(user: &str, pass: &str) -> String {
    let encoded = BASE64.encode(format!("{}:{}", user, pass));
    format!("Basic {}", encoded)
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.read(|s| {
            f.debug_struct("Credentials")
                .field("basic_auth", &s.basic_auth.as_ref().map(|(user, _)| user))
                .field("bearer_token", &s.bearer_token.as_ref().map(|_| "<redacted>"))
                .field("user_agent", &s.user_agent)
                .finish()
        })
    }
}
