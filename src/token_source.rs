use crate::error::{Error, Result};
use crate::store::TokenHooks;
use crate::token::Token;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Exchanges a refresh token for a new token at the authorization server.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, refresh_token: &str) -> Result<Token>;
}

/// TokenSource hands out a currently usable access token, refreshing the
/// held token when it has expired.
///
/// Refreshes happen while the held token's lock is taken, so concurrent
/// callers queue behind a single in-flight refresh and then observe its
/// result instead of starting their own. Clones share the held token.
#[derive(Clone)]
pub struct TokenSource {
    current: Arc<Mutex<Token>>,
    refresher: Arc<dyn TokenRefresher>,
    hooks: TokenHooks,
}

impl TokenSource {
    pub fn new(token: Token, refresher: Arc<dyn TokenRefresher>) -> Self {
        TokenSource {
            current: Arc::new(Mutex::new(token)),
            refresher,
            hooks: TokenHooks::default(),
        }
    }

    /// Same held token, different persistence and notification hooks
    pub fn with_hooks(&self, hooks: TokenHooks) -> Self {
        TokenSource {
            current: Arc::clone(&self.current),
            refresher: Arc::clone(&self.refresher),
            hooks,
        }
    }

    pub fn hooks(&self) -> &TokenHooks {
        &self.hooks
    }

    /// Snapshot of the held token, without refreshing
    pub fn current(&self) -> Token {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether two sources share the same held token
    pub fn shares_state_with(&self, other: &TokenSource) -> bool {
        Arc::ptr_eq(&self.current, &other.current)
    }

    /// Return a usable token, refreshing it first if needed.
    ///
    /// A usable token found in the store is adopted without a network call.
    /// After a refresh the new token is saved to the store and passed to the
    /// callback before any caller sees it.
    pub fn token(&self) -> Result<Token> {
        let mut held = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        if held.is_valid_at(now) {
            return Ok(held.clone());
        }

        if let Some(store) = &self.hooks.store {
            if let Some(stored) = store.load(&self.hooks.key)? {
                if stored.is_valid_at(now) {
                    debug!(key = %self.hooks.key, "adopting stored token");
                    *held = stored.clone();
                    return Ok(stored);
                }
                if stored.has_refresh_token() {
                    held.refresh_token = stored.refresh_token;
                }
            }
        }

        let refresh_token = match held.refresh_token.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(Error::NoRefreshToken),
        };

        debug!("access token expired, refreshing");
        let mut renewed = self.refresher.refresh(&refresh_token).map_err(|e| {
            warn!(error = %e, "token refresh failed");
            e
        })?;

        // servers that do not rotate refresh tokens omit them from the answer
        if !renewed.has_refresh_token() {
            renewed.refresh_token = Some(refresh_token);
        }
        *held = renewed.clone();

        let saved = match &self.hooks.store {
            Some(store) => store.save(&self.hooks.key, &renewed),
            None => Ok(()),
        };
        if let Some(callback) = &self.hooks.callback {
            callback(&renewed);
        }
        saved?;

        debug!(expiry = ?renewed.expiry, "access token refreshed");
        Ok(renewed)
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("current", &self.current())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
