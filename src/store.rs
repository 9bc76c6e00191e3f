//! Token persistence and refresh notification hooks.

use crate::error::{Error, Result};
use crate::token::Token;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// External persistence for OAuth2 tokens, keyed by an opaque identifier.
pub trait TokenStore: Send + Sync {
    /// Load the token stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<Token>>;

    /// Persist `token` under `key`, replacing any previous value
    fn save(&self, key: &str, token: &Token) -> Result<()>;
}

/// Callback invoked with the new token after every successful refresh
pub type TokenCallback = Arc<dyn Fn(&Token) + Send + Sync>;

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<Token>> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tokens.get(key).cloned())
    }

    fn save(&self, key: &str, token: &Token) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.insert(key.to_string(), token.clone());
        Ok(())
    }
}

/// Token store backed by a JSON file holding a map of key to token.
/// The whole file is rewritten on every save.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, Token>> {
        match fs::read(&self.path) {
            Ok(data) if data.is_empty() => Ok(HashMap::new()),
            Ok(data) => serde_json::from_slice(&data).map_err(|e| self.failure("parse", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(self.failure("read", e)),
        }
    }

    fn failure(&self, action: &str, err: impl std::fmt::Display) -> Error {
        Error::TokenStore(format!("{} {}: {}", action, self.path.display(), err))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<Token>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, token: &Token) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tokens = self.read_all()?;
        tokens.insert(key.to_string(), token.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.failure("create directory for", e))?;
        }
        let data = serde_json::to_vec_pretty(&tokens).map_err(|e| self.failure("encode", e))?;
        fs::write(&self.path, data).map_err(|e| self.failure("write", e))
    }
}

/// Persistence and notification hooks attached to a transport or token source
#[derive(Clone, Default)]
pub struct TokenHooks {
    pub store: Option<Arc<dyn TokenStore>>,
    pub callback: Option<TokenCallback>,
    /// Key under which tokens are loaded and saved
    pub key: String,
}

impl std::fmt::Debug for TokenHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenHooks")
            .field("store", &self.store.is_some())
            .field("callback", &self.callback.is_some())
            .field("key", &self.key)
            .finish()
    }
}
