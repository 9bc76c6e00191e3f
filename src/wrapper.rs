//! Transport decoration for token injection and refresh.
//!
//! A [`TransportWrapper`] remembers the transport it decorates, so it can
//! always be peeled off again, and is never stacked on top of another
//! wrapper: wrapping an already wrapped transport yields the existing
//! wrapper.

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::store::{TokenCallback, TokenHooks, TokenStore};
use crate::token_source::TokenSource;
use crate::transport::{HttpResponse, HttpTransport};
use reqwest::blocking::Request;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tracing::trace;

/// Decorates an underlying transport with token store/callback hooks and,
/// once auto-renewal is installed, bearer token injection.
#[derive(Clone)]
pub struct TransportWrapper {
    original: Arc<dyn HttpTransport>,
    hooks: TokenHooks,
    source: Option<TokenSource>,
    credentials: Option<Arc<Credentials>>,
}

impl TransportWrapper {
    /// Wrap `transport`, reusing its wrapper if it already is one
    pub fn wrap(transport: &Arc<dyn HttpTransport>) -> Self {
        match transport.as_wrapper() {
            Some(wrapper) => wrapper.clone(),
            None => TransportWrapper {
                original: Arc::clone(transport),
                hooks: TokenHooks::default(),
                source: None,
                credentials: None,
            },
        }
    }

    /// The transport this wrapper decorates
    pub fn original(&self) -> &Arc<dyn HttpTransport> {
        &self.original
    }

    pub fn hooks(&self) -> &TokenHooks {
        &self.hooks
    }

    pub fn token_source(&self) -> Option<&TokenSource> {
        self.source.as_ref()
    }

    /// Attach a token store, replacing any previous one
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.hooks.store = Some(store);
        self.rebind()
    }

    /// Attach a refresh callback, replacing any previous one
    pub fn with_callback(mut self, callback: TokenCallback) -> Self {
        self.hooks.callback = Some(callback);
        self.rebind()
    }

    /// Key under which the store loads and saves tokens
    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.hooks.key = key.into();
        self.rebind()
    }

    /// Install auto-renewal: every request gets a bearer token from `source`,
    /// and each token handed out is written back into `credentials`.
    pub fn with_token_source(mut self, source: TokenSource, credentials: Arc<Credentials>) -> Self {
        self.source = Some(source);
        self.credentials = Some(credentials);
        self.rebind()
    }

    /// Erase the concrete type
    pub fn into_transport(self) -> Arc<dyn HttpTransport> {
        Arc::new(self)
    }

    // keep the token source's hooks in line with the wrapper's
    fn rebind(mut self) -> Self {
        if let Some(source) = &self.source {
            self.source = Some(source.with_hooks(self.hooks.clone()));
        }
        self
    }
}

impl HttpTransport for TransportWrapper {
    fn send(&self, mut request: Request) -> Result<HttpResponse> {
        // an explicit basic-auth header wins; the token source is not consulted
        let has_basic = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Basic "));

        if let Some(source) = self.source.as_ref().filter(|_| !has_basic) {
            let token = source.token()?;
            if let Some(credentials) = &self.credentials {
                credentials.set_bearer_token(token.access_token.as_str());
            }

            let value = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
                .map_err(|e| Error::RequestBuild(format!("invalid access token: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
            trace!(url = %request.url(), "bearer token injected");
        }

        self.original.send(request)
    }

    fn as_wrapper(&self) -> Option<&TransportWrapper> {
        Some(self)
    }
}

impl std::fmt::Debug for TransportWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWrapper")
            .field("hooks", &self.hooks)
            .field("auto_renewal", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

/// Return the transport decorated by `transport` if it is a wrapper
pub fn unwrap_transport(transport: &Arc<dyn HttpTransport>) -> Option<Arc<dyn HttpTransport>> {
    transport
        .as_wrapper()
        .map(|wrapper| Arc::clone(wrapper.original()))
}

/// Walk through any number of wrapper layers to the innermost transport
pub fn extract_base_transport(transport: &Arc<dyn HttpTransport>) -> Arc<dyn HttpTransport> {
    let mut current = Arc::clone(transport);
    while let Some(inner) = unwrap_transport(&current) {
        current = inner;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use crate::token::Token;
    use crate::token_source::TokenRefresher;
    use chrono::{Duration, Utc};
    use reqwest::{Method, StatusCode};
    use std::sync::Mutex;
    use url::Url;

    #[derive(Default)]
    struct Recorder {
        authorization: Mutex<Vec<Option<String>>>,
    }

    impl HttpTransport for Recorder {
        fn send(&self, request: Request) -> Result<HttpResponse> {
            let auth = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            self.authorization.lock().unwrap().push(auth);
            Ok(HttpResponse::new(StatusCode::OK, request.url().clone()))
        }
    }

    struct StaticRefresher;

    impl TokenRefresher for StaticRefresher {
        fn refresh(&self, _refresh_token: &str) -> Result<Token> {
            Ok(Token::new("renewed").with_expiry(Utc::now() + Duration::hours(1)))
        }
    }

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("https://x.atlassian.net/rest/api/3/myself").unwrap())
    }

    #[test]
    fn test_unwrap_recovers_original() {
        let base: Arc<dyn HttpTransport> = Arc::new(Recorder::default());
        let wrapped = TransportWrapper::wrap(&base).into_transport();

        let original = unwrap_transport(&wrapped).unwrap();
        assert!(Arc::ptr_eq(&original, &base));
        assert!(unwrap_transport(&base).is_none());
    }

    #[test]
    fn test_wrap_is_idempotent() {
        let base: Arc<dyn HttpTransport> = Arc::new(Recorder::default());
        let once = TransportWrapper::wrap(&base).into_transport();
        let twice = TransportWrapper::wrap(&once).into_transport();

        // no nested layer: one unwrap reaches the base transport
        let inner = unwrap_transport(&twice).unwrap();
        assert!(Arc::ptr_eq(&inner, &base));
        assert!(inner.as_wrapper().is_none());
    }

    #[test]
    fn test_extract_base_transport_is_idempotent() {
        let base: Arc<dyn HttpTransport> = Arc::new(Recorder::default());
        let wrapped = TransportWrapper::wrap(&base).into_transport();

        let extracted = extract_base_transport(&wrapped);
        assert!(Arc::ptr_eq(&extracted, &base));
        assert!(Arc::ptr_eq(&extract_base_transport(&extracted), &extracted));
        assert!(Arc::ptr_eq(&extract_base_transport(&base), &base));
    }

    #[test]
    fn test_hooks_are_last_wins() {
        let base: Arc<dyn HttpTransport> = Arc::new(Recorder::default());
        let first: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let second: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());

        let wrapper = TransportWrapper::wrap(&base)
            .with_store(Arc::clone(&first))
            .with_store(Arc::clone(&second));

        assert!(Arc::ptr_eq(wrapper.hooks().store.as_ref().unwrap(), &second));
    }

    #[test]
    fn test_rewrapping_keeps_hooks() {
        let base: Arc<dyn HttpTransport> = Arc::new(Recorder::default());
        let wrapped = TransportWrapper::wrap(&base)
            .with_callback(Arc::new(|_: &Token| {}))
            .into_transport();

        let again = TransportWrapper::wrap(&wrapped);
        assert!(again.hooks().callback.is_some());
    }

    #[test]
    fn test_plain_wrapper_passes_requests_through() {
        let recorder = Arc::new(Recorder::default());
        let base: Arc<dyn HttpTransport> = recorder.clone();
        let wrapper = TransportWrapper::wrap(&base);

        wrapper.send(request()).unwrap();
        assert_eq!(*recorder.authorization.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_token_source_injects_bearer() {
        let recorder = Arc::new(Recorder::default());
        let base: Arc<dyn HttpTransport> = recorder.clone();
        let credentials = Arc::new(Credentials::new());
        let expired = Token::new("old")
            .with_refresh_token("r")
            .with_expiry(Utc::now() - Duration::minutes(1));
        let source = TokenSource::new(expired, Arc::new(StaticRefresher));

        let wrapper = TransportWrapper::wrap(&base).with_token_source(source, Arc::clone(&credentials));
        wrapper.send(request()).unwrap();

        assert_eq!(
            *recorder.authorization.lock().unwrap(),
            vec![Some("Bearer renewed".to_string())]
        );
        assert_eq!(credentials.get_bearer_token().as_deref(), Some("renewed"));
    }

    #[test]
    fn test_basic_auth_header_is_not_replaced() {
        let recorder = Arc::new(Recorder::default());
        let base: Arc<dyn HttpTransport> = recorder.clone();
        let source = TokenSource::new(Token::new("tok"), Arc::new(StaticRefresher));
        let wrapper =
            TransportWrapper::wrap(&base).with_token_source(source, Arc::new(Credentials::new()));

        let mut req = request();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic dTpw"));
        wrapper.send(req).unwrap();

        assert_eq!(
            *recorder.authorization.lock().unwrap(),
            vec![Some("Basic dTpw".to_string())]
        );
    }

    #[test]
    fn test_store_attached_after_source_reaches_source() {
        let base: Arc<dyn HttpTransport> = Arc::new(Recorder::default());
        let source = TokenSource::new(Token::new("tok"), Arc::new(StaticRefresher));
        let wrapper = TransportWrapper::wrap(&base)
            .with_token_source(source.clone(), Arc::new(Credentials::new()))
            .with_store(Arc::new(MemoryTokenStore::new()));

        let bound = wrapper.token_source().unwrap();
        assert!(bound.hooks().store.is_some());
        assert!(bound.shares_state_with(&source));
    }
}
