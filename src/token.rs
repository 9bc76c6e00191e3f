use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Safety margin subtracted from the expiry when deciding whether a token
/// can still be used.
pub const EXPIRY_SKEW_SECS: i64 = 10;

/// Token represents an OAuth2 token with refresh capabilities.
/// It contains both access and refresh tokens for authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Access token for API requests
    pub access_token: String,

    /// Refresh token for renewing expired access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiry instant; no expiry means the token never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// Token type (usually "Bearer")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Token {
    /// Create a token that never expires and cannot be refreshed
    pub fn new(access_token: impl Into<String>) -> Self {
        Token {
            access_token: access_token.into(),
            refresh_token: None,
            expiry: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    /// Set the refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Set the absolute expiry instant
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Build a token from an authorization-server answer received at `now`
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expiry = response
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now + Duration::seconds(secs));

        Token {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            expiry,
            token_type: response.token_type,
        }
    }

    /// Check if we have a refresh token available
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// A token is usable iff its access token is non-empty and it does not
    /// expire within the skew window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }

        match self.expiry {
            None => true,
            Some(expiry) => now < expiry - Duration::seconds(EXPIRY_SKEW_SECS),
        }
    }

    /// Usability against the current clock
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

// Implement Debug manually to avoid exposing the secrets
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Token endpoint answer as sent by the authorization server
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_token_creation() {
        let token = Token::new("access123").with_refresh_token("refresh456");

        assert_eq!(token.access_token, "access123");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh456"));
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
        assert!(token.has_refresh_token());
        assert!(token.is_valid());
    }

    #[test]
    fn test_token_validity_window() {
        let token = Token::new("access").with_expiry(at(1_000));

        assert!(token.is_valid_at(at(900)));
        // inside the skew window
        assert!(!token.is_valid_at(at(995)));
        assert!(!token.is_valid_at(at(1_000)));
        assert!(!token.is_valid_at(at(2_000)));
    }

    #[test]
    fn test_empty_access_token_is_not_valid() {
        let token = Token::new("");
        assert!(!token.is_valid_at(at(0)));
    }

    #[test]
    fn test_empty_refresh_token_does_not_count() {
        let token = Token::new("a").with_refresh_token("");
        assert!(!token.has_refresh_token());
    }

    #[test]
    fn test_token_from_response() {
        let response: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "new-access",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "new-refresh",
                "scope": "read:jira-work offline_access"
            }"#,
        )
        .unwrap();

        let token = Token::from_response(response, at(1_000));
        assert_eq!(token.access_token, "new-access");
        assert_eq!(token.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(token.expiry, Some(at(4_600)));
    }

    #[test]
    fn test_token_serialization() {
        let token = Token::new("access123")
            .with_refresh_token("refresh456")
            .with_expiry(at(1_700_000_000));

        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains("access_token"));
        assert!(json.contains("refresh_token"));

        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_token_debug_redacts_secrets() {
        let token = Token::new("secret-access").with_refresh_token("secret-refresh");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
