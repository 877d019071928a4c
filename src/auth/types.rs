//! Credential and token types

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// OAuth2 client credentials
///
/// Supplied once at construction and never mutated. `Debug` output redacts
/// the secret.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// OAuth2 client ID
    #[serde(default)]
    pub client_id: String,
    /// OAuth2 client secret
    #[serde(default)]
    pub client_secret: String,
}

impl Credentials {
    /// Create a new credential pair
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Whether both halves of the pair are present
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token with an absolute expiry
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token expiring at the given instant
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// Create a token that expires in N seconds from now
    ///
    /// Fails when the lifetime does not fit in the representable time range.
    pub fn expires_in(secret: impl Into<String>, seconds: i64) -> Result<Self> {
        chrono::Duration::try_seconds(seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .map(|expires_at| Self::new(secret, expires_at))
            .ok_or_else(|| {
                Error::authentication(format!("token lifetime out of range: {seconds}s"))
            })
    }

    /// The bearer credential
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// When the token stops being accepted
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Valid while `expires_at` is strictly in the future
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Check validity against the current time
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_token_validity_boundaries() {
        let now = Utc::now();
        let past = Token::new("t", now - chrono::Duration::seconds(1));
        let exact = Token::new("t", now);
        let future = Token::new("t", now + chrono::Duration::seconds(1));

        assert!(!past.is_valid_at(now));
        assert!(!exact.is_valid_at(now));
        assert!(future.is_valid_at(now));
    }

    #[test]
    fn test_token_expires_in() {
        assert!(Token::expires_in("t", 1800).unwrap().is_valid());
        assert!(!Token::expires_in("t", -100).unwrap().is_valid());
    }

    #[test]
    fn test_token_expires_in_out_of_range() {
        for seconds in [i64::MAX, i64::MIN] {
            let err = Token::expires_in("t", seconds).unwrap_err();
            assert!(matches!(err, Error::Authentication { .. }));
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("id-1", "super-secret");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("id-1"));
        assert!(!rendered.contains("super-secret"));

        let token = Token::expires_in("bearer-value", 60).unwrap();
        assert!(!format!("{token:?}").contains("bearer-value"));
    }

    #[test]
    fn test_credentials_complete() {
        assert!(Credentials::new("a", "b").is_complete());
        assert!(!Credentials::new("a", "").is_complete());
        assert!(!Credentials::default().is_complete());
    }
}
