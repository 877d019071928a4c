//! Token lifecycle
//!
//! Holds the current bearer token and refreshes it through an
//! [`Authenticator`] when it is absent or expired.

use super::authenticator::Authenticator;
use super::types::Token;
use crate::error::{Error, Result};
use tokio::sync::RwLock;
use tracing::debug;

/// Holder of the current bearer token
///
/// Refreshes are single-flight: the exchange runs under the write lock, and
/// callers that queued behind it pick up the token it produced.
pub struct TokenStore {
    authenticator: Box<dyn Authenticator>,
    token: RwLock<Option<Token>>,
}

impl TokenStore {
    /// Create an empty store; the first `authenticate()` performs an exchange
    pub fn new(authenticator: Box<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            token: RwLock::new(None),
        }
    }

    /// Create a store seeded with an already-issued token
    pub fn with_token(authenticator: Box<dyn Authenticator>, token: Token) -> Self {
        Self {
            authenticator,
            token: RwLock::new(Some(token)),
        }
    }

    /// Return a valid token, exchanging credentials if the held one is
    /// absent or expired
    pub async fn authenticate(&self) -> Result<Token> {
        {
            let held = self.token.read().await;
            if let Some(token) = held.as_ref().filter(|t| t.is_valid()) {
                return Ok(token.clone());
            }
        }

        let mut held = self.token.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = held.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }

        debug!("access token absent or expired, exchanging credentials");
        let token = self.authenticator.exchange().await?;
        if !token.is_valid() {
            return Err(Error::authentication(format!(
                "token endpoint issued a token that expired at {}",
                token.expires_at()
            )));
        }

        *held = Some(token.clone());
        Ok(token)
    }

    /// Drop the held token so the next `authenticate()` exchanges anew
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    /// The held token, valid or not
    pub async fn current(&self) -> Option<Token> {
        self.token.read().await.clone()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
