//! Authenticator implementations
//!
//! An [`Authenticator`] turns credentials into a fresh [`Token`]. The
//! built-in [`ClientCredentialsAuthenticator`] performs the OAuth2
//! client-credentials exchange through the [`RetryEngine`], with its own
//! failure classification:
//!
//! - 400: credentials malformed, abort without retrying
//! - 403: escalate as an authentication failure
//! - 429: wait for the rate limiter, then retry
//! - anything else: generic retry policy

use super::types::{Credentials, Token};
use crate::error::{Error, Result};
use crate::http::{json_outcome, Disposition, Outcome, RetryEngine};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Path of the token endpoint, relative to the API base URL
pub const TOKEN_PATH: &str = "oauth2/token";

/// Source of fresh bearer tokens
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for a new token
    async fn exchange(&self) -> Result<Token>;
}

/// OAuth2 client-credentials exchange against a fixed token endpoint
pub struct ClientCredentialsAuthenticator {
    http: Client,
    token_url: Url,
    credentials: Credentials,
    engine: Arc<RetryEngine>,
}

impl ClientCredentialsAuthenticator {
    /// Create an authenticator posting to `token_url`
    pub fn new(
        http: Client,
        token_url: Url,
        credentials: Credentials,
        engine: Arc<RetryEngine>,
    ) -> Self {
        Self {
            http,
            token_url,
            credentials,
            engine,
        }
    }

    /// The token endpoint this authenticator posts to
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    async fn attempt(&self) -> Outcome<Token> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        let request = self
            .http
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&form);

        match self.engine.dispatch(request).await {
            Ok(response) => self.classify(response).await,
            Err(err) => Outcome::Retry(err),
        }
    }

    async fn classify(&self, response: Response) -> Outcome<Token> {
        let status = response.status();
        let disposition = Disposition::for_token_exchange(status);
        if disposition == Disposition::Success {
            return json_outcome::<TokenResponse>(response, self.engine.policy().per_attempt_timeout)
                .await
                .try_map(TokenResponse::into_token);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        match disposition {
            Disposition::Rejected => Outcome::Abort(Error::authentication(format!(
                "token request rejected with status {code}: {body}"
            ))),
            Disposition::Forbidden => Outcome::Escalate(Error::authentication(format!(
                "token request forbidden with status {code}: {body}"
            ))),
            Disposition::QuotaExhausted => Outcome::RateLimited(Error::api(code, body)),
            _ => Outcome::Retry(Error::api(code, body)),
        }
    }
}

#[async_trait]
impl Authenticator for ClientCredentialsAuthenticator {
    async fn exchange(&self) -> Result<Token> {
        let token = self
            .engine
            .execute("oauth2_token", None, |_| self.attempt())
            .await?;
        info!(expires_at = %token.expires_at(), "obtained access token");
        Ok(token)
    }
}

impl std::fmt::Debug for ClientCredentialsAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsAuthenticator")
            .field("token_url", &self.token_url.as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<Token> {
        Token::expires_in(self.access_token, self.expires_in)
    }
}
