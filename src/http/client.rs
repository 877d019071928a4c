//! API client
//!
//! Ties the token store, retry engine and rate limiter together for one base
//! URL and one credential set. Every resource request:
//! - fetches a valid bearer token (refreshing transparently)
//! - goes through the retry engine with a per-attempt timeout
//! - records the server's quota headers
//! - is classified for retry, refresh, cooldown or abort

use super::rate_limit::{RateLimitConfig, RateLimitState, RateLimiter};
use super::retry::{json_outcome, AttemptPolicy, Disposition, Outcome, RetryEngine};
use super::throttle::{RequestThrottle, ThrottleConfig};
use crate::auth::{
    Authenticator, ClientCredentialsAuthenticator, Credentials, Token, TokenStore, TOKEN_PATH,
};
use crate::error::{Error, Result};
use crate::pagination::{Page, Paginator, ResponseEnvelope};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.crowdstrike.com";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for all requests
    pub base_url: String,
    /// OAuth2 client credentials
    pub credentials: Credentials,
    /// Retry budget and backoff
    pub attempt_policy: AttemptPolicy,
    /// Quota recovery settings
    pub rate_limit: RateLimitConfig,
    /// Optional client-side pacing
    pub throttle: Option<ThrottleConfig>,
    /// User agent string
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a config with default policy for the given endpoint and credentials
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            attempt_policy: AttemptPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            throttle: None,
            user_agent: format!("falcon-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Create a new config builder
    pub fn builder(base_url: impl Into<String>, credentials: Credentials) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(base_url, credentials),
        }
    }
}

/// Builder for client config
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the attempt policy
    pub fn attempt_policy(mut self, policy: AttemptPolicy) -> Self {
        self.config.attempt_policy = policy;
        self
    }

    /// Set rate limit recovery settings
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Enable client-side pacing
    pub fn throttle(mut self, config: ThrottleConfig) -> Self {
        self.config.throttle = Some(config);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Client for one API tenant
///
/// One pagination run is active per instance at a time; concurrent runs
/// queue on an internal guard. Create one client per concurrent flow.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    engine: Arc<RetryEngine>,
    tokens: TokenStore,
    run_guard: Mutex<()>,
}

impl ApiClient {
    /// Create a client using the OAuth2 client-credentials exchange
    pub fn new(config: ClientConfig) -> Result<Self> {
        let (http, base_url, engine) = Self::parts(&config)?;
        let token_url = base_url.join(TOKEN_PATH)?;
        let authenticator = ClientCredentialsAuthenticator::new(
            http.clone(),
            token_url,
            config.credentials,
            engine.clone(),
        );
        Ok(Self::assemble(
            http,
            base_url,
            engine,
            TokenStore::new(Box::new(authenticator)),
        ))
    }

    /// Create a client with a caller-supplied token source
    pub fn with_authenticator(
        config: ClientConfig,
        authenticator: impl Authenticator + 'static,
    ) -> Result<Self> {
        let (http, base_url, engine) = Self::parts(&config)?;
        Ok(Self::assemble(
            http,
            base_url,
            engine,
            TokenStore::new(Box::new(authenticator)),
        ))
    }

    fn parts(config: &ClientConfig) -> Result<(Client, Url, Arc<RetryEngine>)> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(Error::Http)?;

        // Trailing slash so relative joins append instead of replacing
        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))?;

        let mut engine = RetryEngine::new(
            config.attempt_policy.clone(),
            RateLimiter::new(config.rate_limit.clone()),
        );
        if let Some(ref throttle) = config.throttle {
            engine = engine.with_throttle(RequestThrottle::new(throttle));
        }

        Ok((http, base_url, Arc::new(engine)))
    }

    fn assemble(http: Client, base_url: Url, engine: Arc<RetryEngine>, tokens: TokenStore) -> Self {
        Self {
            http,
            base_url,
            engine,
            tokens,
            run_guard: Mutex::new(()),
        }
    }

    /// Get a valid bearer token, exchanging credentials if needed
    pub async fn authenticate(&self) -> Result<Token> {
        self.tokens.authenticate().await
    }

    /// Get the token store
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Latest quota reading from the server
    pub async fn rate_limit_state(&self) -> RateLimitState {
        self.engine.rate_limiter().state().await
    }

    /// Get the attempt policy
    pub fn attempt_policy(&self) -> &AttemptPolicy {
        self.engine.policy()
    }

    /// Paginator bound to this client
    pub fn paginator(&self) -> Paginator<'_> {
        Paginator::new(self)
    }

    pub(crate) fn run_guard(&self) -> &Mutex<()> {
        &self.run_guard
    }

    /// Fetch a single page of resources
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Page<T>> {
        let url = self.endpoint(path)?;
        let envelope: ResponseEnvelope<T> = self
            .engine
            .execute(path, Some(&self.tokens), |_| {
                let url = url.clone();
                async move {
                    let token = match self.tokens.authenticate().await {
                        Ok(token) => token,
                        Err(err) => return Outcome::Abort(err),
                    };
                    let request = self
                        .http
                        .get(url)
                        .query(query)
                        .bearer_auth(token.secret())
                        .header(ACCEPT, "application/json");

                    match self.engine.dispatch(request).await {
                        Ok(response) => self.classify(response).await,
                        Err(err) => Outcome::Retry(err),
                    }
                }
            })
            .await?;
        Ok(envelope.into_page())
    }

    async fn classify<T: DeserializeOwned>(&self, response: Response) -> Outcome<T> {
        let status = response.status();
        let disposition = Disposition::for_resource(status);
        if disposition == Disposition::Success {
            return json_outcome(response, self.engine.policy().per_attempt_timeout).await;
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        match disposition {
            Disposition::Unauthorized => Outcome::Reauthenticate(Error::api(code, body)),
            Disposition::Forbidden => Outcome::Escalate(Error::authorization(format!(
                "status {code}: {body}"
            ))),
            Disposition::QuotaExhausted => Outcome::RateLimited(Error::api(code, body)),
            _ => Outcome::Retry(Error::api(code, body)),
        }
    }

    /// Build full URL from path
    fn endpoint(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("policy", self.engine.policy())
            .finish_non_exhaustive()
    }
}
