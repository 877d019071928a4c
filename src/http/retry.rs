//! Retry engine
//!
//! Every outbound call goes through [`RetryEngine::execute`]. The caller
//! supplies one attempt as a closure that returns a tagged [`Outcome`]; the
//! engine owns the loop around it:
//!
//! | Outcome          | Engine action                                      |
//! |------------------|----------------------------------------------------|
//! | `Success`        | return the value                                   |
//! | `Retry`          | exponential backoff, next attempt                  |
//! | `RateLimited`    | wait on the [`RateLimiter`], next attempt          |
//! | `Reauthenticate` | drop the token once, next attempt; else escalate   |
//! | `Abort`          | return the error (not retryable)                   |
//! | `Escalate`       | return the error (auth-class, never retried)       |
//!
//! All attempts count toward `max_attempts`. When the budget runs out the
//! last classified error is returned.

use super::rate_limit::RateLimiter;
use super::throttle::RequestThrottle;
use crate::auth::TokenStore;
use crate::error::{Error, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Attempt budget and backoff shape for one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPolicy {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Timeout for each individual attempt
    pub per_attempt_timeout: Duration,
    /// Multiplier applied to the delay after every retry
    pub backoff_factor: u32,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            per_attempt_timeout: Duration::from_secs(180),
            backoff_factor: 2,
        }
    }
}

impl AttemptPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay before the first retry
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    /// Set the backoff multiplier
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: u32) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Delay before retry `n` (1-based): `initial_delay * factor^(n-1)`
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_factor
            .saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

/// Result of a single attempt, as seen by the retry loop
#[derive(Debug)]
pub enum Outcome<T> {
    /// The attempt produced a value
    Success(T),
    /// Transient fault; back off and try again
    Retry(Error),
    /// Quota exhausted; wait on the rate limiter and try again
    RateLimited(Error),
    /// Bearer token rejected; refresh and try again
    Reauthenticate(Error),
    /// Not retryable; stop with this error
    Abort(Error),
    /// Auth-class failure; stop with this error
    Escalate(Error),
}

impl<T> Outcome<T> {
    /// Map the success value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Retry(e) => Outcome::Retry(e),
            Outcome::RateLimited(e) => Outcome::RateLimited(e),
            Outcome::Reauthenticate(e) => Outcome::Reauthenticate(e),
            Outcome::Abort(e) => Outcome::Abort(e),
            Outcome::Escalate(e) => Outcome::Escalate(e),
        }
    }

    /// Map the success value through a fallible conversion; a failed
    /// conversion aborts
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => match f(value) {
                Ok(mapped) => Outcome::Success(mapped),
                Err(e) => Outcome::Abort(e),
            },
            Outcome::Retry(e) => Outcome::Retry(e),
            Outcome::RateLimited(e) => Outcome::RateLimited(e),
            Outcome::Reauthenticate(e) => Outcome::Reauthenticate(e),
            Outcome::Abort(e) => Outcome::Abort(e),
            Outcome::Escalate(e) => Outcome::Escalate(e),
        }
    }
}

/// Classification of a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 2xx
    Success,
    /// 401: bearer token rejected
    Unauthorized,
    /// 403: credentials lack the required scope
    Forbidden,
    /// 429: quota exhausted
    QuotaExhausted,
    /// Permanently rejected request (token exchange 400)
    Rejected,
    /// Anything else; worth another attempt
    Transient,
}

impl Disposition {
    /// Classify a resource call status
    pub fn for_resource(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => Self::Success,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            429 => Self::QuotaExhausted,
            _ => Self::Transient,
        }
    }

    /// Classify a token exchange status
    pub fn for_token_exchange(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => Self::Success,
            400 => Self::Rejected,
            403 => Self::Forbidden,
            429 => Self::QuotaExhausted,
            _ => Self::Transient,
        }
    }
}

/// Map a reqwest send/read failure onto the crate error
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        Error::Http(err)
    }
}

/// Read a successful response body as JSON
///
/// A body that fails mid-read is transient; a body that is not the expected
/// JSON will not improve on retry.
pub(crate) async fn json_outcome<T: DeserializeOwned>(
    response: Response,
    timeout: Duration,
) -> Outcome<T> {
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return Outcome::Retry(transport_error(e, timeout)),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Outcome::Success(value),
        Err(e) => Outcome::Abort(Error::JsonParse(e)),
    }
}

/// Runs attempts under an [`AttemptPolicy`]
#[derive(Debug)]
pub struct RetryEngine {
    policy: AttemptPolicy,
    rate_limiter: RateLimiter,
    throttle: Option<RequestThrottle>,
}

impl RetryEngine {
    /// Create an engine with the given policy and rate limiter
    pub fn new(policy: AttemptPolicy, rate_limiter: RateLimiter) -> Self {
        Self {
            policy,
            rate_limiter,
            throttle: None,
        }
    }

    /// Pace every attempt through a client-side throttle
    #[must_use]
    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Get the attempt policy
    pub fn policy(&self) -> &AttemptPolicy {
        &self.policy
    }

    /// Get the rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Send one attempt: throttle, apply the per-attempt timeout, and record
    /// quota headers from whatever response comes back
    pub async fn dispatch(&self, request: RequestBuilder) -> Result<Response> {
        if let Some(ref throttle) = self.throttle {
            throttle.wait().await;
        }

        let timeout = self.policy.per_attempt_timeout;
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        self.rate_limiter.observe(response.headers()).await;
        Ok(response)
    }

    /// Run `attempt` until it succeeds, fails for good, or the budget is
    /// spent
    ///
    /// `tokens` is the store to invalidate on a `Reauthenticate` outcome.
    /// Only one forced refresh happens per call; a second rejection escalates
    /// as [`Error::Authentication`].
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        tokens: Option<&TokenStore>,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut refreshed = false;
        let mut number = 1;

        loop {
            debug!(operation, attempt = number, max_attempts, "sending request");
            let outcome = attempt(number).await;
            let last = number >= max_attempts;

            match outcome {
                Outcome::Success(value) => {
                    if number > 1 {
                        info!(operation, attempt = number, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Outcome::Abort(err) => {
                    warn!(operation, attempt = number, error = %err, "request failed, not retryable");
                    return Err(err);
                }
                Outcome::Escalate(err) => {
                    error!(operation, attempt = number, error = %err, "request rejected, escalating");
                    return Err(err);
                }
                Outcome::Reauthenticate(err) => {
                    let store = match tokens {
                        Some(store) if !refreshed && !last => store,
                        _ => {
                            error!(
                                operation,
                                attempt = number,
                                error = %err,
                                "access token rejected after refresh"
                            );
                            return Err(Error::authentication(format!(
                                "{operation}: access token rejected: {err}"
                            )));
                        }
                    };
                    warn!(operation, attempt = number, "access token rejected, forcing refresh");
                    store.invalidate().await;
                    refreshed = true;
                }
                Outcome::RateLimited(err) => {
                    if last {
                        error!(operation, attempt = number, error = %err, "retries exhausted while rate limited");
                        return Err(err);
                    }
                    warn!(
                        operation,
                        attempt = number,
                        max_attempts,
                        "quota exhausted, waiting on rate limiter"
                    );
                    self.rate_limiter.on_quota_exhausted().await;
                }
                Outcome::Retry(err) => {
                    if last {
                        error!(operation, attempt = number, error = %err, "retries exhausted");
                        return Err(err);
                    }
                    let delay = self.policy.backoff_delay(number);
                    warn!(
                        operation,
                        attempt = number,
                        max_attempts,
                        status = ?err.status(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            number += 1;
        }
    }
}
