//! Server-signalled rate limiting
//!
//! Every response carries quota headers. The [`RateLimiter`] keeps the most
//! recent reading and, when a request comes back 429, decides how long to
//! stay quiet before the next attempt.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Remaining requests in the current window
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
/// Requests allowed per minute
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Epoch second after which requests are accepted again
pub const RETRY_AFTER_HEADER: &str = "X-RateLimit-RetryAfter";

/// Quota reading taken from the latest response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Requests left in the current window
    pub remaining: Option<u64>,
    /// Requests allowed per minute
    pub per_minute_limit: Option<u64>,
    /// When the server will accept requests again
    pub retry_after: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// Read quota headers; missing or unparsable headers become `None`
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_value(headers, REMAINING_HEADER),
            per_minute_limit: header_value(headers, LIMIT_HEADER),
            retry_after: header_value::<i64>(headers, RETRY_AFTER_HEADER)
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Configuration for quota recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Remaining-quota level at or below which an extra cooldown applies
    pub reserve_limit: u64,
    /// Extra wait applied when quota is at or below the reserve
    pub cooldown_period: Duration,
    /// Added on top of the server's retry-after instant
    pub retry_after_margin: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reserve_limit: 10,
            cooldown_period: Duration::from_secs(60),
            retry_after_margin: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit config with the default margin
    pub fn new(reserve_limit: u64, cooldown_period: Duration) -> Self {
        Self {
            reserve_limit,
            cooldown_period,
            ..Self::default()
        }
    }

    /// Override the margin added to the server's retry-after
    #[must_use]
    pub fn with_retry_after_margin(mut self, margin: Duration) -> Self {
        self.retry_after_margin = margin;
        self
    }
}

/// Waits computed for one quota-exhaustion event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitPlan {
    /// Sleep until the retry-after instant (plus margin) has passed
    pub until_retry_after: Duration,
    /// Additional cooldown when the remaining quota is within the reserve
    pub cooldown: Duration,
}

impl WaitPlan {
    /// Total time the plan suspends for
    pub fn total(&self) -> Duration {
        self.until_retry_after.saturating_add(self.cooldown)
    }
}

/// Tracks server quota state and waits out exhaustion
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<RwLock<RateLimitState>>,
}

impl RateLimiter {
    /// Create a rate limiter with the given config
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(RateLimitState::default())),
        }
    }

    /// Get the config
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Replace the quota reading with the one carried by `headers`
    pub async fn observe(&self, headers: &HeaderMap) {
        *self.state.write().await = RateLimitState::from_headers(headers);
    }

    /// Latest quota reading
    pub async fn state(&self) -> RateLimitState {
        *self.state.read().await
    }

    /// Compute the waits for `state` as of `now`
    pub fn plan_wait(&self, state: &RateLimitState, now: DateTime<Utc>) -> WaitPlan {
        let until_retry_after = state
            .retry_after
            .map(|at| {
                let margin = chrono::Duration::from_std(self.config.retry_after_margin)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                // Past the representable range the margin is dropped
                let resume_at = at.checked_add_signed(margin).unwrap_or(at);
                // Negative spans fail `to_std` and clamp to zero
                resume_at
                    .signed_duration_since(now)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            })
            .unwrap_or(Duration::ZERO);

        let cooldown = match state.remaining {
            Some(remaining) if remaining <= self.config.reserve_limit => {
                self.config.cooldown_period
            }
            _ => Duration::ZERO,
        };

        WaitPlan {
            until_retry_after,
            cooldown,
        }
    }

    /// Suspend until it is safe to retry after a 429
    pub async fn on_quota_exhausted(&self) {
        let state = self.state().await;
        let plan = self.plan_wait(&state, Utc::now());

        if !plan.until_retry_after.is_zero() {
            info!(
                sleep_secs = plan.until_retry_after.as_secs(),
                retry_after = ?state.retry_after,
                "quota exhausted, sleeping past retry-after"
            );
            tokio::time::sleep(plan.until_retry_after).await;
        }

        if !plan.cooldown.is_zero() {
            info!(
                remaining = ?state.remaining,
                reserve_limit = self.config.reserve_limit,
                cooldown_secs = plan.cooldown.as_secs(),
                "remaining quota within reserve, cooling down"
            );
            tokio::time::sleep(plan.cooldown).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.reserve_limit, 10);
        assert_eq!(config.cooldown_period, Duration::from_secs(60));
        assert_eq!(config.retry_after_margin, Duration::from_secs(60));
    }

    #[test]
    fn test_state_from_headers() {
        let state = RateLimitState::from_headers(&headers(&[
            ("x-ratelimit-remaining", "5998"),
            ("x-ratelimit-limit", "6000"),
            ("x-ratelimit-retryafter", "1700000000"),
        ]));

        assert_eq!(state.remaining, Some(5998));
        assert_eq!(state.per_minute_limit, Some(6000));
        assert_eq!(
            state.retry_after,
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn test_state_from_headers_missing_or_garbage() {
        let state = RateLimitState::from_headers(&headers(&[("x-ratelimit-remaining", "lots")]));
        assert_eq!(state, RateLimitState::default());
    }

    #[test]
    fn test_plan_wait_adds_margin_to_retry_after() {
        let limiter = RateLimiter::default();
        let now = Utc::now();
        let state = RateLimitState {
            remaining: Some(500),
            per_minute_limit: Some(6000),
            retry_after: Some(now + chrono::Duration::seconds(5)),
        };

        let plan = limiter.plan_wait(&state, now);
        assert_eq!(plan.until_retry_after, Duration::from_secs(65));
        assert_eq!(plan.cooldown, Duration::ZERO);
    }

    #[test]
    fn test_plan_wait_clamps_past_retry_after() {
        let limiter = RateLimiter::default();
        let now = Utc::now();
        let state = RateLimitState {
            retry_after: Some(now - chrono::Duration::seconds(600)),
            ..RateLimitState::default()
        };

        assert_eq!(limiter.plan_wait(&state, now).total(), Duration::ZERO);
    }

    #[test]
    fn test_plan_wait_at_end_of_time_range() {
        let limiter = RateLimiter::default();
        let now = Utc::now();
        let retry_after = DateTime::<Utc>::MAX_UTC.timestamp().to_string();
        let state = RateLimitState::from_headers(&headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-retryafter", retry_after.as_str()),
        ]));
        assert!(state.retry_after.is_some());

        let plan = limiter.plan_wait(&state, now);
        assert!(plan.until_retry_after > Duration::from_secs(365 * 24 * 3600));
        assert_eq!(plan.cooldown, Duration::from_secs(60));
        assert!(plan.total() > plan.until_retry_after);
    }

    #[test]
    fn test_plan_wait_cooldown_within_reserve() {
        let limiter = RateLimiter::new(RateLimitConfig::new(10, Duration::from_secs(30)));
        let now = Utc::now();

        let at_reserve = RateLimitState {
            remaining: Some(10),
            ..RateLimitState::default()
        };
        assert_eq!(
            limiter.plan_wait(&at_reserve, now).cooldown,
            Duration::from_secs(30)
        );

        let above_reserve = RateLimitState {
            remaining: Some(11),
            ..RateLimitState::default()
        };
        assert_eq!(limiter.plan_wait(&above_reserve, now).cooldown, Duration::ZERO);

        let unknown = RateLimitState::default();
        assert_eq!(limiter.plan_wait(&unknown, now), WaitPlan::default());
    }

    #[tokio::test]
    async fn test_observe_is_last_write_wins() {
        let limiter = RateLimiter::default();

        limiter
            .observe(&headers(&[
                ("x-ratelimit-remaining", "3"),
                ("x-ratelimit-limit", "6000"),
            ]))
            .await;
        assert_eq!(limiter.state().await.remaining, Some(3));

        limiter.observe(&HeaderMap::new()).await;
        assert_eq!(limiter.state().await, RateLimitState::default());
    }

    #[tokio::test]
    async fn test_on_quota_exhausted_short_cooldown() {
        let limiter = RateLimiter::new(RateLimitConfig::new(10, Duration::from_millis(20)));
        limiter
            .observe(&headers(&[("x-ratelimit-remaining", "0")]))
            .await;

        let start = std::time::Instant::now();
        limiter.on_quota_exhausted().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
