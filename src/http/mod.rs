//! HTTP client module
//!
//! Provides the API client and the machinery wrapped around every request.
//!
//! # Features
//!
//! - **Automatic Retries**: Tagged attempt outcomes with exponential backoff
//! - **Token Refresh**: A rejected bearer token is refreshed once per request
//! - **Rate Limiting**: Server quota headers drive 429 recovery
//! - **Throttling**: Optional token bucket pacing using governor

mod client;
mod rate_limit;
mod retry;
mod throttle;

pub use client::{ApiClient, ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use rate_limit::{
    RateLimitConfig, RateLimitState, RateLimiter, WaitPlan, LIMIT_HEADER, REMAINING_HEADER,
    RETRY_AFTER_HEADER,
};
pub use retry::{AttemptPolicy, Disposition, Outcome, RetryEngine};
pub use throttle::{RequestThrottle, ThrottleConfig};

pub(crate) use retry::json_outcome;
