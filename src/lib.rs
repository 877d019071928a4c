//! # Falcon Client
//!
//! A resilient client for rate-limited, cursor-paginated, OAuth2-protected
//! resource APIs.
//!
//! ## Features
//!
//! - **Transparent Auth**: OAuth2 client-credentials tokens fetched and refreshed on demand
//! - **Cursor Pagination**: Drive `limit`/`offset`/`after` cursors to the reported total
//! - **Retry Engine**: Exponential backoff with a bounded attempt count and per-attempt timeout
//! - **Rate Limits**: Recover from 429 using the server's quota headers
//! - **Streaming**: Pages reach the caller one at a time, never buffered
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use falcon_client::{ApiClient, ClientConfig, Credentials, PageControl, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::new(
//!         "https://api.crowdstrike.com",
//!         Credentials::new("client-id", "client-secret"),
//!     );
//!     let client = ApiClient::new(config)?;
//!
//!     let query = falcon_client::query_params([("id", "policy-123")]);
//!     client
//!         .paginator()
//!         .run::<String, _, _>("/policy/queries/prevention-members/v1", &query, |ids| async move {
//!             println!("{ids:?}");
//!             Ok(PageControl::Continue)
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Paginator   run() / run_hydrated() / pages()                │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ one page request
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │  RetryEngine   Outcome: Success | Retry | RateLimited |      │
//! │                         Reauthenticate | Abort | Escalate    │
//! └────────┬─────────────────────┬───────────────────────┬───────┘
//!          │                     │                       │
//! ┌────────┴───────┐   ┌─────────┴────────┐   ┌──────────┴───────┐
//! │  TokenStore    │   │  RateLimiter     │   │  RequestThrottle │
//! │  Authenticator │   │  429 recovery    │   │  (optional)      │
//! └────────────────┘   └──────────────────┘   └──────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// OAuth2 token lifecycle
pub mod auth;

/// API client, retry engine and rate limiting
pub mod http;

/// Cursor pagination
pub mod pagination;

/// YAML configuration and environment overrides
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use auth::{Credentials, Token};
pub use error::{Error, Result};
pub use http::{ApiClient, AttemptPolicy, ClientConfig, RateLimitConfig};
pub use pagination::{HydrateRequest, Page, PageControl, PaginationCursor, RunSummary};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
