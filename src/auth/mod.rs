//! Authentication module
//!
//! Supports one scheme: OAuth2 client credentials.
//!
//! The `TokenStore` caches the bearer token and asks its `Authenticator`
//! for a new one when the cached token is absent or expired.

mod authenticator;
mod token_store;
mod types;

pub use authenticator::{Authenticator, ClientCredentialsAuthenticator, TOKEN_PATH};
pub use token_store::TokenStore;
pub use types::{Credentials, Token};
