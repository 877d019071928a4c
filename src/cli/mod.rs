//! CLI module
//!
//! Command-line interface for ad-hoc pulls.
//!
//! # Commands
//!
//! - `token` - Exchange credentials and print the token expiry
//! - `list` - Page through an endpoint, one JSON item per line
//! - `hydrate` - List identifiers, resolve them in bulk, one JSON record per line

mod commands;
mod runner;

pub use commands::{parse_query_pair, Cli, Commands};
pub use runner::Runner;
