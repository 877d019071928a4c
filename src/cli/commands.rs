//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Falcon API client CLI
#[derive(Parser, Debug)]
#[command(name = "falcon-client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML); credentials may also come from the environment
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter from `RUST_LOG` directives, `info` when unset or invalid;
    /// `--verbose` raises the default level to debug
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        let filter = rust_log
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new("info"));
        if self.verbose {
            filter.add_directive(tracing::Level::DEBUG.into())
        } else {
            filter
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exchange credentials and print the token expiry
    Token,

    /// Page through an endpoint, printing one JSON item per line
    List {
        /// Resource path, e.g. /devices/queries/devices/v1
        path: String,

        /// Static query parameter (key=value), repeatable
        #[arg(short, long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u64>,
    },

    /// List identifiers, resolve them in bulk, print one JSON record per line
    Hydrate {
        /// Identifier listing path
        ids_path: String,

        /// Bulk entity path
        entities_path: String,

        /// Static query parameter for the listing (key=value), repeatable
        #[arg(short, long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,

        /// Identifier parameter name on the bulk endpoint
        #[arg(long, default_value = "ids")]
        id_param: String,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u64>,
    },
}

/// Parse `key=value`
pub fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
