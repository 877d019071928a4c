//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::ConfigFile;
use crate::error::Result;
use crate::http::ApiClient;
use crate::pagination::{HydrateRequest, PageControl};
use serde_json::{json, Value};
use std::io::Write;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let client = self.client()?;

        match &self.cli.command {
            Commands::Token => self.token(&client).await,
            Commands::List {
                path,
                query,
                max_pages,
            } => self.list(&client, path, query, *max_pages).await,
            Commands::Hydrate {
                ids_path,
                entities_path,
                query,
                id_param,
                max_pages,
            } => {
                let hydrate = HydrateRequest::new(entities_path).with_id_param(id_param);
                self.hydrate(&client, ids_path, query, &hydrate, *max_pages)
                    .await
            }
        }
    }

    /// Build a client from the config file (if any) and the environment
    fn client(&self) -> Result<ApiClient> {
        let file = match &self.cli.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };
        ApiClient::new(file.apply_env().into_client_config()?)
    }

    async fn token(&self, client: &ApiClient) -> Result<()> {
        let token = client.authenticate().await?;
        println!(
            "{}",
            json!({ "expires_at": token.expires_at().to_rfc3339() })
        );
        Ok(())
    }

    async fn list(
        &self,
        client: &ApiClient,
        path: &str,
        query: &[(String, String)],
        max_pages: Option<u64>,
    ) -> Result<()> {
        let mut pages = 0;
        let summary = client
            .paginator()
            .run::<Value, _, _>(path, query, |items| {
                pages += 1;
                let control = page_control(pages, max_pages);
                async move { write_lines(&items).map(|()| control) }
            })
            .await?;

        tracing::info!(pages = summary.pages, items = summary.items, "list finished");
        Ok(())
    }

    async fn hydrate(
        &self,
        client: &ApiClient,
        ids_path: &str,
        query: &[(String, String)],
        hydrate: &HydrateRequest,
        max_pages: Option<u64>,
    ) -> Result<()> {
        let mut pages = 0;
        let summary = client
            .paginator()
            .run_hydrated::<Value, _, _>(ids_path, query, hydrate, |records| {
                pages += 1;
                let control = page_control(pages, max_pages);
                async move { write_lines(&records).map(|()| control) }
            })
            .await?;

        tracing::info!(pages = summary.pages, ids = summary.items, "hydrate finished");
        Ok(())
    }
}

fn page_control(pages: u64, max_pages: Option<u64>) -> PageControl {
    match max_pages {
        Some(max) if pages >= max => PageControl::Stop,
        _ => PageControl::Continue,
    }
}

/// Write one JSON document per line to stdout
fn write_lines(items: &[Value]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_control() {
        assert_eq!(page_control(1, None), PageControl::Continue);
        assert_eq!(page_control(1, Some(2)), PageControl::Continue);
        assert_eq!(page_control(2, Some(2)), PageControl::Stop);
    }
}
