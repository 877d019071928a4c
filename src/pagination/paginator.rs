//! Page iteration
//!
//! Drives page requests through the client until the collection is
//! exhausted. Pages are handed out one at a time and never accumulated.

use super::types::{HydrateRequest, Page, PageControl, PaginationState, RunSummary};
use crate::error::Result;
use crate::http::ApiClient;
use futures::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

/// Iterates a paginated endpoint on behalf of one client
#[derive(Debug, Clone, Copy)]
pub struct Paginator<'a> {
    client: &'a ApiClient,
}

struct StreamState<'a> {
    guard: Option<MutexGuard<'a, ()>>,
    pagination: PaginationState,
}

impl<'a> Paginator<'a> {
    /// Create a paginator over `client`
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Stream pages from `path` until the collection is exhausted
    ///
    /// The client's run guard is taken on the first poll and held until the
    /// stream ends or is dropped.
    pub fn pages<'s, T>(
        &'s self,
        path: &'s str,
        query: &'s [(String, String)],
    ) -> impl Stream<Item = Result<Page<T>>> + 's
    where
        T: DeserializeOwned + 's,
    {
        let client: &'s ApiClient = self.client;
        let initial = StreamState {
            guard: None,
            pagination: PaginationState::new(),
        };

        futures::stream::try_unfold(initial, move |state| {
            next_page::<T>(client, path, query, state)
        })
    }

    /// Feed every page from `path` to `handler`
    ///
    /// Runs until the collection is exhausted or the handler returns
    /// [`PageControl::Stop`]. A handler error ends the run and is returned.
    pub async fn run<T, F, Fut>(
        &self,
        path: &str,
        query: &[(String, String)],
        mut handler: F,
    ) -> Result<RunSummary>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<PageControl>>,
    {
        let pages = self.pages::<T>(path, query);
        futures::pin_mut!(pages);

        let mut summary = RunSummary::default();
        while let Some(page) = pages.try_next().await? {
            summary.record(&page);
            if handler(page.items).await?.is_stop() {
                summary.stopped_early = true;
                info!(path, pages = summary.pages, "page handler stopped the run");
                break;
            }
        }

        info!(path, pages = summary.pages, items = summary.items, "pagination complete");
        Ok(summary)
    }

    /// List identifiers from `list_path`, resolve each page of them through
    /// `hydrate`, and feed the resolved records to `handler`
    ///
    /// Empty identifier pages skip the bulk call.
    pub async fn run_hydrated<T, F, Fut>(
        &self,
        list_path: &str,
        query: &[(String, String)],
        hydrate: &HydrateRequest,
        mut handler: F,
    ) -> Result<RunSummary>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<PageControl>>,
    {
        let id_pages = self.pages::<String>(list_path, query);
        futures::pin_mut!(id_pages);

        let mut summary = RunSummary::default();
        while let Some(ids) = id_pages.try_next().await? {
            summary.record(&ids);
            if ids.is_empty() {
                debug!(list_path, "empty identifier page, nothing to hydrate");
                continue;
            }

            let params = hydrate.params_for(&ids.items);
            let records: Page<T> = self.client.get_page(&hydrate.path, &params).await?;
            log_page_errors(&hydrate.path, &records);

            if handler(records.items).await?.is_stop() {
                summary.stopped_early = true;
                info!(list_path, pages = summary.pages, "page handler stopped the run");
                break;
            }
        }

        info!(
            list_path,
            hydrate_path = %hydrate.path,
            pages = summary.pages,
            items = summary.items,
            "hydrated pagination complete"
        );
        Ok(summary)
    }
}

async fn next_page<'a, T: DeserializeOwned>(
    client: &'a ApiClient,
    path: &'a str,
    query: &'a [(String, String)],
    mut state: StreamState<'a>,
) -> Result<Option<(Page<T>, StreamState<'a>)>> {
    if state.pagination.done {
        return Ok(None);
    }
    if state.guard.is_none() {
        state.guard = Some(client.run_guard().lock().await);
    }

    let params = state.pagination.request_params(query);
    let page: Page<T> = client.get_page(path, &params).await?;
    log_page_errors(path, &page);

    let done = state.pagination.advance(page.len(), page.cursor.clone());
    debug!(
        path,
        items = page.len(),
        seen = state.pagination.seen,
        total = ?state.pagination.cursor.total,
        done,
        "fetched page"
    );
    Ok(Some((page, state)))
}

fn log_page_errors<T>(path: &str, page: &Page<T>) {
    for entry in &page.errors {
        warn!(
            path,
            code = entry.code,
            id = entry.id.as_deref().unwrap_or_default(),
            message = %entry.message,
            "server reported a per-record error"
        );
    }
}
