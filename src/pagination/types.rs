//! Pagination types
//!
//! The wire envelope, the cursor the server hands back, and the state the
//! paginator keeps between pages.

use crate::types::{ApiErrorEntry, QueryParams};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Query key for the page size
pub const LIMIT_PARAM: &str = "limit";
/// Query key for numeric or token offsets
pub const OFFSET_PARAM: &str = "offset";
/// Query key for continuation tokens
pub const AFTER_PARAM: &str = "after";

/// Server-provided pagination position
///
/// Opaque beyond these fields: the server decides what the next offset or
/// `after` token is, the paginator only sends it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    /// Page size
    #[serde(default)]
    pub limit: Option<u64>,
    /// Offset; numeric offsets are carried as their decimal string
    #[serde(default, deserialize_with = "deserialize_offset")]
    pub offset: Option<String>,
    /// Continuation token
    #[serde(default)]
    pub after: Option<String>,
    /// Total number of items in the collection
    #[serde(default)]
    pub total: Option<u64>,
}

impl PaginationCursor {
    /// Query parameters for the fields this cursor carries
    pub fn query_params(&self) -> QueryParams {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push((LIMIT_PARAM.to_string(), limit.to_string()));
        }
        if let Some(offset) = &self.offset {
            params.push((OFFSET_PARAM.to_string(), offset.clone()));
        }
        if let Some(after) = &self.after {
            params.push((AFTER_PARAM.to_string(), after.clone()));
        }
        params
    }

    /// Whether the cursor names a position to continue from
    pub fn can_advance(&self) -> bool {
        self.offset.as_deref().is_some_and(|o| !o.is_empty())
            || self.after.as_deref().is_some_and(|a| !a.is_empty())
    }
}

fn deserialize_offset<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "offset must be a string or number, got {other}"
        ))),
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    /// Pagination cursor, when the endpoint paginates
    #[serde(default)]
    pub pagination: Option<PaginationCursor>,
}

/// JSON body shared by every resource endpoint
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope<T> {
    /// Result items
    pub resources: Option<Vec<T>>,
    /// Per-record errors
    pub errors: Option<Vec<ApiErrorEntry>>,
    /// Metadata including the pagination cursor
    #[serde(default)]
    pub meta: Meta,
}

impl<T> ResponseEnvelope<T> {
    /// Flatten into a page; absent arrays become empty
    pub fn into_page(self) -> Page<T> {
        Page {
            items: self.resources.unwrap_or_default(),
            errors: self.errors.unwrap_or_default(),
            cursor: self.meta.pagination.unwrap_or_default(),
        }
    }
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items in server order
    pub items: Vec<T>,
    /// Per-record errors reported alongside the items
    pub errors: Vec<ApiErrorEntry>,
    /// Cursor for the next request
    pub cursor: PaginationCursor,
}

impl<T> Page<T> {
    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the page has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What a page handler wants the paginator to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageControl {
    /// Fetch the next page
    #[default]
    Continue,
    /// End the run after this page
    Stop,
}

impl PageControl {
    /// Check if the handler asked to stop
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Items seen so far
    pub seen: u64,
    /// Cursor from the latest page
    pub cursor: PaginationCursor,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for the next request: cursor fields first, then static
    /// parameters whose keys the cursor does not set
    pub fn request_params(&self, query: &[(String, String)]) -> QueryParams {
        let mut params = self.cursor.query_params();
        let cursor_keys: Vec<String> = params.iter().map(|(k, _)| k.clone()).collect();
        params.extend(
            query
                .iter()
                .filter(|(key, _)| !cursor_keys.contains(key))
                .cloned(),
        );
        params
    }

    /// Record a fetched page and decide whether the run is complete
    ///
    /// Done when the page is empty, when `seen` reaches the reported total,
    /// or, without a total, when the cursor gives nothing to continue from.
    pub fn advance(&mut self, item_count: usize, cursor: PaginationCursor) -> bool {
        self.seen += item_count as u64;
        self.cursor = cursor;
        self.done = item_count == 0
            || match self.cursor.total {
                Some(total) => self.seen >= total,
                None => !self.cursor.can_advance(),
            };
        self.done
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fetched
    pub pages: u64,
    /// Items fetched (identifiers, for hydrated runs)
    pub items: u64,
    /// Last total the server reported
    pub total: Option<u64>,
    /// The handler ended the run before exhaustion
    pub stopped_early: bool,
}

impl RunSummary {
    pub(crate) fn record<T>(&mut self, page: &Page<T>) {
        self.pages += 1;
        self.items += page.items.len() as u64;
        self.total = page.cursor.total;
    }
}

/// Second stage of a list-then-hydrate run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrateRequest {
    /// Bulk endpoint resolving identifiers to records
    pub path: String,
    /// Query key repeated once per identifier
    pub id_param: String,
    /// Extra parameters sent with every bulk call
    pub query: QueryParams,
}

impl HydrateRequest {
    /// Hydrate through `path`, passing identifiers as `ids`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_param: "ids".to_string(),
            query: Vec::new(),
        }
    }

    /// Use a different identifier key
    #[must_use]
    pub fn with_id_param(mut self, id_param: impl Into<String>) -> Self {
        self.id_param = id_param.into();
        self
    }

    /// Add a parameter sent with every bulk call
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Parameters for one bulk call
    pub fn params_for(&self, ids: &[String]) -> QueryParams {
        ids.iter()
            .map(|id| (self.id_param.clone(), id.clone()))
            .chain(self.query.iter().cloned())
            .collect()
    }
}
