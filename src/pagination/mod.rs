//! Pagination module
//!
//! Supports one convention: a server-provided cursor (`limit`, `offset` or
//! `after`) with an optional total count.
//!
//! # Overview
//!
//! The `Paginator` sends the cursor from each response back with the next
//! request and stops once the items seen reach the reported total or a page
//! comes back empty. Pages reach the caller either through a handler
//! (`run`, `run_hydrated`) or as a stream (`pages`).

mod paginator;
mod types;

pub use paginator::Paginator;
pub use types::{
    HydrateRequest, Meta, Page, PageControl, PaginationCursor, PaginationState,
    ResponseEnvelope, RunSummary, AFTER_PARAM, LIMIT_PARAM, OFFSET_PARAM,
};
