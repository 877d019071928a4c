//! Common types used throughout the Falcon client
//!
//! This module contains shared type definitions and type aliases
//! used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// Ordered query parameters. Keys may repeat (e.g. `ids=a&ids=b`).
pub type QueryParams = Vec<(String, String)>;

/// Build query parameters from borrowed pairs
pub fn query_params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// ============================================================================
// Server Error Entries
// ============================================================================

/// A per-record error reported inside an otherwise successful response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEntry {
    /// Server error code (usually mirrors an HTTP status)
    #[serde(default)]
    pub code: i64,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Identifier of the record the error refers to
    #[serde(default)]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_params_keeps_order_and_duplicates() {
        let params = query_params([("ids", "a"), ("ids", "b"), ("filter", "x")]);
        assert_eq!(
            params,
            vec![
                ("ids".to_string(), "a".to_string()),
                ("ids".to_string(), "b".to_string()),
                ("filter".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_entry_tolerates_missing_fields() {
        let entry: ApiErrorEntry = serde_json::from_str(r#"{"message": "gone"}"#).unwrap();
        assert_eq!(entry.code, 0);
        assert_eq!(entry.message, "gone");
        assert!(entry.id.is_none());

        let entry: ApiErrorEntry =
            serde_json::from_str(r#"{"code": 404, "message": "not found", "id": "abc"}"#)
                .unwrap();
        assert_eq!(entry.code, 404);
        assert_eq!(entry.id.as_deref(), Some("abc"));
    }
}
