use std::time::Duration;

// ============================================================================
// Store Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The backing store cannot serve a filtered + sorted query because the
    /// required composite index does not exist. Callers that can degrade
    /// (see the order feed) match on this variant explicitly.
    #[error("no composite index on {collection} for filter `{filter_field}` with sort `{sort_field}`")]
    MissingIndex {
        collection: String,
        filter_field: String,
        sort_field: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document in {collection}: {reason}")]
    Decode { collection: String, reason: String },

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn decode(collection: &str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_missing_index(&self) -> bool {
        matches!(self, Self::MissingIndex { .. })
    }
}
