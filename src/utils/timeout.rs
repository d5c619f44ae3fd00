use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

// ============================================================================
// Operation Deadline
// ============================================================================

/// Caps a store operation at `limit`, converting an overrun into
/// [`StoreError::Timeout`]. A stuck backend then surfaces as a normal store
/// failure on whichever path called it, instead of a hung surface.
pub async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                timeout_ms = limit.as_millis() as u64,
                "store operation exceeded its deadline"
            );
            Err(StoreError::Timeout(limit))
        }
    }
}
