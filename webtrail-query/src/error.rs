//! Error types for the query engine.

use thiserror::Error;
use webtrail_store::StoreError;

/// Errors surfaced by query-engine operations.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Underlying storage-layer failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Pool acquisition timed out after the fixed retry budget
    #[error("query pool acquisition timed out after {attempts} attempts ({timeout_ms}ms each)")]
    PoolExhausted { attempts: u32, timeout_ms: u64 },

    /// Cached payload no longer matches the result shape
    #[error("cache deserialization failed: {0}")]
    CacheDecode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
