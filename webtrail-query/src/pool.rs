//! Logical connection pool.
//!
//! The store is a single in-process handle, so there are no physical
//! connections to hand out. The pool exists purely to bound how many
//! logical operations can be in flight at once; a permit grants nothing
//! except the right to proceed. It provides no isolation between
//! operations.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{QueryError, Result};

/// Fixed retry budget for permit acquisition.
const ACQUIRE_ATTEMPTS: u32 = 3;

/// Bounded concurrency gate over the shared store handle.
pub struct QueryPool {
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

/// Held for the duration of one logical operation.
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
}

impl QueryPool {
    pub fn new(max_concurrency: usize, acquire_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            acquire_timeout,
        }
    }

    /// Acquire a permit, retrying a fixed number of times before failing.
    pub async fn acquire(&self) -> Result<PoolPermit> {
        for attempt in 1..=ACQUIRE_ATTEMPTS {
            match tokio::time::timeout(
                self.acquire_timeout,
                self.permits.clone().acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => return Ok(PoolPermit { _permit: permit }),
                // the semaphore is never closed while the pool is alive
                Ok(Err(_)) => break,
                Err(_) => {
                    tracing::warn!(
                        attempt,
                        timeout_ms = self.acquire_timeout.as_millis() as u64,
                        "query pool acquisition timed out"
                    );
                }
            }
        }
        Err(QueryError::PoolExhausted {
            attempts: ACQUIRE_ATTEMPTS,
            timeout_ms: self.acquire_timeout.as_millis() as u64,
        })
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
