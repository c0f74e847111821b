//! Connection lifecycle
//!
//! Owns the single store handle behind the whole data layer: idempotent
//! initialization, a bounded health probe, full-store backup/restore, and
//! explicit close. The store is produced by an injected factory rather
//! than a module-level singleton, so embedders decide which backend (and
//! which path) a manager owns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::store::{ScanControl, TripleStore};
use crate::triple::{Triple, TriplePattern};

/// Backup document format version
pub const BACKUP_VERSION: &str = "1.0";
/// Restore re-inserts triples in batches of this size to bound peak memory
const RESTORE_BATCH_SIZE: usize = 1000;

/// Produces the store handle on (re-)initialization
pub type StoreFactory = Box<dyn Fn() -> Result<Arc<dyn TripleStore>> + Send + Sync>;

/// Versioned full-store snapshot; round-trips exactly through
/// [`ConnectionManager::backup`] / [`ConnectionManager::restore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub browser: String,
    pub triple_count: usize,
    pub data: Vec<Triple>,
}

/// Lifecycle owner of the single store handle
pub struct ConnectionManager {
    factory: StoreFactory,
    store: RwLock<Option<Arc<dyn TripleStore>>>,
    // Concurrent initialize() callers all wait on this one in-flight
    // attempt instead of opening duplicate handles.
    init_lock: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(factory: StoreFactory) -> Self {
        Self {
            factory,
            store: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Wrap an already-open store handle
    pub fn with_store(store: Arc<dyn TripleStore>) -> Self {
        Self::new(Box::new(move || Ok(store.clone())))
    }

    /// Open the store handle. Idempotent: repeat calls after success are
    /// no-ops, concurrent callers share one attempt, and a failure leaves
    /// the manager uninitialized so a later call can retry.
    pub async fn initialize(&self) -> Result<()> {
        if self.store.read().is_some() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        // another caller may have finished while we waited
        if self.store.read().is_some() {
            return Ok(());
        }

        match (self.factory)() {
            Ok(handle) => {
                log::info!("Triple store initialized");
                *self.store.write() = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("Triple store initialization failed: {e}");
                Err(StoreError::DbInit(e.to_string()))
            }
        }
    }

    /// Whether `initialize` has completed successfully
    pub fn is_initialized(&self) -> bool {
        self.store.read().is_some()
    }

    /// The live handle, or `NotInitialized`
    pub fn store(&self) -> Result<Arc<dyn TripleStore>> {
        self.store
            .read()
            .as_ref()
            .cloned()
            .ok_or(StoreError::NotInitialized)
    }

    /// No-op read with a bounded timeout; returns false on any failure
    pub async fn health_check(&self, timeout: Duration) -> bool {
        let store = match self.store() {
            Ok(store) => store,
            Err(_) => return false,
        };

        let probe = tokio::task::spawn_blocking(move || {
            store.scan(&TriplePattern::any(), &mut |_| ScanControl::Stop)
        });

        matches!(
            tokio::time::timeout(timeout, probe).await,
            Ok(Ok(Ok(())))
        )
    }

    /// Stream every triple into an ordered, versioned document
    pub async fn backup(&self) -> Result<BackupDocument> {
        let store = self.store()?;

        let data = tokio::task::spawn_blocking(move || {
            let mut data = Vec::new();
            store.scan(&TriplePattern::any(), &mut |triple| {
                data.push(triple);
                ScanControl::Continue
            })?;
            Ok::<_, StoreError>(data)
        })
        .await
        .map_err(|e| StoreError::DbBackup(e.to_string()))?
        .map_err(|e| StoreError::DbBackup(e.to_string()))?;

        log::info!("Backup captured {} triples", data.len());

        Ok(BackupDocument {
            version: BACKUP_VERSION.to_string(),
            timestamp: Utc::now(),
            browser: "webtrail".to_string(),
            triple_count: data.len(),
            data,
        })
    }

    /// Clear the store and re-insert the document's triples in fixed-size
    /// batches. Destructive and not transactional: a crash mid-restore
    /// leaves a partially repopulated store.
    pub async fn restore(&self, doc: &BackupDocument) -> Result<()> {
        let store = self.store()?;

        if doc.version != BACKUP_VERSION {
            return Err(StoreError::DbRestore(format!(
                "unsupported backup version: {}",
                doc.version
            )));
        }

        let data = doc.data.clone();
        tokio::task::spawn_blocking(move || {
            store
                .clear()
                .map_err(|e| StoreError::DbRestore(e.to_string()))?;
            for batch in data.chunks(RESTORE_BATCH_SIZE) {
                store
                    .put(batch)
                    .map_err(|e| StoreError::DbRestore(e.to_string()))?;
            }
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::DbRestore(e.to_string()))??;

        log::info!("Restore re-inserted {} triples", doc.triple_count);
        Ok(())
    }

    /// Release the handle; further use requires `initialize` again
    pub async fn close(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        *self.store.write() = None;
        log::info!("Triple store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemTripleStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn mem_manager() -> ConnectionManager {
        ConnectionManager::new(Box::new(|| Ok(Arc::new(MemTripleStore::new()) as _)))
    }

    #[tokio::test]
    async fn test_store_before_initialize_fails() {
        let manager = mem_manager();
        assert!(matches!(
            manager.store(),
            Err(StoreError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_initialize_idempotent() {
        let manager = mem_manager();
        manager.initialize().await.unwrap();
        let first = manager.store().unwrap();
        manager.initialize().await.unwrap();
        let second = manager.store().unwrap();
        // same handle, not a reopened one
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failed_initialize_allows_retry() {
        static FAILED_ONCE: AtomicBool = AtomicBool::new(false);
        let manager = ConnectionManager::new(Box::new(|| {
            if FAILED_ONCE.swap(true, Ordering::SeqCst) {
                Ok(Arc::new(MemTripleStore::new()) as _)
            } else {
                Err(StoreError::DbInit("disk on fire".into()))
            }
        }));

        assert!(manager.initialize().await.is_err());
        assert!(!manager.is_initialized());

        manager.initialize().await.unwrap();
        assert!(manager.is_initialized());
    }

    #[tokio::test]
    async fn test_health_check() {
        let manager = mem_manager();
        assert!(!manager.health_check(Duration::from_millis(100)).await);
        manager.initialize().await.unwrap();
        assert!(manager.health_check(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_backup_restore_round_trip() {
        let manager = mem_manager();
        manager.initialize().await.unwrap();
        let store = manager.store().unwrap();
        store
            .put(&[
                Triple::new("page:1-a", "type", "page"),
                Triple::new("page:1-a", "url", "https://example.com"),
            ])
            .unwrap();

        let doc = manager.backup().await.unwrap();
        assert_eq!(doc.version, BACKUP_VERSION);
        assert_eq!(doc.triple_count, 2);

        // serialize/deserialize the document itself, as the export path does
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"tripleCount\":2"));
        let parsed: BackupDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);

        store.clear().unwrap();
        manager.restore(&parsed).await.unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_restore_rejects_unknown_version() {
        let manager = mem_manager();
        manager.initialize().await.unwrap();
        let doc = BackupDocument {
            version: "9.9".into(),
            timestamp: Utc::now(),
            browser: "webtrail".into(),
            triple_count: 0,
            data: vec![],
        };
        assert!(matches!(
            manager.restore(&doc).await,
            Err(StoreError::DbRestore(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_replaces_existing_contents() {
        let manager = mem_manager();
        manager.initialize().await.unwrap();
        let store = manager.store().unwrap();
        store
            .put(&[Triple::new("page:old", "type", "page")])
            .unwrap();

        let doc = BackupDocument {
            version: BACKUP_VERSION.into(),
            timestamp: Utc::now(),
            browser: "webtrail".into(),
            triple_count: 1,
            data: vec![Triple::new("page:new", "type", "page")],
        };
        manager.restore(&doc).await.unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(store
            .get(&TriplePattern::subject("page:old"))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_close_forces_reinitialize() {
        let manager = mem_manager();
        manager.initialize().await.unwrap();
        manager.close().await.unwrap();
        assert!(matches!(
            manager.store(),
            Err(StoreError::NotInitialized)
        ));
        manager.initialize().await.unwrap();
        assert!(manager.is_initialized());
    }
}
