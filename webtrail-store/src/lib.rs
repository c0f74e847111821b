//! WebTrail Storage Layer
//!
//! Property-graph data layer for browsing history, persisted as flat
//! triples over RocksDB.
//!
//! ## Features
//!
//! - **Triple-store persistence** - Every node and relationship is a set of
//!   `(subject, predicate, object)` triples with three key orderings
//! - **Typed repositories** - One repository per node kind with schema
//!   validation and index triple maintenance
//! - **Field-level encryption** - AES-256-GCM envelopes over sensitive
//!   properties, derived from a passphrase or a device fingerprint
//! - **Lifecycle management** - Idempotent initialization, health checks,
//!   and full JSON backup/restore
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webtrail_store::{ConnectionManager, RepositoryManager, RocksTripleStore};
//!
//! let connection = Arc::new(ConnectionManager::new(Box::new(move || {
//!     Ok(Arc::new(RocksTripleStore::open(&db_path)?) as _)
//! })));
//! connection.initialize().await?;
//!
//! let repos = RepositoryManager::new(connection, None);
//! let page = repos.pages().create(props).await?;
//! repos.pages().increment_visit_count(&page.id, 1200).await?;
//! ```

pub mod codec;
pub mod connection;
pub mod encryption;
pub mod error;
pub mod model;
pub mod repository;
pub mod schema;
pub mod store;
pub mod triple;

// Re-exports for convenience
pub use connection::{BackupDocument, ConnectionManager, StoreFactory};
pub use encryption::{DeviceFingerprint, EncryptionService};
pub use error::{Result, StoreError};
pub use model::{
    DeviceProps, DomainProps, GraphNode, GraphRelationship, NodeKind, NodeRecord, PageProps,
    PropertyMap, RelationshipKind, SessionProps, TabProps, TagProps, TypedNode, UserProps,
    WindowProps,
};
pub use repository::{HealthStatus, RelationshipRepository, Repository, RepositoryManager};
pub use schema::SchemaConstraints;
pub use store::{MemTripleStore, RocksTripleStore, ScanControl, TripleStore};
pub use triple::{Triple, TriplePattern};
