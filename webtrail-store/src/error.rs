//! Error types for the webtrail data layer

use thiserror::Error;

/// Errors that can occur in the graph data layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema validation rejected a node before it reached storage
    #[error("Validation failed for {kind}: {}", violations.join("; "))]
    Validation {
        kind: String,
        violations: Vec<String>,
    },

    /// Operation issued before the connection was initialized
    #[error("Store not initialized")]
    NotInitialized,

    /// Node lookup by id came back empty where a node was required
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Triples for a node could not be decoded back into its typed shape
    #[error("Failed to parse node {id}: {reason}")]
    NodeParse { id: String, reason: String },

    /// Batch write for a create failed
    #[error("Create failed for {id}: {reason}")]
    DbCreate { id: String, reason: String },

    /// Read from the triple store failed
    #[error("Read failed: {0}")]
    DbRead(String),

    /// Update (delete + recreate) failed
    #[error("Update failed for {id}: {reason}")]
    DbUpdate { id: String, reason: String },

    /// Delete of a subject's triples failed
    #[error("Delete failed for {id}: {reason}")]
    DbDelete { id: String, reason: String },

    /// Pattern query against the triple store failed
    #[error("Query failed: {0}")]
    DbQuery(String),

    /// Store handle could not be opened
    #[error("Initialization failed: {0}")]
    DbInit(String),

    /// Underlying connection is unusable
    #[error("Connection error: {0}")]
    DbConnection(String),

    /// Store handle could not be released cleanly
    #[error("Close failed: {0}")]
    DbClose(String),

    /// Backup stream failed before a complete document was produced
    #[error("Backup failed: {0}")]
    DbBackup(String),

    /// Restore failed; the store may be partially repopulated
    #[error("Restore failed: {0}")]
    DbRestore(String),

    /// Relationship create (edge + record batch) failed
    #[error("Relationship create failed ({from})-[{kind}]->({to}): {reason}")]
    RelationshipCreate {
        from: String,
        to: String,
        kind: String,
        reason: String,
    },

    /// Relationship delete failed
    #[error("Relationship delete failed ({from})-[{kind}]->({to}): {reason}")]
    RelationshipDelete {
        from: String,
        to: String,
        kind: String,
        reason: String,
    },

    /// Encryption key material could not be derived
    #[error("Encryption init failed: {0}")]
    EncryptionInit(String),

    /// Encryption was requested but no key has been derived this session
    #[error("Encryption not initialized")]
    EncryptionNotInitialized,

    /// A value could not be encrypted
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// An envelope could not be decrypted
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Supplied passphrase does not match the stored canary
    #[error("Invalid password")]
    InvalidPassword,

    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Binary (de)serialization error
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a validation error from a list of violations
    pub fn validation(kind: impl Into<String>, violations: Vec<String>) -> Self {
        Self::Validation {
            kind: kind.into(),
            violations,
        }
    }

    /// Create a node parse error
    pub fn node_parse(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeParse {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound(id.into())
    }

    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::DbQuery(msg.into())
    }

    /// Create an encryption failure
    pub fn encryption_failed(reason: impl Into<String>) -> Self {
        Self::EncryptionFailed(reason.into())
    }

    /// Create a decryption failure
    pub fn decryption_failed(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed(reason.into())
    }
}

/// Result type for data layer operations
pub type Result<T> = std::result::Result<T, StoreError>;
