//! WebTrail Query Engine
//!
//! Read-optimized façade over `webtrail-store`: TTL-cached query results,
//! a logical concurrency-bounding pool, streaming scans, and derived
//! aggregates (most-visited pages, browsing patterns, dashboard summary).
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webtrail_query::{QueryEngine, QueryOptions};
//!
//! let engine = QueryEngine::new(Arc::new(repos));
//! let pages = engine.find_pages("rust", &QueryOptions::default()).await?;
//! println!("{} matches ({}ms)", pages.total_count, pages.query_time_ms);
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod patterns;
pub mod pool;

// Re-exports for convenience
pub use cache::{CacheStats, QueryCaches, TtlCache};
pub use engine::{
    DashboardSummary, DomainVisits, IndexStrategy, PageSummary, QueryEngine, QueryEngineConfig,
    QueryMetadata, QueryOptions, QueryResult,
};
pub use error::{QueryError, Result};
pub use patterns::{BrowsingPattern, NavigationEvent};
pub use pool::{PoolPermit, QueryPool};
