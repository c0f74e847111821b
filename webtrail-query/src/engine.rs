//! Read-optimized query façade over the repository layer.
//!
//! Every operation acquires a pool permit, checks the TTL caches, and
//! otherwise answers by streaming the type scan and reading nodes back
//! through the repositories, so encrypted properties come out decrypted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use webtrail_store::codec::PRED_TYPE;
use webtrail_store::{
    NodeKind, PageProps, RepositoryManager, ScanControl, SessionProps, StoreError, TriplePattern,
    TypedNode,
};

use crate::cache::{cache_key, CacheStats, QueryCaches, MIN_CACHE_QUERY_MS};
use crate::error::Result;
use crate::patterns::{mine_patterns, BrowsingPattern, NavigationEvent};
use crate::pool::QueryPool;

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct QueryEngineConfig {
    /// Logical operations allowed in flight at once.
    pub max_concurrency: usize,
    /// Per-attempt pool acquisition timeout.
    pub acquire_timeout: Duration,
    /// Results at or above this duration are cached.
    pub cache_threshold_ms: u64,
    pub results_capacity: usize,
    pub results_ttl: Duration,
    /// Dashboard summary freshness window.
    pub aggregates_ttl: Duration,
    pub visit_counts_ttl: Duration,
    /// Parallel fan-out width for visit count reads.
    pub visit_count_batch: usize,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            acquire_timeout: Duration::from_secs(5),
            cache_threshold_ms: MIN_CACHE_QUERY_MS,
            results_capacity: 500,
            results_ttl: Duration::from_secs(300),
            aggregates_ttl: Duration::from_secs(120),
            visit_counts_ttl: Duration::from_secs(600),
            visit_count_batch: 10,
        }
    }
}

/// Pagination and time-range options shared by the read operations.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub limit: usize,
    pub offset: usize,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            from: None,
            to: None,
        }
    }
}

/// The shape every read operation answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    /// Matches observed before the scan stopped. When the scan ran to the
    /// end of the stream this is the true total; when it stopped early at
    /// `limit + offset` it is a lower bound.
    pub total_count: usize,
    pub from_cache: bool,
    pub query_time_ms: u64,
    pub metadata: QueryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub operation: String,
    pub generated_at: DateTime<Utc>,
}

/// A recorded index strategy.
///
/// `create_index` stores these and nothing else: the triple store has no
/// native secondary indices, so recording a strategy does not change how
/// any subsequent scan executes. It is a placeholder, not an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStrategy {
    pub name: String,
    pub node_kind: String,
    pub properties: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl IndexStrategy {
    pub fn new(
        name: impl Into<String>,
        node_kind: impl Into<String>,
        properties: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node_kind: node_kind.into(),
            properties,
            recorded_at: Utc::now(),
        }
    }
}

/// One entry in the dashboard's top-domain list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainVisits {
    pub name: String,
    pub visit_count: u64,
}

/// Trimmed page record for dashboard display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: String,
    pub url: String,
    pub title: String,
    pub visited_at: DateTime<Utc>,
}

/// Fan-out aggregate for the dashboard, cached coarsely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub node_counts: HashMap<String, usize>,
    pub total_nodes: usize,
    pub estimated_relationships: usize,
    pub top_domains: Vec<DomainVisits>,
    pub recent_pages: Vec<PageSummary>,
    pub generated_at: DateTime<Utc>,
}

/// Read-optimized query engine.
pub struct QueryEngine {
    repos: Arc<RepositoryManager>,
    caches: QueryCaches,
    pool: QueryPool,
    config: QueryEngineConfig,
}

impl QueryEngine {
    pub fn new(repos: Arc<RepositoryManager>) -> Self {
        Self::with_config(repos, QueryEngineConfig::default())
    }

    pub fn with_config(repos: Arc<RepositoryManager>, config: QueryEngineConfig) -> Self {
        Self {
            caches: QueryCaches::new(
                config.results_capacity,
                config.results_ttl,
                config.aggregates_ttl,
                config.visit_counts_ttl,
            ),
            pool: QueryPool::new(config.max_concurrency, config.acquire_timeout),
            repos,
            config,
        }
    }

    /// Pages whose url or title contains `term`, case-insensitively.
    ///
    /// An empty term degrades to a full scan with client-side pagination.
    /// Either way the scan is consumed only until `limit + offset` matches
    /// have been found.
    pub async fn find_pages(
        &self,
        term: &str,
        opts: &QueryOptions,
    ) -> Result<QueryResult<TypedNode<PageProps>>> {
        let _permit = self.pool.acquire().await?;
        let key = cache_key(
            "find_pages",
            &[
                ("term", term.to_lowercase()),
                ("limit", opts.limit.to_string()),
                ("offset", opts.offset.to_string()),
            ],
        );
        if let Some(hit) = self.cached_result(&key) {
            return Ok(hit);
        }

        let started = Instant::now();
        let term_lower = term.to_lowercase();
        let wanted = opts.offset.saturating_add(opts.limit);

        // without a term every page matches, so the scan itself can stop
        // at offset + limit subjects; a term needs the full subject list
        let cap = if term_lower.is_empty() {
            Some(wanted)
        } else {
            None
        };
        let subjects = self.scan_kind_subjects(NodeKind::Page, cap)?;
        let mut matched = 0usize;
        let mut items = Vec::new();
        for subject in subjects {
            let Some(page) = self.repos.pages().get_by_id(&subject).await? else {
                continue;
            };
            let hit = term_lower.is_empty()
                || page.props.url.to_lowercase().contains(&term_lower)
                || page.props.title.to_lowercase().contains(&term_lower);
            if !hit {
                continue;
            }
            matched += 1;
            if matched > opts.offset && items.len() < opts.limit {
                items.push(page);
            }
            if matched >= wanted {
                break;
            }
        }

        Ok(self.finish(key, "find_pages", items, matched, started))
    }

    /// Pages ordered by visit count, descending.
    ///
    /// Visit counts are resolved per page in small parallel batches and
    /// reused from the derived-counts cache when fresh.
    pub async fn get_most_visited_pages(
        &self,
        opts: &QueryOptions,
    ) -> Result<QueryResult<TypedNode<PageProps>>> {
        let _permit = self.pool.acquire().await?;
        let key = cache_key(
            "most_visited_pages",
            &[("limit", opts.limit.to_string())],
        );
        if let Some(hit) = self.cached_result(&key) {
            return Ok(hit);
        }

        let started = Instant::now();
        let subjects = self.scan_kind_subjects(NodeKind::Page, None)?;
        let total = subjects.len();

        let mut counted: Vec<(String, u64)> = Vec::with_capacity(total);
        for chunk in subjects.chunks(self.config.visit_count_batch.max(1)) {
            let mut tasks = tokio::task::JoinSet::new();
            for id in chunk {
                if let Some(count) = self.caches.get_visit_count(id) {
                    counted.push((id.clone(), count));
                    continue;
                }
                let repos = self.repos.clone();
                let id = id.clone();
                tasks.spawn(async move {
                    let count = repos
                        .pages()
                        .get_by_id(&id)
                        .await?
                        .map(|p| p.props.visit_count)
                        .unwrap_or(0);
                    Ok::<_, StoreError>((id, count))
                });
            }
            while let Some(joined) = tasks.join_next().await {
                let (id, count) = joined.map_err(|e| StoreError::query(e.to_string()))??;
                self.caches.set_visit_count(&id, count);
                counted.push((id, count));
            }
        }

        counted.sort_by(|a, b| b.1.cmp(&a.1));
        counted.truncate(opts.limit);

        let mut items = Vec::with_capacity(counted.len());
        for (id, _) in counted {
            if let Some(page) = self.repos.pages().get_by_id(&id).await? {
                items.push(page);
            }
        }

        Ok(self.finish(key, "most_visited_pages", items, total, started))
    }

    /// Sessions, optionally filtered by exact tag and time range, sorted
    /// by creation time descending.
    pub async fn get_sessions(
        &self,
        tag: Option<&str>,
        opts: &QueryOptions,
    ) -> Result<QueryResult<TypedNode<SessionProps>>> {
        let _permit = self.pool.acquire().await?;
        let key = cache_key(
            "sessions",
            &[
                ("tag", tag.unwrap_or("").to_string()),
                ("limit", opts.limit.to_string()),
                ("offset", opts.offset.to_string()),
                ("from", opts.from.map(|t| t.to_rfc3339()).unwrap_or_default()),
                ("to", opts.to.map(|t| t.to_rfc3339()).unwrap_or_default()),
            ],
        );
        if let Some(hit) = self.cached_result(&key) {
            return Ok(hit);
        }

        let started = Instant::now();
        let subjects = self.scan_kind_subjects(NodeKind::Session, None)?;
        let mut sessions = Vec::new();
        for subject in subjects {
            let Some(session) = self.repos.sessions().get_by_id(&subject).await? else {
                continue;
            };
            if let Some(tag) = tag {
                if !session.props.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            if let Some(from) = opts.from {
                if session.created_at < from {
                    continue;
                }
            }
            if let Some(to) = opts.to {
                if session.created_at > to {
                    continue;
                }
            }
            sessions.push(session);
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = sessions.len();
        let items: Vec<_> = sessions
            .into_iter()
            .skip(opts.offset)
            .take(opts.limit)
            .collect();

        Ok(self.finish(key, "sessions", items, total, started))
    }

    /// Recurring domain n-grams mined from per-tab navigation sequences.
    pub async fn get_browsing_patterns(
        &self,
        opts: &QueryOptions,
    ) -> Result<QueryResult<BrowsingPattern>> {
        let _permit = self.pool.acquire().await?;
        let key = cache_key(
            "browsing_patterns",
            &[("limit", opts.limit.to_string())],
        );
        if let Some(hit) = self.cached_result(&key) {
            return Ok(hit);
        }

        let started = Instant::now();
        let subjects = self.scan_kind_subjects(NodeKind::Page, None)?;
        let mut by_tab: HashMap<String, Vec<(DateTime<Utc>, NavigationEvent)>> = HashMap::new();
        for subject in subjects {
            let Some(page) = self.repos.pages().get_by_id(&subject).await? else {
                continue;
            };
            let tab = page
                .props
                .tab_id
                .clone()
                .unwrap_or_else(|| "untracked".to_string());
            let timestamp = page.props.last_visit.unwrap_or(page.created_at);
            by_tab.entry(tab).or_default().push((
                page.created_at,
                NavigationEvent {
                    domain: page.props.domain,
                    timestamp,
                    time_spent_ms: page.props.total_time_spent,
                },
            ));
        }

        let sequences: Vec<Vec<NavigationEvent>> = by_tab
            .into_values()
            .map(|mut visits| {
                visits.sort_by_key(|(created_at, _)| *created_at);
                visits.into_iter().map(|(_, event)| event).collect()
            })
            .collect();

        let patterns = mine_patterns(&sequences, opts.limit, Utc::now());
        let total = patterns.len();
        Ok(self.finish(key, "browsing_patterns", patterns, total, started))
    }

    /// Parallel fan-out over counts, top domains, and recent pages.
    pub async fn get_dashboard_summary(&self) -> Result<DashboardSummary> {
        let _permit = self.pool.acquire().await?;
        if let Some(value) = self.caches.get_aggregate("dashboard_summary") {
            let summary: DashboardSummary = serde_json::from_value(value)?;
            return Ok(summary);
        }

        let (health, domains, recent) = tokio::join!(
            self.repos.health_status(),
            self.top_domains(5),
            self.recent_pages(10),
        );
        let health = health?;

        let summary = DashboardSummary {
            node_counts: health.node_counts,
            total_nodes: health.total_nodes,
            estimated_relationships: health.estimated_relationships,
            top_domains: domains?,
            recent_pages: recent?,
            generated_at: Utc::now(),
        };

        if let Ok(value) = serde_json::to_value(&summary) {
            self.caches.set_aggregate("dashboard_summary".to_string(), value);
        }
        Ok(summary)
    }

    /// Record an index strategy descriptor.
    ///
    /// Deliberately does nothing else — see [`IndexStrategy`].
    pub fn create_index(&self, strategy: IndexStrategy) {
        tracing::info!(
            name = %strategy.name,
            node_kind = %strategy.node_kind,
            "recorded index strategy (no-op: store has no secondary indices)"
        );
        self.caches.record_index(strategy);
    }

    /// Strategies recorded via [`QueryEngine::create_index`].
    pub fn list_indexes(&self) -> Vec<IndexStrategy> {
        self.caches.recorded_indexes()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.stats()
    }

    /// Drop all cached results, forcing fresh reads.
    pub fn invalidate_caches(&self) {
        self.caches.invalidate_all();
    }

    async fn top_domains(&self, limit: usize) -> Result<Vec<DomainVisits>> {
        let mut domains = self.repos.domains().get_all(1000, 0).await?;
        domains.sort_by(|a, b| b.props.visit_count.cmp(&a.props.visit_count));
        Ok(domains
            .into_iter()
            .take(limit)
            .map(|d| DomainVisits {
                name: d.props.name,
                visit_count: d.props.visit_count,
            })
            .collect())
    }

    async fn recent_pages(&self, limit: usize) -> Result<Vec<PageSummary>> {
        let mut pages = self.repos.pages().get_all(1000, 0).await?;
        pages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pages
            .into_iter()
            .take(limit)
            .map(|p| PageSummary {
                id: p.id,
                url: p.props.url,
                title: p.props.title,
                visited_at: p.props.last_visit.unwrap_or(p.created_at),
            })
            .collect())
    }

    /// Stream subject ids of one node kind, optionally capped.
    fn scan_kind_subjects(&self, kind: NodeKind, cap: Option<usize>) -> Result<Vec<String>> {
        let store = self.repos.connection().store()?;
        let pattern = TriplePattern::predicate(PRED_TYPE).with_object(kind.as_str());
        let mut subjects = Vec::new();
        store.scan(&pattern, &mut |triple| {
            subjects.push(triple.subject);
            match cap {
                Some(cap) if subjects.len() >= cap => ScanControl::Stop,
                _ => ScanControl::Continue,
            }
        })?;
        Ok(subjects)
    }

    fn cached_result<T: DeserializeOwned>(&self, key: &str) -> Option<QueryResult<T>> {
        let value = self.caches.get_result(key)?;
        match serde_json::from_value::<QueryResult<T>>(value) {
            Ok(mut result) => {
                result.from_cache = true;
                Some(result)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping undecodable cache entry");
                None
            }
        }
    }

    fn finish<T: Serialize>(
        &self,
        key: String,
        operation: &str,
        items: Vec<T>,
        total_count: usize,
        started: Instant,
    ) -> QueryResult<T> {
        let query_time_ms = started.elapsed().as_millis() as u64;
        let result = QueryResult {
            items,
            total_count,
            from_cache: false,
            query_time_ms,
            metadata: QueryMetadata {
                operation: operation.to_string(),
                generated_at: Utc::now(),
            },
        };
        if query_time_ms >= self.config.cache_threshold_ms {
            if let Ok(value) = serde_json::to_value(&result) {
                self.caches.set_result(key, value);
            }
        }
        tracing::debug!(operation, query_time_ms, total_count, "query complete");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webtrail_store::{ConnectionManager, DomainProps, MemTripleStore};

    async fn engine_with(config: QueryEngineConfig) -> QueryEngine {
        let connection = Arc::new(ConnectionManager::with_store(Arc::new(
            MemTripleStore::new(),
        )));
        connection.initialize().await.unwrap();
        let repos = Arc::new(RepositoryManager::new(connection, None));
        QueryEngine::with_config(repos, config)
    }

    async fn engine() -> QueryEngine {
        engine_with(QueryEngineConfig::default()).await
    }

    fn page(url: &str, title: &str, visits: u64) -> PageProps {
        PageProps {
            url: url.into(),
            title: title.into(),
            domain: "example.com".into(),
            visit_count: visits,
            total_time_spent: 1000,
            last_visit: None,
            tab_id: None,
            session_id: None,
            html: None,
            mhtml: None,
            screenshot: None,
            forms: None,
        }
    }

    #[tokio::test]
    async fn test_find_pages_empty_term_paginates() {
        let engine = engine().await;
        for i in 0..5 {
            engine
                .repos
                .pages()
                .create(page(&format!("https://example.com/{i}"), "Page", 1))
                .await
                .unwrap();
        }

        let opts = QueryOptions {
            limit: 2,
            offset: 0,
            ..Default::default()
        };
        let result = engine.find_pages("", &opts).await.unwrap();
        assert_eq!(result.items.len(), 2);
        // empty-term scan stops at offset + limit subjects
        assert_eq!(result.total_count, 2);
        assert!(!result.from_cache);

        let next = engine
            .find_pages(
                "",
                &QueryOptions {
                    limit: 2,
                    offset: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(next.items.len(), 2);
        assert_ne!(next.items[0].id, result.items[0].id);
    }

    #[tokio::test]
    async fn test_find_pages_term_matches_url_and_title() {
        let engine = engine().await;
        engine
            .repos
            .pages()
            .create(page("https://rust-lang.org", "The Rust Language", 1))
            .await
            .unwrap();
        engine
            .repos
            .pages()
            .create(page("https://example.com", "Unrelated", 1))
            .await
            .unwrap();

        let result = engine
            .find_pages("RUST", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].props.url, "https://rust-lang.org");

        let by_title = engine
            .find_pages("language", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(by_title.items.len(), 1);
    }

    #[tokio::test]
    async fn test_most_visited_orders_and_truncates() {
        let engine = engine().await;
        for (i, visits) in [5u64, 1, 9].iter().enumerate() {
            engine
                .repos
                .pages()
                .create(page(&format!("https://example.com/{i}"), "Page", *visits))
                .await
                .unwrap();
        }

        let result = engine
            .get_most_visited_pages(&QueryOptions {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        let counts: Vec<u64> = result.items.iter().map(|p| p.props.visit_count).collect();
        assert_eq!(counts, vec![9, 5]);
        assert_eq!(result.total_count, 3);
    }

    #[tokio::test]
    async fn test_sessions_tag_and_time_filter() {
        let engine = engine().await;
        engine
            .repos
            .sessions()
            .create(SessionProps {
                name: "work".into(),
                start_time: Utc::now(),
                end_time: None,
                tags: vec!["research".into()],
                page_count: 3,
            })
            .await
            .unwrap();
        engine
            .repos
            .sessions()
            .create(SessionProps {
                name: "play".into(),
                start_time: Utc::now(),
                end_time: None,
                tags: vec!["games".into()],
                page_count: 1,
            })
            .await
            .unwrap();

        let tagged = engine
            .get_sessions(Some("research"), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(tagged.items.len(), 1);
        assert_eq!(tagged.items[0].props.name, "work");

        let future_only = engine
            .get_sessions(
                None,
                &QueryOptions {
                    from: Some(Utc::now() + chrono::Duration::hours(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(future_only.items.is_empty());
    }

    #[tokio::test]
    async fn test_browsing_patterns_from_tab_sequences() {
        let engine = engine().await;
        // one tab alternating between two domains
        for (i, domain) in ["a.com", "b.com", "a.com", "b.com", "a.com"]
            .iter()
            .enumerate()
        {
            let mut props = page(&format!("https://{domain}/{i}"), "Page", 1);
            props.domain = domain.to_string();
            props.tab_id = Some("tab-1".into());
            engine.repos.pages().create(props).await.unwrap();
        }

        let result = engine
            .get_browsing_patterns(&QueryOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        let repeated = result
            .items
            .iter()
            .find(|p| p.domains == ["a.com", "b.com"])
            .expect("expected the [a.com, b.com] bigram");
        assert_eq!(repeated.frequency, 2);
    }

    #[tokio::test]
    async fn test_dashboard_summary_counts_and_cache() {
        let engine = engine().await;
        for i in 0..3 {
            engine
                .repos
                .pages()
                .create(page(&format!("https://example.com/{i}"), "Page", i))
                .await
                .unwrap();
        }
        engine
            .repos
            .domains()
            .create(DomainProps {
                name: "example.com".into(),
                category: None,
                visit_count: 3,
                total_time_spent: 0,
            })
            .await
            .unwrap();

        let summary = engine.get_dashboard_summary().await.unwrap();
        assert_eq!(summary.node_counts.get("page"), Some(&3));
        assert_eq!(summary.total_nodes, 4);
        assert_eq!(summary.estimated_relationships, 6);
        assert_eq!(summary.top_domains[0].name, "example.com");
        assert_eq!(summary.recent_pages.len(), 3);

        // second read comes from the coarse aggregate cache
        let again = engine.get_dashboard_summary().await.unwrap();
        assert_eq!(again.generated_at, summary.generated_at);
    }

    #[tokio::test]
    async fn test_cached_result_round_trip() {
        // threshold zero so even instant queries are cached
        let engine = engine_with(QueryEngineConfig {
            cache_threshold_ms: 0,
            ..Default::default()
        })
        .await;
        engine
            .repos
            .pages()
            .create(page("https://example.com", "Page", 1))
            .await
            .unwrap();

        let first = engine.find_pages("", &QueryOptions::default()).await.unwrap();
        assert!(!first.from_cache);

        let second = engine.find_pages("", &QueryOptions::default()).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.items.len(), first.items.len());
    }

    #[tokio::test]
    async fn test_fast_results_skip_cache_by_default() {
        let engine = engine().await;
        engine
            .repos
            .pages()
            .create(page("https://example.com", "Page", 1))
            .await
            .unwrap();

        // a one-page in-memory scan completes well under the threshold
        let first = engine.find_pages("", &QueryOptions::default()).await.unwrap();
        assert!(!first.from_cache);
        let second = engine.find_pages("", &QueryOptions::default()).await.unwrap();
        assert!(!second.from_cache);
    }

    #[tokio::test]
    async fn test_create_index_records_but_changes_nothing() {
        let engine = engine().await;
        engine
            .repos
            .pages()
            .create(page("https://example.com", "Page", 1))
            .await
            .unwrap();

        let before = engine
            .find_pages("example", &QueryOptions::default())
            .await
            .unwrap();
        engine.create_index(IndexStrategy::new(
            "pages_by_url",
            "page",
            vec!["url".into()],
        ));
        let after = engine
            .find_pages("example", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(before.items.len(), after.items.len());
        assert_eq!(engine.list_indexes().len(), 1);
        assert_eq!(engine.cache_stats().recorded_indexes, 1);
    }

    #[tokio::test]
    async fn test_invalidate_caches_forces_fresh_read() {
        let engine = engine_with(QueryEngineConfig {
            cache_threshold_ms: 0,
            ..Default::default()
        })
        .await;
        engine
            .repos
            .pages()
            .create(page("https://example.com", "Page", 1))
            .await
            .unwrap();

        engine.find_pages("", &QueryOptions::default()).await.unwrap();
        engine.invalidate_caches();
        let fresh = engine.find_pages("", &QueryOptions::default()).await.unwrap();
        assert!(!fresh.from_cache);
    }
}
