//! Repository layer
//!
//! Generic CRUD per node kind plus the relationship repository. This is
//! the only component that translates nodes to and from triples; nothing
//! above it writes triples directly.
//!
//! There are no transactions underneath: `update` is delete-then-recreate
//! and uniqueness is a caller-side `find_by` before `create`, so both
//! have race windows between their read and write phases. `delete` never
//! cascades — edges and index triples referencing a deleted node are left
//! behind as dangling references.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::codec::{
    self, encode_value, node_to_triples, relationship_from_edge, relationship_to_triples,
    triples_to_node, triples_to_relationship,
};
use crate::connection::ConnectionManager;
use crate::encryption::EncryptionService;
use crate::error::{Result, StoreError};
use crate::model::{
    generate_id, DeviceProps, DomainProps, GraphRelationship, NodeRecord, PageProps, PropertyMap,
    RelationshipKind, SessionProps, TabProps, TagProps, TypedNode, UserProps, WindowProps,
};
use crate::model::NodeKind;
use crate::schema::{create_index_triples, validate_node};
use crate::store::{ScanControl, TripleStore};
use crate::triple::TriplePattern;

/// Generic repository for one node kind
pub struct Repository<T: NodeRecord> {
    connection: Arc<ConnectionManager>,
    encryption: Option<Arc<EncryptionService>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NodeRecord> Repository<T> {
    pub fn new(
        connection: Arc<ConnectionManager>,
        encryption: Option<Arc<EncryptionService>>,
    ) -> Self {
        Self {
            connection,
            encryption,
            _marker: PhantomData,
        }
    }

    fn store(&self) -> Result<Arc<dyn TripleStore>> {
        self.connection.store()
    }

    /// Validate, encrypt, and submit a node as one combined batch write
    ///
    /// The node's triples and its index triples go into a single `put`,
    /// relying on the store's all-or-nothing batch guarantee.
    pub async fn create(&self, props: T) -> Result<TypedNode<T>> {
        self.create_with_hint(props, None).await
    }

    /// `create` with an id hint suffix (`{type}:{millis}-{random}-{hint}`)
    pub async fn create_with_hint(&self, props: T, hint: Option<&str>) -> Result<TypedNode<T>> {
        let now = Utc::now();
        let typed = TypedNode {
            id: generate_id(T::KIND, hint),
            created_at: now,
            updated_at: now,
            props,
        };
        self.write_node(&typed).await?;
        Ok(typed)
    }

    async fn write_node(&self, typed: &TypedNode<T>) -> Result<()> {
        let store = self.store()?;
        let mut node = typed.to_graph()?;

        let violations = validate_node(&node);
        if !violations.is_empty() {
            return Err(StoreError::validation(T::KIND.as_str(), violations));
        }

        if let Some(encryption) = &self.encryption {
            encryption.encrypt_node_properties(T::KIND, &mut node.properties);
        }

        let mut triples = node_to_triples(&node);
        triples.extend(create_index_triples(&node));

        store.put(&triples).map_err(|e| StoreError::DbCreate {
            id: node.id.clone(),
            reason: e.to_string(),
        })?;

        log::debug!("Created {} node {}", T::KIND, node.id);
        Ok(())
    }

    /// Read a node by id; an empty result set is `None`, not an error
    pub async fn get_by_id(&self, id: &str) -> Result<Option<TypedNode<T>>> {
        let store = self.store()?;
        let triples = store
            .get(&TriplePattern::subject(id))
            .map_err(|e| StoreError::DbRead(e.to_string()))?;
        if triples.is_empty() {
            return Ok(None);
        }

        let mut node = triples_to_node(id, &triples)?;
        if let Some(encryption) = &self.encryption {
            encryption.decrypt_node_properties(&mut node.properties);
        }
        TypedNode::from_graph(node).map(Some)
    }

    /// Full read-modify-rewrite: delete every triple for the id, then
    /// re-create the node with `updated_at` stamped to now
    ///
    /// Not a patch — a concurrent write to the same id between the delete
    /// and the recreate is lost. That window is a property of the layer,
    /// not something this method guards against.
    pub async fn update(&self, node: &TypedNode<T>) -> Result<TypedNode<T>> {
        let store = self.store()?;

        if self.get_by_id(&node.id).await?.is_none() {
            return Err(StoreError::not_found(&node.id));
        }

        let stamped = TypedNode {
            id: node.id.clone(),
            created_at: node.created_at,
            updated_at: Utc::now(),
            props: node.props.clone(),
        };

        store
            .del(&TriplePattern::subject(&node.id))
            .map_err(|e| StoreError::DbUpdate {
                id: node.id.clone(),
                reason: e.to_string(),
            })?;

        self.write_node(&stamped).await?;
        Ok(stamped)
    }

    /// Remove every triple with this subject
    ///
    /// Does not cascade: relationships pointing at the id and index
    /// triples referencing it survive as dangling references.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let store = self.store()?;
        store
            .del(&TriplePattern::subject(id))
            .map_err(|e| StoreError::DbDelete {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        log::debug!("Deleted node {id}");
        Ok(())
    }

    /// All nodes of this kind where `property == value`
    ///
    /// Collects the distinct matching subject ids, applies `limit` to
    /// that distinct set, then reads each node individually — an N+1
    /// pattern the store's query model forces.
    pub async fn find_by(
        &self,
        property: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<TypedNode<T>>> {
        let store = self.store()?;
        let pattern =
            TriplePattern::predicate(property).with_object(encode_value(value));
        let triples = store
            .get(&pattern)
            .map_err(|e| StoreError::DbQuery(e.to_string()))?;

        let mut subjects = Vec::new();
        for triple in triples {
            if crate::model::kind_of_id(&triple.subject) != Some(T::KIND) {
                continue;
            }
            if !subjects.contains(&triple.subject) {
                subjects.push(triple.subject);
            }
        }
        subjects.truncate(limit);

        let mut nodes = Vec::with_capacity(subjects.len());
        for subject in subjects {
            if let Some(node) = self.get_by_id(&subject).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Page through all nodes of this kind via a streaming type scan
    pub async fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<TypedNode<T>>> {
        let store = self.store()?;
        let pattern =
            TriplePattern::predicate(codec::PRED_TYPE).with_object(T::KIND.as_str());

        let wanted = offset.saturating_add(limit);
        let mut subjects = Vec::new();
        store
            .scan(&pattern, &mut |triple| {
                subjects.push(triple.subject);
                if subjects.len() >= wanted {
                    ScanControl::Stop
                } else {
                    ScanControl::Continue
                }
            })
            .map_err(|e| StoreError::DbQuery(e.to_string()))?;

        let mut nodes = Vec::new();
        for subject in subjects.into_iter().skip(offset) {
            if let Some(node) = self.get_by_id(&subject).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Count nodes of this kind with a streaming consumer
    pub async fn count(&self) -> Result<usize> {
        let store = self.store()?;
        count_kind(store.as_ref(), T::KIND)
    }
}

fn count_kind(store: &dyn TripleStore, kind: NodeKind) -> Result<usize> {
    let pattern = TriplePattern::predicate(codec::PRED_TYPE).with_object(kind.as_str());
    let mut count = 0;
    store
        .scan(&pattern, &mut |_| {
            count += 1;
            ScanControl::Continue
        })
        .map_err(|e| StoreError::DbQuery(e.to_string()))?;
    Ok(count)
}

impl Repository<PageProps> {
    /// Look up a page by exact url
    ///
    /// Goes through the `(url, value)` pattern, so with encryption active
    /// the stored value is an envelope and plaintext lookups miss.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<TypedNode<PageProps>>> {
        Ok(self
            .find_by("url", &Value::String(url.to_string()), 1)
            .await?
            .into_iter()
            .next())
    }

    /// Bump a page's visit counters. A missing id resolves without error.
    pub async fn increment_visit_count(&self, id: &str, time_spent_ms: u64) -> Result<()> {
        let Some(mut page) = self.get_by_id(id).await? else {
            log::debug!("increment_visit_count: page {id} not found, skipping");
            return Ok(());
        };
        page.props.visit_count += 1;
        page.props.total_time_spent += time_spent_ms;
        page.props.last_visit = Some(Utc::now());
        self.update(&page).await?;
        Ok(())
    }
}

/// Repository for typed edges
///
/// Everything here works off the forward edge triple `(from, TYPE, to)`.
/// Full property reconstruction happens only via the record written on
/// `create`; the query-side reads return placeholder timestamps and empty
/// properties.
pub struct RelationshipRepository {
    connection: Arc<ConnectionManager>,
}

impl RelationshipRepository {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    fn store(&self) -> Result<Arc<dyn TripleStore>> {
        self.connection.store()
    }

    /// Write the forward edge plus the full record keyed by the edge id
    pub async fn create(
        &self,
        kind: RelationshipKind,
        from: &str,
        to: &str,
        properties: PropertyMap,
    ) -> Result<GraphRelationship> {
        let store = self.store()?;
        let rel = GraphRelationship::new(kind, from, to, properties);
        let triples = relationship_to_triples(&rel)?;
        store
            .put(&triples)
            .map_err(|e| StoreError::RelationshipCreate {
                from: from.to_string(),
                to: to.to_string(),
                kind: kind.as_str().to_string(),
                reason: e.to_string(),
            })?;
        log::debug!("Created relationship ({from})-[{kind}]->({to})");
        Ok(rel)
    }

    /// Full reconstruction of one relationship record by its id
    pub async fn get_by_id(&self, id: &str) -> Result<Option<GraphRelationship>> {
        let store = self.store()?;
        let triples = store
            .get(&TriplePattern::subject(id))
            .map_err(|e| StoreError::DbRead(e.to_string()))?;
        if triples.is_empty() {
            return Ok(None);
        }
        triples_to_relationship(id, &triples).map(Some)
    }

    /// All edges of one kind (partial reconstructions)
    pub async fn find_by_type(
        &self,
        kind: RelationshipKind,
        limit: usize,
    ) -> Result<Vec<GraphRelationship>> {
        let store = self.store()?;
        let mut rels = Vec::new();
        store
            .scan(&TriplePattern::predicate(kind.as_str()), &mut |edge| {
                if let Ok(rel) = relationship_from_edge(&edge) {
                    rels.push(rel);
                }
                if rels.len() >= limit {
                    ScanControl::Stop
                } else {
                    ScanControl::Continue
                }
            })
            .map_err(|e| StoreError::DbQuery(e.to_string()))?;
        Ok(rels)
    }

    /// Edges leaving a node, optionally restricted to one kind
    pub async fn get_outgoing(
        &self,
        node_id: &str,
        kind: Option<RelationshipKind>,
    ) -> Result<Vec<GraphRelationship>> {
        let store = self.store()?;
        let mut pattern = TriplePattern::subject(node_id);
        if let Some(kind) = kind {
            pattern = pattern.with_predicate(kind.as_str());
        }
        let triples = store
            .get(&pattern)
            .map_err(|e| StoreError::DbQuery(e.to_string()))?;

        // A subject pattern also returns the node's property triples;
        // only predicates in the closed edge enumeration are edges.
        Ok(triples
            .iter()
            .filter_map(|t| relationship_from_edge(t).ok())
            .collect())
    }

    /// Edges arriving at a node, optionally restricted to one kind
    pub async fn get_incoming(
        &self,
        node_id: &str,
        kind: Option<RelationshipKind>,
    ) -> Result<Vec<GraphRelationship>> {
        let store = self.store()?;
        let mut pattern = TriplePattern::any().with_object(node_id);
        if let Some(kind) = kind {
            pattern = pattern.with_predicate(kind.as_str());
        }
        let triples = store
            .get(&pattern)
            .map_err(|e| StoreError::DbQuery(e.to_string()))?;

        Ok(triples
            .iter()
            .filter_map(|t| relationship_from_edge(t).ok())
            .collect())
    }

    /// Remove the forward edge triple
    ///
    /// The record keyed by the relationship's own id is not looked up and
    /// may remain behind — the same class of gap as non-cascading node
    /// deletes.
    pub async fn delete(
        &self,
        from: &str,
        to: &str,
        kind: RelationshipKind,
    ) -> Result<()> {
        let store = self.store()?;
        store
            .del(&TriplePattern::exact(from, kind.as_str(), to))
            .map_err(|e| StoreError::RelationshipDelete {
                from: from.to_string(),
                to: to.to_string(),
                kind: kind.as_str().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Whether the forward edge exists
    pub async fn exists(
        &self,
        from: &str,
        to: &str,
        kind: RelationshipKind,
    ) -> Result<bool> {
        let store = self.store()?;
        let triples = store
            .get(&TriplePattern::exact(from, kind.as_str(), to))
            .map_err(|e| StoreError::DbQuery(e.to_string()))?;
        Ok(!triples.is_empty())
    }
}

/// Aggregate health snapshot across all repositories
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub node_counts: HashMap<String, usize>,
    pub total_nodes: usize,
    /// Estimated, not counted: `total_nodes × 1.5`. Counting edges would
    /// mean a full scan per kind, so the stored format settles for this
    /// approximation.
    pub estimated_relationships: usize,
}

/// One repository per node kind plus the relationship repository
pub struct RepositoryManager {
    connection: Arc<ConnectionManager>,
    pages: Repository<PageProps>,
    sessions: Repository<SessionProps>,
    tags: Repository<TagProps>,
    domains: Repository<DomainProps>,
    users: Repository<UserProps>,
    devices: Repository<DeviceProps>,
    windows: Repository<WindowProps>,
    tabs: Repository<TabProps>,
    relationships: RelationshipRepository,
}

impl RepositoryManager {
    pub fn new(
        connection: Arc<ConnectionManager>,
        encryption: Option<Arc<EncryptionService>>,
    ) -> Self {
        Self {
            pages: Repository::new(connection.clone(), encryption.clone()),
            sessions: Repository::new(connection.clone(), encryption.clone()),
            tags: Repository::new(connection.clone(), encryption.clone()),
            domains: Repository::new(connection.clone(), encryption.clone()),
            users: Repository::new(connection.clone(), encryption.clone()),
            devices: Repository::new(connection.clone(), encryption.clone()),
            windows: Repository::new(connection.clone(), encryption.clone()),
            tabs: Repository::new(connection.clone(), encryption),
            relationships: RelationshipRepository::new(connection.clone()),
            connection,
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn pages(&self) -> &Repository<PageProps> {
        &self.pages
    }

    pub fn sessions(&self) -> &Repository<SessionProps> {
        &self.sessions
    }

    pub fn tags(&self) -> &Repository<TagProps> {
        &self.tags
    }

    pub fn domains(&self) -> &Repository<DomainProps> {
        &self.domains
    }

    pub fn users(&self) -> &Repository<UserProps> {
        &self.users
    }

    pub fn devices(&self) -> &Repository<DeviceProps> {
        &self.devices
    }

    pub fn windows(&self) -> &Repository<WindowProps> {
        &self.windows
    }

    pub fn tabs(&self) -> &Repository<TabProps> {
        &self.tabs
    }

    pub fn relationships(&self) -> &RelationshipRepository {
        &self.relationships
    }

    /// Per-kind node counts plus the relationship estimate
    pub async fn health_status(&self) -> Result<HealthStatus> {
        let store = self.connection.store()?;
        let healthy = self
            .connection
            .health_check(std::time::Duration::from_secs(2))
            .await;

        let mut node_counts = HashMap::new();
        let mut total_nodes = 0;
        for kind in NodeKind::ALL {
            let count = count_kind(store.as_ref(), kind)?;
            total_nodes += count;
            node_counts.insert(kind.as_str().to_string(), count);
        }

        Ok(HealthStatus {
            healthy,
            node_counts,
            total_nodes,
            estimated_relationships: total_nodes * 3 / 2,
        })
    }
}
