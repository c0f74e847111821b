//! Graph node and relationship types
//!
//! The logical property graph layered over the flat triple store: typed
//! nodes (pages, sessions, tags, ...), typed edges between them, and the
//! id scheme that makes both addressable.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Property map carried by nodes and relationships
pub type PropertyMap = Map<String, Value>;

/// Closed enumeration of node types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Page,
    Session,
    Tag,
    Domain,
    User,
    Device,
    Window,
    Tab,
}

impl NodeKind {
    /// All node kinds, in a stable order
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Page,
        NodeKind::Session,
        NodeKind::Tag,
        NodeKind::Domain,
        NodeKind::User,
        NodeKind::Device,
        NodeKind::Window,
        NodeKind::Tab,
    ];

    /// The string form used in ids and `type` triples
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Page => "page",
            NodeKind::Session => "session",
            NodeKind::Tag => "tag",
            NodeKind::Domain => "domain",
            NodeKind::User => "user",
            NodeKind::Device => "device",
            NodeKind::Window => "window",
            NodeKind::Tab => "tab",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "page" => Ok(NodeKind::Page),
            "session" => Ok(NodeKind::Session),
            "tag" => Ok(NodeKind::Tag),
            "domain" => Ok(NodeKind::Domain),
            "user" => Ok(NodeKind::User),
            "device" => Ok(NodeKind::Device),
            "window" => Ok(NodeKind::Window),
            "tab" => Ok(NodeKind::Tab),
            other => Err(StoreError::node_parse(
                other,
                format!("unknown node kind: {other}"),
            )),
        }
    }
}

/// Closed enumeration of relationship types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    NavigatedTo,
    OpenedInTab,
    PartOfSession,
    TaggedWith,
    BelongsToDomain,
    SyncedFrom,
    LinkedFrom,
    VisitedBy,
}

impl RelationshipKind {
    /// The string form used as the edge-triple predicate
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::NavigatedTo => "NAVIGATED_TO",
            RelationshipKind::OpenedInTab => "OPENED_IN_TAB",
            RelationshipKind::PartOfSession => "PART_OF_SESSION",
            RelationshipKind::TaggedWith => "TAGGED_WITH",
            RelationshipKind::BelongsToDomain => "BELONGS_TO_DOMAIN",
            RelationshipKind::SyncedFrom => "SYNCED_FROM",
            RelationshipKind::LinkedFrom => "LINKED_FROM",
            RelationshipKind::VisitedBy => "VISITED_BY",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationshipKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NAVIGATED_TO" => Ok(RelationshipKind::NavigatedTo),
            "OPENED_IN_TAB" => Ok(RelationshipKind::OpenedInTab),
            "PART_OF_SESSION" => Ok(RelationshipKind::PartOfSession),
            "TAGGED_WITH" => Ok(RelationshipKind::TaggedWith),
            "BELONGS_TO_DOMAIN" => Ok(RelationshipKind::BelongsToDomain),
            "SYNCED_FROM" => Ok(RelationshipKind::SyncedFrom),
            "LINKED_FROM" => Ok(RelationshipKind::LinkedFrom),
            "VISITED_BY" => Ok(RelationshipKind::VisitedBy),
            other => Err(StoreError::node_parse(
                other,
                format!("unknown relationship kind: {other}"),
            )),
        }
    }
}

/// Generate a globally unique node id: `{type}:{millis}-{random}[-{hint}]`
///
/// Ids are immutable after creation; the embedded kind prefix is what lets
/// `find_by` filter matches by type without extra reads.
pub fn generate_id(kind: NodeKind, hint: Option<&str>) -> String {
    let millis = Utc::now().timestamp_millis();
    let random = random_suffix(9);
    match hint {
        Some(h) if !h.is_empty() => format!("{}:{}-{}-{}", kind.as_str(), millis, random, h),
        _ => format!("{}:{}-{}", kind.as_str(), millis, random),
    }
}

/// Generate a relationship id: `{TYPE}:{millis}-{random}`
pub fn generate_relationship_id(kind: RelationshipKind) -> String {
    format!(
        "{}:{}-{}",
        kind.as_str(),
        Utc::now().timestamp_millis(),
        random_suffix(9)
    )
}

fn random_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Extract the kind prefix from a node id, if it parses
pub fn kind_of_id(id: &str) -> Option<NodeKind> {
    id.split(':').next()?.parse().ok()
}

/// A typed vertex in the property graph, in its dynamic form
///
/// This is the shape the codec and schema work on; typed access goes
/// through [`TypedNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub properties: PropertyMap,
}

impl GraphNode {
    /// Create a fresh node with a generated id and `created_at == updated_at`
    pub fn new(kind: NodeKind, properties: PropertyMap, hint: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(kind, hint),
            kind,
            created_at: now,
            updated_at: now,
            properties,
        }
    }
}

/// A typed edge in the property graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub from: String,
    pub to: String,
    pub created_at: DateTime<Utc>,
    pub properties: PropertyMap,
}

impl GraphRelationship {
    pub fn new(
        kind: RelationshipKind,
        from: impl Into<String>,
        to: impl Into<String>,
        properties: PropertyMap,
    ) -> Self {
        Self {
            id: generate_relationship_id(kind),
            kind,
            from: from.into(),
            to: to.into(),
            created_at: Utc::now(),
            properties,
        }
    }
}

/// Typed property record for one node kind
///
/// Each implementor has its own `properties` shape, which is what makes
/// decode type-specific: the dynamic map round-trips through serde into
/// the concrete record.
pub trait NodeRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: NodeKind;
}

/// A node paired with its typed property record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct TypedNode<T: NodeRecord> {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub props: T,
}

impl<T: NodeRecord> TypedNode<T> {
    /// Decode the dynamic form into this kind's typed shape
    pub fn from_graph(node: GraphNode) -> Result<Self> {
        if node.kind != T::KIND {
            return Err(StoreError::node_parse(
                &node.id,
                format!("expected kind {}, found {}", T::KIND, node.kind),
            ));
        }
        let props = serde_json::from_value(Value::Object(node.properties))
            .map_err(|e| StoreError::node_parse(&node.id, e.to_string()))?;
        Ok(Self {
            id: node.id,
            created_at: node.created_at,
            updated_at: node.updated_at,
            props,
        })
    }

    /// Encode back into the dynamic form the codec understands
    pub fn to_graph(&self) -> Result<GraphNode> {
        let properties = match serde_json::to_value(&self.props)? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::node_parse(
                    &self.id,
                    format!("record serialized to non-object value: {other}"),
                ))
            }
        };
        Ok(GraphNode {
            id: self.id.clone(),
            kind: T::KIND,
            created_at: self.created_at,
            updated_at: self.updated_at,
            properties,
        })
    }
}

/// Deserializers for string fields fed from the codec's untyped object slot.
///
/// The slot holds bare text, so a stored string that happens to look like a
/// number or a bool comes back as that scalar. String fields fold such
/// scalars back to their literal text instead of failing the typed decode.
/// JSON-shaped strings (`{`/`[`) are left alone; that ambiguity is a
/// documented property of the encoding.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        match Value::deserialize(de)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "invalid type: {other}, expected a string"
            ))),
        }
    }

    pub fn string_opt<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(de)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "invalid type: {other}, expected a string or null"
            ))),
        }
    }
}

/// A visited page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageProps {
    #[serde(deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub domain: String,
    #[serde(default)]
    pub visit_count: u64,
    #[serde(default)]
    pub total_time_spent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub tab_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub session_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub html: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub mhtml: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<Value>,
}

impl NodeRecord for PageProps {
    const KIND: NodeKind = NodeKind::Page;
}

/// A browsing session grouping pages over a time span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProps {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub page_count: u64,
}

impl NodeRecord for SessionProps {
    const KIND: NodeKind = NodeKind::Session;
}

/// A user-defined label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagProps {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub color: Option<String>,
}

impl NodeRecord for TagProps {
    const KIND: NodeKind = NodeKind::Tag;
}

/// A visited domain with rolled-up counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProps {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub category: Option<String>,
    #[serde(default)]
    pub visit_count: u64,
    #[serde(default)]
    pub total_time_spent: u64,
}

impl NodeRecord for DomainProps {
    const KIND: NodeKind = NodeKind::Domain;
}

/// A profile owning history entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProps {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub email: Option<String>,
}

impl NodeRecord for UserProps {
    const KIND: NodeKind = NodeKind::User;
}

/// A device history is synced from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProps {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl NodeRecord for DeviceProps {
    const KIND: NodeKind = NodeKind::Device;
}

/// A browser window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowProps {
    pub window_id: i64,
    #[serde(default)]
    pub focused: bool,
}

impl NodeRecord for WindowProps {
    const KIND: NodeKind = NodeKind::Window;
}

/// A browser tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabProps {
    pub tab_id: i64,
    pub window_id: i64,
    #[serde(default)]
    pub active: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_opt"
    )]
    pub url: Option<String>,
}

impl NodeRecord for TabProps {
    const KIND: NodeKind = NodeKind::Tab;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id(NodeKind::Page, None);
        assert!(id.starts_with("page:"));
        let rest = id.strip_prefix("page:").unwrap();
        let (millis, random) = rest.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 9);
    }

    #[test]
    fn test_generate_id_with_hint() {
        let id = generate_id(NodeKind::Tab, Some("w1"));
        assert!(id.starts_with("tab:"));
        assert!(id.ends_with("-w1"));
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id(NodeKind::Page, None);
        let b = generate_id(NodeKind::Page, None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_of_id() {
        let id = generate_id(NodeKind::Session, None);
        assert_eq!(kind_of_id(&id), Some(NodeKind::Session));
        assert_eq!(kind_of_id("nonsense"), None);
    }

    #[test]
    fn test_node_kind_round_trip() {
        for kind in NodeKind::ALL {
            let parsed: NodeKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_relationship_kind_round_trip() {
        let parsed: RelationshipKind = "NAVIGATED_TO".parse().unwrap();
        assert_eq!(parsed, RelationshipKind::NavigatedTo);
        assert!("NOT_A_KIND".parse::<RelationshipKind>().is_err());
    }

    #[test]
    fn test_typed_node_round_trip() {
        let props = PageProps {
            url: "https://example.com".into(),
            title: "Example".into(),
            domain: "example.com".into(),
            visit_count: 3,
            total_time_spent: 1200,
            last_visit: None,
            tab_id: Some("tab:1-a".into()),
            session_id: None,
            html: None,
            mhtml: None,
            screenshot: None,
            forms: None,
        };
        let typed = TypedNode {
            id: generate_id(NodeKind::Page, None),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            props,
        };

        let graph = typed.to_graph().unwrap();
        assert_eq!(graph.kind, NodeKind::Page);
        assert_eq!(
            graph.properties.get("visitCount"),
            Some(&Value::from(3u64))
        );

        let back: TypedNode<PageProps> = TypedNode::from_graph(graph).unwrap();
        assert_eq!(back.props, typed.props);
    }

    #[test]
    fn test_typed_node_wrong_kind_rejected() {
        let node = GraphNode::new(NodeKind::Tag, PropertyMap::new(), None);
        let result: Result<TypedNode<PageProps>> = TypedNode::from_graph(node);
        assert!(matches!(result, Err(StoreError::NodeParse { .. })));
    }

    #[test]
    fn test_typed_node_serde_round_trip() {
        let typed = TypedNode {
            id: "tag:1-a".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            props: TagProps {
                name: "reading".into(),
                color: None,
            },
        };

        let json = serde_json::to_string(&typed).unwrap();
        let back: TypedNode<TagProps> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, typed);
    }

    #[test]
    fn test_string_fields_accept_scalar_looking_values() {
        // the codec's object slot re-parses "42"/"true" as scalars; typed
        // string fields fold them back to their literal text
        let mut props = PropertyMap::new();
        props.insert("url".into(), Value::from("https://example.com/42"));
        props.insert("title".into(), Value::from(42));
        props.insert("domain".into(), Value::Bool(true));
        props.insert("tabId".into(), Value::from(7));
        let node = GraphNode::new(NodeKind::Page, props, None);

        let typed: TypedNode<PageProps> = TypedNode::from_graph(node).unwrap();
        assert_eq!(typed.props.title, "42");
        assert_eq!(typed.props.domain, "true");
        assert_eq!(typed.props.tab_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_string_fields_still_reject_composites() {
        let mut props = PropertyMap::new();
        props.insert("url".into(), Value::from("https://example.com"));
        props.insert("title".into(), serde_json::json!({"not": "a title"}));
        props.insert("domain".into(), Value::from("example.com"));
        let node = GraphNode::new(NodeKind::Page, props, None);

        let result: Result<TypedNode<PageProps>> = TypedNode::from_graph(node);
        assert!(matches!(result, Err(StoreError::NodeParse { .. })));
    }
}
