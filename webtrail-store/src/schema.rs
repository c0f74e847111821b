//! Per-type schema constraints
//!
//! The triple store itself is schema-less; these static tables are the
//! only notion of structure the data layer enforces. Validation produces
//! human-readable violation strings rather than failing eagerly, and
//! uniqueness is advisory only: callers enforce it with a `find_by`
//! lookup before `create`, which leaves a race window between the check
//! and the write.

use crate::model::{GraphNode, NodeKind};
use crate::triple::Triple;
use serde_json::Value;

/// Static constraint set for one node kind
#[derive(Debug, Clone, Copy)]
pub struct SchemaConstraints {
    /// Properties that must be present and non-null
    pub required: &'static [&'static str],
    /// Properties that get a synthetic index triple on write
    pub indexed: &'static [&'static str],
    /// Properties callers should keep unique (advisory, never atomic)
    pub unique: &'static [&'static str],
}

const PAGE: SchemaConstraints = SchemaConstraints {
    required: &["url", "title", "domain"],
    indexed: &["url", "domain", "visitCount"],
    unique: &["url"],
};

const SESSION: SchemaConstraints = SchemaConstraints {
    required: &["name", "startTime"],
    indexed: &["name"],
    unique: &[],
};

const TAG: SchemaConstraints = SchemaConstraints {
    required: &["name"],
    indexed: &["name"],
    unique: &["name"],
};

const DOMAIN: SchemaConstraints = SchemaConstraints {
    required: &["name"],
    indexed: &["name"],
    unique: &["name"],
};

const USER: SchemaConstraints = SchemaConstraints {
    required: &["name"],
    indexed: &["email"],
    unique: &["email"],
};

const DEVICE: SchemaConstraints = SchemaConstraints {
    required: &["name"],
    indexed: &["name"],
    unique: &[],
};

const WINDOW: SchemaConstraints = SchemaConstraints {
    required: &["windowId"],
    indexed: &["windowId"],
    unique: &[],
};

const TAB: SchemaConstraints = SchemaConstraints {
    required: &["tabId"],
    indexed: &["tabId"],
    unique: &[],
};

/// Look up the constraint set for a node kind
pub fn constraints(kind: NodeKind) -> &'static SchemaConstraints {
    match kind {
        NodeKind::Page => &PAGE,
        NodeKind::Session => &SESSION,
        NodeKind::Tag => &TAG,
        NodeKind::Domain => &DOMAIN,
        NodeKind::User => &USER,
        NodeKind::Device => &DEVICE,
        NodeKind::Window => &WINDOW,
        NodeKind::Tab => &TAB,
    }
}

/// Check a node against its kind's constraints
///
/// Returns one violation string per missing or null required property.
/// An empty vec means the node is valid; callers decide whether a
/// non-empty result is fatal.
pub fn validate_node(node: &GraphNode) -> Vec<String> {
    let constraints = constraints(node.kind);
    let mut violations = Vec::new();

    for required in constraints.required {
        match node.properties.get(*required) {
            None | Some(Value::Null) => {
                violations.push(format!("Missing required property: {required}"));
            }
            Some(_) => {}
        }
    }

    violations
}

/// Emit one synthetic index triple per indexed property with a non-null value
///
/// Index triples emulate a secondary index over a store that only supports
/// triple-pattern lookup: `(index:{type}:{property}:{value}, nodeId, id)`.
pub fn create_index_triples(node: &GraphNode) -> Vec<Triple> {
    let constraints = constraints(node.kind);
    let mut triples = Vec::new();

    for indexed in constraints.indexed {
        let value = match node.properties.get(*indexed) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        triples.push(Triple::new(
            format!("index:{}:{}:{}", node.kind, indexed, value),
            node.id.clone(),
            node.id.clone(),
        ));
    }

    triples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyMap;
    use serde_json::json;

    fn page_node(props: PropertyMap) -> GraphNode {
        GraphNode::new(NodeKind::Page, props, None)
    }

    #[test]
    fn test_validate_complete_page() {
        let mut props = PropertyMap::new();
        props.insert("url".into(), json!("https://example.com"));
        props.insert("title".into(), json!("Example"));
        props.insert("domain".into(), json!("example.com"));

        assert!(validate_node(&page_node(props)).is_empty());
    }

    #[test]
    fn test_validate_page_missing_title() {
        let mut props = PropertyMap::new();
        props.insert("url".into(), json!("https://example.com"));
        props.insert("domain".into(), json!("example.com"));

        let violations = validate_node(&page_node(props));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("title"));
    }

    #[test]
    fn test_validate_null_counts_as_missing() {
        let mut props = PropertyMap::new();
        props.insert("url".into(), json!("https://example.com"));
        props.insert("title".into(), Value::Null);
        props.insert("domain".into(), json!("example.com"));

        let violations = validate_node(&page_node(props));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("title"));
    }

    #[test]
    fn test_index_triples_for_page() {
        let mut props = PropertyMap::new();
        props.insert("url".into(), json!("https://example.com"));
        props.insert("title".into(), json!("Example"));
        props.insert("domain".into(), json!("example.com"));
        props.insert("visitCount".into(), json!(4));
        let node = page_node(props);

        let triples = create_index_triples(&node);
        assert_eq!(triples.len(), 3);

        let url_index = triples
            .iter()
            .find(|t| t.subject == "index:page:url:https://example.com")
            .unwrap();
        assert_eq!(url_index.predicate, node.id);
        assert_eq!(url_index.object, node.id);

        assert!(triples
            .iter()
            .any(|t| t.subject == "index:page:visitCount:4"));
    }

    #[test]
    fn test_index_triples_skip_null_and_absent() {
        let mut props = PropertyMap::new();
        props.insert("url".into(), json!("https://example.com"));
        props.insert("domain".into(), Value::Null);
        let node = page_node(props);

        let triples = create_index_triples(&node);
        assert_eq!(triples.len(), 1);
        assert!(triples[0].subject.starts_with("index:page:url:"));
    }

    #[test]
    fn test_every_kind_has_constraints() {
        for kind in NodeKind::ALL {
            // required properties are always a subset of what we'd index sensibly
            let c = constraints(kind);
            assert!(!c.required.is_empty());
        }
    }
}
