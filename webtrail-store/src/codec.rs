//! Triple codec
//!
//! Pure conversions between typed nodes/relationships and flat triples.
//! A node becomes one `type` triple, one `createdAt`/`updatedAt` triple
//! each, and one triple per property. A relationship becomes a forward
//! edge triple `(from, TYPE, to)` plus a record keyed by its own id.
//!
//! The object slot is a plain string, so value decoding is heuristic:
//! anything starting with `{` or `[` is speculatively parsed as JSON,
//! then integer, float, and bool parses are attempted before falling back
//! to string. A literal string value that happens to look like JSON (or a
//! number) will be mis-decoded — a known ambiguity of this encoding,
//! preserved rather than tagged away.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::model::{GraphNode, GraphRelationship, NodeKind, PropertyMap, RelationshipKind};
use crate::triple::Triple;

/// Predicate of the node-type triple
pub const PRED_TYPE: &str = "type";
/// Predicate of the creation-timestamp triple
pub const PRED_CREATED_AT: &str = "createdAt";
/// Predicate of the update-timestamp triple
pub const PRED_UPDATED_AT: &str = "updatedAt";
/// Predicates of the relationship record
pub const PRED_FROM: &str = "from";
pub const PRED_TO: &str = "to";
pub const PRED_PROPERTIES: &str = "properties";

/// Encode a property value into the object slot
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => other.to_string(),
    }
}

/// Decode an object slot back into a property value
///
/// Heuristic, not a tagged encoding: see the module docs for the known
/// ambiguities this carries.
pub fn decode_value(raw: &str) -> Value {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str(raw) {
            return parsed;
        }
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() && raw.chars().any(|c| c.is_ascii_digit()) {
            return Value::from(float);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Decompose a node into its triple bundle
pub fn node_to_triples(node: &GraphNode) -> Vec<Triple> {
    let mut triples = Vec::with_capacity(3 + node.properties.len());
    triples.push(Triple::new(&node.id, PRED_TYPE, node.kind.as_str()));
    triples.push(Triple::new(
        &node.id,
        PRED_CREATED_AT,
        node.created_at.to_rfc3339(),
    ));
    triples.push(Triple::new(
        &node.id,
        PRED_UPDATED_AT,
        node.updated_at.to_rfc3339(),
    ));

    for (key, value) in &node.properties {
        if value.is_null() {
            continue;
        }
        // reserved predicates never appear as property names in typed records
        if key == PRED_TYPE || key == PRED_CREATED_AT || key == PRED_UPDATED_AT {
            continue;
        }
        triples.push(Triple::new(&node.id, key, encode_value(value)));
    }

    triples
}

/// Reassemble a node from the triples sharing its subject
pub fn triples_to_node(id: &str, triples: &[Triple]) -> Result<GraphNode> {
    let mut kind: Option<NodeKind> = None;
    let mut created_at: Option<DateTime<Utc>> = None;
    let mut updated_at: Option<DateTime<Utc>> = None;
    let mut properties = PropertyMap::new();

    for triple in triples {
        if triple.subject != id {
            continue;
        }
        match triple.predicate.as_str() {
            PRED_TYPE => kind = Some(triple.object.parse()?),
            PRED_CREATED_AT => created_at = Some(parse_timestamp(id, &triple.object)?),
            PRED_UPDATED_AT => updated_at = Some(parse_timestamp(id, &triple.object)?),
            _ => {
                properties.insert(triple.predicate.clone(), decode_value(&triple.object));
            }
        }
    }

    let kind = kind.ok_or_else(|| StoreError::node_parse(id, "missing type triple"))?;
    let created_at =
        created_at.ok_or_else(|| StoreError::node_parse(id, "missing createdAt triple"))?;
    let updated_at = updated_at.unwrap_or(created_at);

    Ok(GraphNode {
        id: id.to_string(),
        kind,
        created_at,
        updated_at,
        properties,
    })
}

/// Decompose a relationship into its forward edge plus record triples
pub fn relationship_to_triples(rel: &GraphRelationship) -> Result<Vec<Triple>> {
    let mut triples = vec![
        Triple::new(&rel.from, rel.kind.as_str(), &rel.to),
        Triple::new(&rel.id, PRED_TYPE, rel.kind.as_str()),
        Triple::new(&rel.id, PRED_FROM, &rel.from),
        Triple::new(&rel.id, PRED_TO, &rel.to),
        Triple::new(&rel.id, PRED_CREATED_AT, rel.created_at.to_rfc3339()),
    ];
    triples.push(Triple::new(
        &rel.id,
        PRED_PROPERTIES,
        serde_json::to_string(&rel.properties)?,
    ));
    Ok(triples)
}

/// Reassemble a relationship from its record triples
pub fn triples_to_relationship(id: &str, triples: &[Triple]) -> Result<GraphRelationship> {
    let mut kind: Option<RelationshipKind> = None;
    let mut from: Option<String> = None;
    let mut to: Option<String> = None;
    let mut created_at: Option<DateTime<Utc>> = None;
    let mut properties = PropertyMap::new();

    for triple in triples {
        if triple.subject != id {
            continue;
        }
        match triple.predicate.as_str() {
            PRED_TYPE => kind = Some(triple.object.parse()?),
            PRED_FROM => from = Some(triple.object.clone()),
            PRED_TO => to = Some(triple.object.clone()),
            PRED_CREATED_AT => created_at = Some(parse_timestamp(id, &triple.object)?),
            PRED_PROPERTIES => {
                properties = serde_json::from_str(&triple.object)
                    .map_err(|e| StoreError::node_parse(id, e.to_string()))?;
            }
            _ => {}
        }
    }

    Ok(GraphRelationship {
        id: id.to_string(),
        kind: kind.ok_or_else(|| StoreError::node_parse(id, "missing type triple"))?,
        from: from.ok_or_else(|| StoreError::node_parse(id, "missing from triple"))?,
        to: to.ok_or_else(|| StoreError::node_parse(id, "missing to triple"))?,
        created_at: created_at
            .ok_or_else(|| StoreError::node_parse(id, "missing createdAt triple"))?,
        properties,
    })
}

/// Partial reconstruction from a forward edge triple alone
///
/// Query-side reads work off the edge triple and never fetch the record,
/// so `created_at` is a placeholder epoch and `properties` is empty.
pub fn relationship_from_edge(edge: &Triple) -> Result<GraphRelationship> {
    let kind: RelationshipKind = edge.predicate.parse()?;
    Ok(GraphRelationship {
        id: format!("{}:{}:{}", kind.as_str(), edge.subject, edge.object),
        kind,
        from: edge.subject.clone(),
        to: edge.object.clone(),
        created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default(),
        properties: PropertyMap::new(),
    })
}

fn parse_timestamp(id: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::node_parse(id, format!("bad timestamp {raw:?}: {e}")))
}
