//! Serializing a graph snapshot.
//!
//! The serialized form maps each node id to its kind tag, data and
//! references. Entities embedded in other nodes are not repeated: their slot
//! is left out (or the whole data set to `null` when the reference is at the
//! root of the node) and restored from the reference on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CacheError, Result};
use crate::graph::GraphSnapshot;
use crate::nodes::{NodeKind, NodeSnapshot, References};
use crate::schema::{NodeId, NodeReference};
use crate::value::Value;

/// A serialized graph, ordered by node id.
pub type SerializedGraph = BTreeMap<NodeId, SerializedNode>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// `Some(Null)` and `None` differ: the former marks data replaced by a
    /// root-level entity reference.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<Vec<NodeReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<Vec<NodeReference>>,
}

impl SerializedNode {
    /// The node this entry describes, with data as stored.
    pub fn to_node(&self) -> NodeSnapshot {
        let mut node = NodeSnapshot::new(self.kind, self.data.clone());
        node.inbound = collect_references(self.inbound.as_deref());
        node.outbound = collect_references(self.outbound.as_deref());
        node
    }
}

fn deserialize_present<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn collect_references(references: Option<&[NodeReference]>) -> References {
    references
        .unwrap_or_default()
        .iter()
        .map(|reference| (reference.id.clone(), reference.clone()))
        .collect()
}

fn serialize_references(references: &References) -> Option<Vec<NodeReference>> {
    if references.is_empty() {
        None
    } else {
        Some(references.values().cloned().collect())
    }
}

/// Serializes every node of `snapshot`.
pub fn extract(snapshot: &GraphSnapshot) -> Result<SerializedGraph> {
    let mut serialized = SerializedGraph::new();

    for (id, node) in snapshot.nodes() {
        let mut data = node.data().cloned();

        for reference in node.outbound.values() {
            let target = snapshot.get_node_snapshot(&reference.id).ok_or_else(|| {
                CacheError::consistency(format!(
                    "node {} references missing node {}",
                    id, reference.id
                ))
            })?;
            if !target.is_entity() {
                continue;
            }
            if reference.path.is_empty() {
                data = Some(Value::Null);
            } else if let Some(data) = data.as_mut() {
                data.set_path(&reference.path, Value::Absent);
            }
        }

        serialized.insert(
            id.clone(),
            SerializedNode {
                kind: node.kind,
                data,
                inbound: serialize_references(&node.inbound),
                outbound: serialize_references(&node.outbound),
            },
        );
    }

    Ok(serialized)
}
