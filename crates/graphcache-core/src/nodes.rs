//! Node snapshots: the unit of storage within a graph snapshot.
//!
//! ```text
//!   ROOT_QUERY (entity)                        "123" (entity)
//!   data: { viewer: <copy of 123's data> }     data: { id: 123, name: "Gouda" }
//!   outbound: { "123" -> [viewer] }  ───────▶  inbound: { ROOT_QUERY -> [viewer] }
//!   outbound: { "ROOT_QUERY❖[\"foo\"]❖{..}" -> [foo] }
//!              │
//!              ▼
//!   ROOT_QUERY❖["foo"]❖{"id":1} (parameterized value)
//!   data: { name: "Brie" }
//!   inbound: { ROOT_QUERY -> [foo] }
//! ```
//!
//! Entity nodes embed a copy of every entity they reference at the
//! reference's path. Parameterized values are not embedded; readers overlay
//! them on demand.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::schema::{NodeId, NodeReference, PathSegment};
use crate::value::Value;

/// The two kinds of node a graph snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A normalized domain object, keyed by its identity.
    Entity,
    /// The value of one argument-bearing field, keyed by container, path
    /// and arguments.
    ParameterizedValue,
}

impl NodeKind {
    /// Tag used in the serialized node map.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Entity => 0,
            Self::ParameterizedValue => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Entity),
            1 => Some(Self::ParameterizedValue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::ParameterizedValue => "parameterized_value",
        }
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.tag())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        Self::from_tag(tag).ok_or_else(|| {
            de::Error::custom(format!(
                "invalid node type {}, expected 0 (entity) or 1 (parameterized value)",
                tag
            ))
        })
    }
}

/// Which side of a reference is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// References keyed by the id of the node on the other end.
pub type References = BTreeMap<NodeId, NodeReference>;

/// A node's value at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    pub data: Option<Value>,
    pub inbound: References,
    pub outbound: References,
}

impl NodeSnapshot {
    pub fn new(kind: NodeKind, data: Option<Value>) -> Self {
        Self {
            kind,
            data,
            inbound: References::new(),
            outbound: References::new(),
        }
    }

    pub fn entity(data: Option<Value>) -> Self {
        Self::new(NodeKind::Entity, data)
    }

    pub fn parameterized(data: Option<Value>) -> Self {
        Self::new(NodeKind::ParameterizedValue, data)
    }

    pub fn is_entity(&self) -> bool {
        self.kind == NodeKind::Entity
    }

    /// Present data of this node.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref().filter(|value| !value.is_absent())
    }

    pub fn references(&self, direction: Direction) -> &References {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    fn references_mut(&mut self, direction: Direction) -> &mut References {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }

    /// Whether this node references `id` at exactly `path`.
    pub fn has_reference(&self, direction: Direction, id: &str, path: &[PathSegment]) -> bool {
        self.references(direction)
            .get(id)
            .is_some_and(|reference| reference.path == path)
    }

    /// Adds a reference. Returns false if it was already present.
    pub fn add_reference(&mut self, direction: Direction, id: &str, path: &[PathSegment]) -> bool {
        if self.has_reference(direction, id, path) {
            return false;
        }
        self.references_mut(direction)
            .insert(id.to_string(), NodeReference::new(id, path.to_vec()));
        true
    }

    /// Removes a reference.
    ///
    /// Returns true when the node is left with no references in that
    /// direction (including when it had none to begin with). A reference
    /// recorded under a different path is left alone.
    pub fn remove_reference(
        &mut self,
        direction: Direction,
        id: &str,
        path: &[PathSegment],
    ) -> bool {
        if self.references(direction).is_empty() {
            return true;
        }
        if !self.has_reference(direction, id, path) {
            return false;
        }
        let references = self.references_mut(direction);
        references.remove(id);
        references.is_empty()
    }

    /// Outbound references whose path lies under `prefix`.
    pub fn outbound_under<'a>(
        &'a self,
        prefix: &'a [PathSegment],
    ) -> impl Iterator<Item = &'a NodeReference> + 'a {
        self.outbound
            .values()
            .filter(move |reference| crate::schema::path_begins_with(&reference.path, prefix))
    }
}

/// Builds the composite id of a parameterized value node.
///
/// The id joins the container id, the JSON form of the path and the JSON
/// form of the arguments. `serde_json` objects keep their keys sorted, so
/// identical arguments map to the same node regardless of key order.
pub fn node_id_for_parameterized_value(
    container_id: &str,
    path: &[PathSegment],
    args: &serde_json::Value,
) -> NodeId {
    let path_json = serde_json::Value::Array(
        path.iter()
            .map(|segment| match segment {
                PathSegment::Index(index) => serde_json::Value::from(*index),
                PathSegment::Key(key) => serde_json::Value::from(key.as_str()),
            })
            .collect(),
    );
    format!("{}❖{}❖{}", container_id, path_json, args)
}
