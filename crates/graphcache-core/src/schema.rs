//! Identity and addressing primitives shared by every layer of the cache.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a node within a graph snapshot.
pub type NodeId = String;

/// An ordered set of node ids (edited ids, dependency sets).
pub type NodeIdSet = BTreeSet<NodeId>;

/// Well-known ids of the operation roots.
pub struct StaticNodeId;

impl StaticNodeId {
    pub const QUERY_ROOT: &'static str = "ROOT_QUERY";
    pub const MUTATION_ROOT: &'static str = "ROOT_MUTATION";
    pub const SUBSCRIPTION_ROOT: &'static str = "ROOT_SUBSCRIPTION";
}

/// Typename used for the query root when dispatching by type.
pub const QUERY_TYPENAME: &str = "Query";

/// One step into a JSON-like value: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Key(key) => f.write_str(key),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A path from a node's data root to a nested value.
pub type Path = Vec<PathSegment>;

/// Whether `target` starts with every segment of `prefix`.
pub fn path_begins_with(target: &[PathSegment], prefix: &[PathSegment]) -> bool {
    target.len() >= prefix.len() && target[..prefix.len()] == *prefix
}

/// A reference to (or from) another node, at a path within the
/// referencing node's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeReference {
    pub id: NodeId,
    pub path: Path,
}

impl NodeReference {
    pub fn new(id: impl Into<NodeId>, path: Path) -> Self {
        Self {
            id: id.into(),
            path,
        }
    }
}

/// Kind of the root operation of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Node id an operation of this type is rooted at by default.
    pub fn root_id(&self) -> &'static str {
        match self {
            Self::Query => StaticNodeId::QUERY_ROOT,
            Self::Mutation => StaticNodeId::MUTATION_ROOT,
            Self::Subscription => StaticNodeId::SUBSCRIPTION_ROOT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment_serialization() {
        let path: Path = vec!["list".into(), 0.into(), "id".into()];
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["list",0,"id"]"#);

        let parsed: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, path);
    }

    #[test]
    fn test_path_begins_with() {
        let path: Path = vec!["list".into(), 3.into()];
        assert!(path_begins_with(&path, &["list".into()]));
        assert!(path_begins_with(&path, &[]));
        assert!(!path_begins_with(&path, &["other".into()]));
        assert!(!path_begins_with(&["list".into()], &path));
    }

    #[test]
    fn test_operation_root_ids() {
        assert_eq!(OperationType::Query.root_id(), "ROOT_QUERY");
        assert_eq!(OperationType::Mutation.root_id(), "ROOT_MUTATION");
        assert_eq!(OperationType::Subscription.as_str(), "subscription");
    }
}
