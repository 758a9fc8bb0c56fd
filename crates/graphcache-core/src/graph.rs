//! Immutable graph snapshots.
//!
//! A [`GraphSnapshot`] maps node ids to shared [`NodeSnapshot`]s. Snapshots
//! derived from one another share every node that was not edited, so holding
//! on to an old snapshot is cheap and always safe.
//!
//! Each snapshot also owns a read cache: the last [`QueryResult`] computed for
//! each operation against this exact snapshot. It is the only interior
//! mutability in the graph and is guarded by a mutex.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::OperationId;
use crate::error::{CacheError, Result};
use crate::nodes::{Direction, NodeKind, NodeSnapshot};
use crate::operations::read::QueryResult;
use crate::schema::{NodeId, StaticNodeId};
use crate::value::Value;

/// Entry in a snapshot's read cache.
#[derive(Debug, Clone)]
pub enum CachedRead {
    /// Completeness carried forward from an earlier snapshot; the result
    /// itself must be recomputed.
    Complete,
    /// A fully computed result.
    Result(Arc<QueryResult>),
}

#[derive(Debug, Default)]
pub struct GraphSnapshot {
    nodes: HashMap<NodeId, Arc<NodeSnapshot>>,
    read_cache: Mutex<HashMap<OperationId, CachedRead>>,
}

impl GraphSnapshot {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: HashMap<NodeId, Arc<NodeSnapshot>>) -> Self {
        Self {
            nodes,
            read_cache: Mutex::default(),
        }
    }

    /// Present data of a node.
    pub fn get_node_data(&self, id: &str) -> Option<&Value> {
        self.nodes.get(id).and_then(|node| node.data())
    }

    pub fn get_node_snapshot(&self, id: &str) -> Option<&Arc<NodeSnapshot>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn all_node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn nodes(&self) -> &HashMap<NodeId, Arc<NodeSnapshot>> {
        &self.nodes
    }

    /// Number of nodes of the given kind.
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|node| node.kind == kind).count()
    }

    /// Nodes that nothing references and that are not operation roots.
    pub fn orphaned_node_ids(&self) -> Vec<&NodeId> {
        let mut ids: Vec<_> = self
            .nodes
            .iter()
            .filter(|(id, node)| node.inbound.is_empty() && !is_root_id(id))
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Checks that every reference has a matching back-reference on the
    /// other node, at the same path.
    pub fn verify_references(&self) -> Result<()> {
        for (id, node) in &self.nodes {
            for (direction, opposite) in [
                (Direction::Outbound, Direction::Inbound),
                (Direction::Inbound, Direction::Outbound),
            ] {
                for reference in node.references(direction).values() {
                    let Some(target) = self.nodes.get(&reference.id) else {
                        return Err(CacheError::consistency(format!(
                            "node {} references missing node {}",
                            id, reference.id
                        )));
                    };
                    if !target.has_reference(opposite, id, &reference.path) {
                        return Err(CacheError::consistency(format!(
                            "node {} has no back-reference to {} at {:?}",
                            reference.id, id, reference.path
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn cached_read(&self, operation: OperationId) -> Option<CachedRead> {
        self.read_cache.lock().get(&operation).cloned()
    }

    pub(crate) fn store_read(&self, operation: OperationId, entry: CachedRead) {
        self.read_cache.lock().insert(operation, entry);
    }

    pub(crate) fn cached_reads(&self) -> Vec<(OperationId, CachedRead)> {
        self.read_cache
            .lock()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }
}

fn is_root_id(id: &str) -> bool {
    matches!(
        id,
        StaticNodeId::QUERY_ROOT | StaticNodeId::MUTATION_ROOT | StaticNodeId::SUBSCRIPTION_ROOT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linked_graph() -> HashMap<NodeId, Arc<NodeSnapshot>> {
        let mut root = NodeSnapshot::entity(Some(Value::from(json!({"viewer": {"id": 1}}))));
        root.add_reference(Direction::Outbound, "1", &["viewer".into()]);
        let mut viewer = NodeSnapshot::entity(Some(Value::from(json!({"id": 1}))));
        viewer.add_reference(Direction::Inbound, "ROOT_QUERY", &["viewer".into()]);

        let mut nodes = HashMap::new();
        nodes.insert("ROOT_QUERY".to_string(), Arc::new(root));
        nodes.insert("1".to_string(), Arc::new(viewer));
        nodes
    }

    #[test]
    fn test_verify_references() {
        let graph = GraphSnapshot::from_nodes(linked_graph());
        assert!(graph.verify_references().is_ok());
        assert!(graph.orphaned_node_ids().is_empty());

        let mut nodes = linked_graph();
        nodes.insert("1".to_string(), Arc::new(NodeSnapshot::entity(None)));
        let broken = GraphSnapshot::from_nodes(nodes);
        let err = broken.verify_references().unwrap_err();
        assert!(err.is_bug());
        assert_eq!(broken.orphaned_node_ids(), vec![&"1".to_string()]);
    }

    #[test]
    fn test_node_data_lookup() {
        let graph = GraphSnapshot::from_nodes(linked_graph());
        assert_eq!(graph.get_node_data("1"), Some(&Value::from(json!({"id": 1}))));
        assert_eq!(graph.get_node_data("missing"), None);
        assert_eq!(graph.count_kind(NodeKind::Entity), 2);
        assert_eq!(graph.len(), 2);
    }
}
