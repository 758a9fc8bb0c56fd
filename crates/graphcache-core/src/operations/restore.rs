//! Rebuilding a cache snapshot from its serialized form.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache_snapshot::CacheSnapshot;
use crate::context::CacheContext;
use crate::error::{pretty_path, CacheError, Result};
use crate::graph::GraphSnapshot;
use crate::nodes::{NodeKind, NodeSnapshot};
use crate::operations::extract::SerializedGraph;
use crate::schema::{NodeId, NodeIdSet, NodeReference, PathSegment};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct RestoredSnapshot {
    pub snapshot: CacheSnapshot,
    /// Every restored node.
    pub edited_node_ids: NodeIdSet,
}

/// Restores `serialized`, re-embedding referenced entities into the nodes
/// that reference them.
pub fn restore(serialized: &SerializedGraph, context: &CacheContext) -> Result<RestoredSnapshot> {
    let mut nodes: HashMap<NodeId, NodeSnapshot> = serialized
        .iter()
        .map(|(id, node)| (id.clone(), node.to_node()))
        .collect();

    if let Some(transformer) = context.entity_transformer() {
        for node in nodes.values_mut() {
            let Some(data) = node.data.as_mut() else {
                continue;
            };
            if context.entity_id_for_value(data).is_none() {
                continue;
            }
            if let Some(map) = data.as_object_mut() {
                transformer(map);
            }
        }
    }

    let mut resolver = ReferenceResolver {
        nodes,
        done: NodeIdSet::new(),
        in_progress: NodeIdSet::new(),
    };
    let ids: Vec<NodeId> = serialized.keys().cloned().collect();
    for id in &ids {
        resolver.resolve(id)?;
    }

    let nodes = resolver
        .nodes
        .into_iter()
        .map(|(id, node)| (id, Arc::new(node)))
        .collect();
    let graph = Arc::new(GraphSnapshot::from_nodes(nodes));
    debug!(nodes = graph.len(), "Restored graph snapshot");

    Ok(RestoredSnapshot {
        snapshot: CacheSnapshot::from_baseline(graph),
        edited_node_ids: ids.into_iter().collect(),
    })
}

struct ReferenceResolver {
    nodes: HashMap<NodeId, NodeSnapshot>,
    done: NodeIdSet,
    in_progress: NodeIdSet,
}

/// A node whose references are being restored.
struct Frame {
    id: NodeId,
    references: Vec<NodeReference>,
    next: usize,
    /// The target of `references[next]` has been resolved.
    descended: bool,
}

impl ReferenceResolver {
    /// Restores the references of `id`, resolving referenced entities
    /// first so their embedded copies are complete.
    fn resolve(&mut self, id: &str) -> Result<()> {
        let mut stack: Vec<Frame> = self.enter(id).into_iter().collect();

        while let Some(frame) = stack.last_mut() {
            let Some(reference) = frame.references.get(frame.next).cloned() else {
                self.in_progress.remove(&frame.id);
                self.done.insert(frame.id.clone());
                stack.pop();
                continue;
            };

            let kind = self
                .nodes
                .get(&reference.id)
                .map(|target| target.kind)
                .ok_or_else(|| {
                    CacheError::consistency(format!(
                        "node {} references missing node {}",
                        frame.id, reference.id
                    ))
                })?;

            if kind == NodeKind::Entity && !frame.descended {
                frame.descended = true;
                if let Some(child) = self.enter(&reference.id) {
                    stack.push(child);
                }
                continue;
            }
            frame.next += 1;
            frame.descended = false;
            let id = frame.id.clone();

            match kind {
                NodeKind::Entity => {
                    let target = self
                        .nodes
                        .get(&reference.id)
                        .and_then(|target| target.data.clone())
                        .unwrap_or_default();
                    let Some(data) = self.nodes.get_mut(&id).and_then(|node| node.data.as_mut())
                    else {
                        continue;
                    };
                    if data.is_null() {
                        *data = target;
                    } else if data.is_list() || data.is_object() {
                        data.set_path(&reference.path, target);
                    }
                }
                NodeKind::ParameterizedValue => {
                    if !reference.path.iter().any(|segment| segment.as_index().is_some()) {
                        continue;
                    }
                    if let Some(data) = self.nodes.get_mut(&id).and_then(|node| node.data.as_mut()) {
                        restore_sparse_array(data, &reference.path)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Starts restoring `id`, unless it is already done or on the stack.
    fn enter(&mut self, id: &str) -> Option<Frame> {
        if self.done.contains(id) || !self.in_progress.insert(id.to_string()) {
            return None;
        }
        let references = match self.nodes.get(id) {
            Some(node) if node.data.is_some() => node.outbound.values().cloned().collect(),
            _ => Vec::new(),
        };
        Some(Frame {
            id: id.to_string(),
            references,
            next: 0,
            descended: false,
        })
    }
}

/// Turns the `null` a serialized list holds in place of a missing element
/// back into a missing element.
fn restore_sparse_array(data: &mut Value, path: &[PathSegment]) -> Result<()> {
    let mut current = data;

    for (depth, segment) in path.iter().enumerate() {
        let is_last = depth + 1 == path.len();
        let next = match (current, segment) {
            (Value::List(items), PathSegment::Index(index)) => {
                let items = Arc::make_mut(items);
                match items.get_mut(*index) {
                    Some(item) if item.is_null() => {
                        *item = Value::Absent;
                        return Ok(());
                    }
                    next => next,
                }
            }
            (Value::Object(map), PathSegment::Key(key)) => Arc::make_mut(map).get_mut(key),
            _ => return Ok(()),
        };

        match next {
            Some(value) if !value.is_absent() => current = value,
            _ if is_last => return Ok(()),
            _ => {
                return Err(CacheError::consistency(format!(
                    "Unexpected undefined in the path {} at index {}",
                    pretty_path(path),
                    depth
                )))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CacheConfig, RawOperation};
    use crate::operations::extract::extract;
    use crate::operations::read::read;
    use crate::operations::write::write;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_restore_embeds_entities() {
        let serialized: SerializedGraph = serde_json::from_value(json!({
            "ROOT_QUERY": {
                "type": 0,
                "data": {},
                "outbound": [{"id": "1", "path": ["viewer"]}]
            },
            "1": {
                "type": 0,
                "data": {"id": 1, "friend": null},
                "inbound": [{"id": "ROOT_QUERY", "path": ["viewer"]}],
                "outbound": [{"id": "2", "path": ["friend"]}]
            },
            "2": {
                "type": 0,
                "data": {"id": 2, "name": "Brie"},
                "inbound": [{"id": "1", "path": ["friend"]}]
            }
        }))
        .unwrap();

        let context = CacheContext::new(CacheConfig::default());
        let restored = restore(&serialized, &context).unwrap();
        let graph = &restored.snapshot.baseline;

        assert_eq!(
            graph.get_node_data("ROOT_QUERY"),
            Some(&Value::from(json!({"viewer": {"id": 1, "friend": {"id": 2, "name": "Brie"}}})))
        );
        assert_eq!(restored.edited_node_ids.len(), 3);
        assert!(Arc::ptr_eq(&restored.snapshot.baseline, &restored.snapshot.optimistic));
        graph.verify_references().unwrap();
    }

    #[test]
    fn test_round_trip_with_sparse_parameterized_list() {
        let context = CacheContext::new(CacheConfig::default());
        let raw = RawOperation::parse("{ rows { cell(col: 1) { value } } viewer { id name } }").unwrap();
        let payload = Value::from(json!({
            "rows": [{"cell": {"value": "a"}}, {"cell": {"value": "b"}}],
            "viewer": {"id": 1, "name": "Gouda"}
        }));
        let original = write(&context, &GraphSnapshot::new(), &raw, &payload).unwrap();

        let text = serde_json::to_string(&extract(&original.snapshot).unwrap()).unwrap();
        let serialized: SerializedGraph = serde_json::from_str(&text).unwrap();
        let restored = restore(&serialized, &context).unwrap();

        let before = read(&context, &raw, &original.snapshot, false).unwrap();
        let after = read(&context, &raw, &restored.snapshot.baseline, false).unwrap();
        assert!(before.complete);
        assert!(after.complete);
        assert_eq!(before.result, after.result);
    }

    #[test]
    fn test_missing_reference_target_is_a_bug() {
        let serialized: SerializedGraph = serde_json::from_value(json!({
            "ROOT_QUERY": {
                "type": 0,
                "data": {},
                "outbound": [{"id": "1", "path": ["viewer"]}]
            }
        }))
        .unwrap();

        let context = CacheContext::new(CacheConfig::default());
        let err = restore(&serialized, &context).unwrap_err();
        assert!(err.is_bug());
    }

    #[test]
    fn test_restore_sparse_array_in_place() {
        let mut data = Value::from(json!({"rows": [null, {"x": 1}]}));
        restore_sparse_array(&mut data, &["rows".into(), 0.into(), "cell".into()]).unwrap();
        assert!(data.get_path(&["rows".into(), 0.into()]).is_none());
        assert_eq!(data.get_path(&["rows".into(), 1.into(), "x".into()]), Some(&Value::from(json!(1))));

        let mut missing = Value::from(json!({}));
        let err = restore_sparse_array(&mut missing, &["rows".into(), 0.into(), "cell".into()])
            .unwrap_err();
        assert!(err.is_bug());
    }
}
