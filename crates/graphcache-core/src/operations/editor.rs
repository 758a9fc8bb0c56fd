//! The copy-on-write snapshot editor.
//!
//! A [`SnapshotEditor`] merges payloads into a parent [`GraphSnapshot`]
//! without touching it. Edits happen in three passes per payload:
//!
//! 1. Walk the payload alongside the parsed query. Scalar edits are written
//!    immediately. Identity changes are recorded as [`ReferenceEdit`]s.
//! 2. Apply the reference edits, once every node has its final data for this
//!    payload, and collect nodes left without inbound references.
//! 3. Remove those orphans, transitively.
//!
//! [`SnapshotEditor::commit`] then re-embeds edited entities into every node
//! that (transitively) references them and builds the new snapshot. Nodes
//! that were never touched stay shared with the parent.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::context::{CacheContext, OperationId, RawOperation};
use crate::error::{pretty_path, CacheError, Result};
use crate::graph::GraphSnapshot;
use crate::nodes::{node_id_for_parameterized_value, Direction, NodeSnapshot};
use crate::query::ParsedQuery;
use crate::schema::{NodeId, NodeIdSet, NodeReference, Path, PathSegment};
use crate::value::Value;

const ENSURE_ID_CONSISTENCY: &str =
    "Ensure id is included (or not included) consistently across multiple requests.";

/// A deferred change of the node referenced at `path` of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEdit {
    pub container_id: NodeId,
    pub path: Path,
    pub prev_node_id: Option<NodeId>,
    pub next_node_id: Option<NodeId>,
    /// Only fix up bookkeeping; the slot itself was already rewritten.
    pub no_write: bool,
}

/// The outcome of committing an editor.
#[derive(Debug, Clone)]
pub struct EditedSnapshot {
    pub snapshot: Arc<GraphSnapshot>,
    /// Nodes whose values changed (or that were removed).
    pub edited_node_ids: NodeIdSet,
    pub written_queries: BTreeSet<OperationId>,
    pub warnings: Vec<String>,
}

pub struct SnapshotEditor<'a> {
    context: &'a CacheContext,
    parent: &'a GraphSnapshot,
    /// Every node that differs from the parent; `None` marks a removal.
    new_nodes: HashMap<NodeId, Option<NodeSnapshot>>,
    edited_node_ids: NodeIdSet,
    written_queries: BTreeSet<OperationId>,
    warnings: Vec<String>,
}

/// A node whose affected references are being re-embedded.
struct EmbedFrame {
    id: NodeId,
    references: Vec<NodeReference>,
    next: usize,
    /// The target of `references[next]` has been materialized.
    descended: bool,
}

impl<'a> SnapshotEditor<'a> {
    pub fn new(context: &'a CacheContext, parent: &'a GraphSnapshot) -> Self {
        Self {
            context,
            parent,
            new_nodes: HashMap::new(),
            edited_node_ids: NodeIdSet::new(),
            written_queries: BTreeSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Merges `payload` into the snapshot, rooted at the operation's root.
    ///
    /// Returns the warnings produced by this payload.
    pub fn merge_payload(&mut self, raw: &RawOperation, payload: &Value) -> Result<Vec<String>> {
        let operation = self.context.parse_operation(raw)?;

        let mut reference_edits = Vec::new();
        let mut warnings = Vec::new();
        self.merge_subgraph(
            &mut reference_edits,
            &mut warnings,
            &operation.root_id,
            &[],
            &[],
            &operation.parsed_query,
            payload,
        )?;

        let orphaned = self.merge_reference_edits(reference_edits);
        self.remove_orphaned_nodes(orphaned);

        self.written_queries.insert(operation.id);
        self.warnings.extend(warnings.iter().cloned());
        trace!(
            operation = %operation.describe(),
            edited = self.edited_node_ids.len(),
            "Merged payload"
        );
        Ok(warnings)
    }

    /// Builds the new snapshot.
    pub fn commit(mut self) -> Result<EditedSnapshot> {
        self.transform_new_entities();
        self.rebuild_inbound_references();

        let verify = self.context.config().verify_snapshots;
        let edited_node_ids = std::mem::take(&mut self.edited_node_ids);
        let written_queries = std::mem::take(&mut self.written_queries);
        let warnings = std::mem::take(&mut self.warnings);
        let snapshot = self.build_new_snapshot();
        if verify {
            snapshot.verify_references()?;
        }

        debug!(
            nodes = snapshot.len(),
            edited = edited_node_ids.len(),
            "Committed graph snapshot"
        );
        Ok(EditedSnapshot {
            snapshot: Arc::new(snapshot),
            edited_node_ids,
            written_queries,
            warnings,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_subgraph(
        &mut self,
        reference_edits: &mut Vec<ReferenceEdit>,
        warnings: &mut Vec<String>,
        container_id: &str,
        prefix_path: &[PathSegment],
        path: &[PathSegment],
        parsed: &ParsedQuery,
        payload: &Value,
    ) -> Result<()> {
        let payload = if payload.is_absent() {
            Value::Null
        } else {
            payload.clone()
        };

        if !matches!(payload, Value::Object(_) | Value::List(_) | Value::Null) {
            return Err(CacheError::invalid_payload(
                format!(
                    "Received a {} value, but expected an object/array/null",
                    payload.type_name()
                ),
                prefix_path,
                container_id,
                path,
            ));
        }

        let previous_value = self
            .get_node_data(container_id)
            .and_then(|data| data.get_path(path))
            .cloned();

        if payload.is_list() || previous_value.as_ref().is_some_and(Value::is_list) {
            if previous_value
                .as_ref()
                .is_some_and(|previous| !previous.is_nil() && !previous.is_list())
            {
                return Err(CacheError::invalid_payload(
                    "Unsupported transition from a non-list to list value",
                    prefix_path,
                    container_id,
                    path,
                ));
            }
            if !payload.is_nil() && !payload.is_list() {
                return Err(CacheError::invalid_payload(
                    "Unsupported transition from a list to a non-list value",
                    prefix_path,
                    container_id,
                    path,
                ));
            }
            return self.merge_array_subgraph(
                reference_edits,
                warnings,
                container_id,
                prefix_path,
                path,
                parsed,
                &payload,
                previous_value.as_ref(),
            );
        }

        let payload_id = self.context.entity_id_for_value(&payload);
        let previous_id = previous_value
            .as_ref()
            .and_then(|previous| self.context.entity_id_for_value(previous));

        if payload_id != previous_id {
            if !payload.is_nil() && payload_id.is_none() {
                return Err(CacheError::invalid_payload(
                    format!(
                        "Unsupported transition from an entity to a non-entity value. {}",
                        ENSURE_ID_CONSISTENCY
                    ),
                    prefix_path,
                    container_id,
                    path,
                ));
            }
            if previous_value
                .as_ref()
                .is_some_and(|previous| !previous.is_nil())
                && previous_id.is_none()
            {
                return Err(CacheError::invalid_payload(
                    format!(
                        "Unsupported transition from a non-entity value to an entity. {}",
                        ENSURE_ID_CONSISTENCY
                    ),
                    prefix_path,
                    container_id,
                    path,
                ));
            }

            reference_edits.push(ReferenceEdit {
                container_id: container_id.to_string(),
                path: path.to_vec(),
                prev_node_id: previous_id,
                next_node_id: payload_id.clone(),
                no_write: false,
            });
            // The reference edit nulls out the slot.
            if payload_id.is_none() {
                return Ok(());
            }
        } else if payload.is_nil() {
            if previous_value != Some(Value::Null) {
                self.set_value(container_id, path, Value::Null, true);
            }
            return Ok(());
        }

        // Entering an entity makes it the container.
        let (container_id, prefix_path, path) = match payload_id {
            Some(id) => {
                let mut prefix: Path = prefix_path.to_vec();
                prefix.extend_from_slice(path);
                (id, prefix, Path::new())
            }
            None => (container_id.to_string(), prefix_path.to_vec(), path.to_vec()),
        };

        for (payload_name, node) in parsed {
            let schema_name = node.schema_name.as_deref().unwrap_or(payload_name);

            let field_value = match payload.as_object().and_then(|map| map.get(payload_name)) {
                None => Value::Null,
                Some(Value::Absent) => {
                    let mut at = prefix_path.clone();
                    at.extend_from_slice(&path);
                    at.push(PathSegment::from(payload_name.as_str()));
                    warnings.push(format!(
                        "Encountered undefined at {}. Treating as null",
                        pretty_path(&at)
                    ));
                    Value::Null
                }
                Some(value) => value.clone(),
            };

            let mut field_container_id = container_id.clone();
            let mut field_prefix_path = prefix_path.clone();
            let mut field_path = path.clone();
            field_path.push(PathSegment::from(schema_name));

            // Parameterized values live in their own node.
            if let Some(args) = &node.args {
                field_container_id =
                    self.ensure_parameterized_value_snapshot(&container_id, &field_path, args);
                field_prefix_path.extend(field_path);
                field_path = Path::new();
            }

            match &node.children {
                Some(children) => self.merge_subgraph(
                    reference_edits,
                    warnings,
                    &field_container_id,
                    &field_prefix_path,
                    &field_path,
                    children,
                    &field_value,
                )?,
                None => {
                    let previous_field_value = self
                        .get_node_data(&field_container_id)
                        .and_then(|data| data.get_path(&field_path));
                    if previous_field_value != Some(&field_value) {
                        self.set_value(&field_container_id, &field_path, field_value, true);
                    }
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_array_subgraph(
        &mut self,
        reference_edits: &mut Vec<ReferenceEdit>,
        warnings: &mut Vec<String>,
        container_id: &str,
        prefix_path: &[PathSegment],
        path: &[PathSegment],
        parsed: &ParsedQuery,
        payload: &Value,
        previous_value: Option<&Value>,
    ) -> Result<()> {
        let Some(items) = payload.as_list() else {
            self.set_value(container_id, path, Value::Null, true);
            return Ok(());
        };

        let previous_items = previous_value.and_then(Value::as_list);
        let previous_len = previous_items.map_or(0, <[Value]>::len);

        // Resize first, so no stray values or references survive a shrink.
        if items.len() != previous_len || previous_items.is_none() {
            let mut resized: Vec<Value> = previous_items
                .map(|previous| previous[..previous.len().min(items.len())].to_vec())
                .unwrap_or_default();
            resized.resize(items.len(), Value::Absent);
            self.set_value(container_id, path, Value::from_list(resized), true);

            if items.len() < previous_len {
                self.remove_array_references(reference_edits, container_id, path, items.len());
            }
        }

        let null = Value::Null;
        for (index, item) in items.iter().enumerate() {
            let mut item_path = path.to_vec();
            item_path.push(PathSegment::Index(index));

            let item = if item.is_absent() {
                let mut at = prefix_path.to_vec();
                at.extend_from_slice(&item_path);
                warnings.push(format!(
                    "Encountered hole in array at {}. Filling with null",
                    pretty_path(&at)
                ));
                &null
            } else {
                item
            };

            self.merge_subgraph(
                reference_edits,
                warnings,
                container_id,
                prefix_path,
                &item_path,
                parsed,
                item,
            )?;
        }

        Ok(())
    }

    /// Queues removal of references at or beyond `new_len` in the list at
    /// `prefix`.
    fn remove_array_references(
        &self,
        reference_edits: &mut Vec<ReferenceEdit>,
        container_id: &str,
        prefix: &[PathSegment],
        new_len: usize,
    ) {
        let Some(container) = self.get_node_snapshot(container_id) else {
            return;
        };

        for reference in container.outbound_under(prefix) {
            let Some(index) = reference.path.get(prefix.len()).and_then(PathSegment::as_index)
            else {
                continue;
            };
            if index < new_len {
                continue;
            }
            reference_edits.push(ReferenceEdit {
                container_id: container_id.to_string(),
                path: reference.path.clone(),
                prev_node_id: Some(reference.id.clone()),
                next_node_id: None,
                no_write: true,
            });
        }
    }

    /// Points edited references at their targets and updates bookkeeping on
    /// both ends. Returns the nodes left without inbound references.
    fn merge_reference_edits(&mut self, reference_edits: Vec<ReferenceEdit>) -> NodeIdSet {
        let mut orphaned = NodeIdSet::new();

        for edit in reference_edits {
            let ReferenceEdit {
                container_id,
                path,
                prev_node_id,
                next_node_id,
                no_write,
            } = edit;

            if !no_write {
                let target = match &next_node_id {
                    Some(id) => self.get_node_data(id).cloned().unwrap_or(Value::Absent),
                    None => Value::Null,
                };
                self.set_value(&container_id, &path, target, true);
            }

            if let Some(prev_id) = prev_node_id {
                self.ensure_new_snapshot(&container_id)
                    .remove_reference(Direction::Outbound, &prev_id, &path);
                let prev_target = self.ensure_new_snapshot(&prev_id);
                prev_target.remove_reference(Direction::Inbound, &container_id, &path);
                if prev_target.inbound.is_empty() {
                    orphaned.insert(prev_id);
                }
            }

            if let Some(next_id) = next_node_id {
                self.ensure_new_snapshot(&container_id)
                    .add_reference(Direction::Outbound, &next_id, &path);
                self.ensure_new_snapshot(&next_id)
                    .add_reference(Direction::Inbound, &container_id, &path);
                orphaned.remove(&next_id);
            }
        }

        orphaned
    }

    /// Removes orphaned nodes, and anything only they referenced.
    fn remove_orphaned_nodes(&mut self, orphaned: NodeIdSet) {
        let mut queue: Vec<NodeId> = orphaned.into_iter().collect();

        while let Some(id) = queue.pop() {
            let Some(node) = self.get_node_snapshot(&id) else {
                continue;
            };
            let outbound: Vec<NodeReference> = node.outbound.values().cloned().collect();

            trace!(node = %id, "Removing orphaned node");
            self.new_nodes.insert(id.clone(), None);
            self.edited_node_ids.insert(id.clone());

            for reference in outbound {
                if self.get_node_snapshot(&reference.id).is_none() {
                    continue;
                }
                let target = self.ensure_new_snapshot(&reference.id);
                if target.remove_reference(Direction::Inbound, &id, &reference.path) {
                    queue.push(reference.id);
                }
            }
        }
    }

    fn transform_new_entities(&mut self) {
        let Some(transformer) = self.context.entity_transformer() else {
            return;
        };
        let context = self.context;
        for node in self.new_nodes.values_mut().flatten() {
            if !node.is_entity() {
                continue;
            }
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

    /// Re-embeds edited entities into every node that references them,
    /// transitively, so no snapshot holds a stale copy.
    fn rebuild_inbound_references(&mut self) {
        let mut affected = self.edited_node_ids.clone();
        let mut queue: Vec<NodeId> = affected.iter().cloned().collect();
        while let Some(id) = queue.pop() {
            let Some(node) = self.get_node_snapshot(&id) else {
                continue;
            };
            if !node.is_entity() {
                continue;
            }
            for reference in node.inbound.values() {
                if affected.insert(reference.id.clone()) {
                    queue.push(reference.id.clone());
                }
            }
        }

        let mut done = NodeIdSet::new();
        let mut in_progress = NodeIdSet::new();
        for id in &affected {
            self.embed_references(id, &affected, &mut done, &mut in_progress);
        }
    }

    /// Copies the current data of every affected entity that `id` references
    /// into `id`, materializing those entities first. Reference cycles are
    /// cut where they close.
    fn embed_references(
        &mut self,
        id: &str,
        affected: &NodeIdSet,
        done: &mut NodeIdSet,
        in_progress: &mut NodeIdSet,
    ) {
        let mut stack: Vec<EmbedFrame> = self
            .embed_frame(id, affected, done, in_progress)
            .into_iter()
            .collect();

        while let Some(frame) = stack.last_mut() {
            let Some(reference) = frame.references.get(frame.next).cloned() else {
                in_progress.remove(&frame.id);
                done.insert(frame.id.clone());
                stack.pop();
                continue;
            };

            if !frame.descended {
                frame.descended = true;
                if let Some(child) = self.embed_frame(&reference.id, affected, done, in_progress) {
                    stack.push(child);
                }
                continue;
            }
            frame.next += 1;
            frame.descended = false;
            let id = frame.id.clone();

            let data = self
                .get_node_data(&reference.id)
                .cloned()
                .unwrap_or(Value::Absent);
            self.set_value(&id, &reference.path, data, false);
        }
    }

    /// Starts embedding into `id`, unless it is already done or on the stack.
    fn embed_frame(
        &self,
        id: &str,
        affected: &NodeIdSet,
        done: &NodeIdSet,
        in_progress: &mut NodeIdSet,
    ) -> Option<EmbedFrame> {
        if done.contains(id) || !in_progress.insert(id.to_string()) {
            return None;
        }
        let references = match self.get_node_snapshot(id) {
            Some(node) => node
                .outbound
                .values()
                .filter(|reference| affected.contains(&reference.id))
                .filter(|reference| {
                    self.get_node_snapshot(&reference.id)
                        .is_some_and(NodeSnapshot::is_entity)
                })
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Some(EmbedFrame {
            id: id.to_string(),
            references,
            next: 0,
            descended: false,
        })
    }

    fn build_new_snapshot(self) -> GraphSnapshot {
        let mut nodes = self.parent.nodes().clone();
        for (id, node) in self.new_nodes {
            match node {
                Some(node) => {
                    nodes.insert(id, Arc::new(node));
                }
                None => {
                    nodes.remove(&id);
                }
            }
        }
        GraphSnapshot::from_nodes(nodes)
    }

    /// Latest version of a node.
    pub fn get_node_snapshot(&self, id: &str) -> Option<&NodeSnapshot> {
        match self.new_nodes.get(id) {
            Some(node) => node.as_ref(),
            None => self.parent.get_node_snapshot(id).map(Arc::as_ref),
        }
    }

    /// Latest present data of a node.
    pub fn get_node_data(&self, id: &str) -> Option<&Value> {
        self.get_node_snapshot(id).and_then(NodeSnapshot::data)
    }

    /// Sets `value` at `path` of node `id`, copying only containers still
    /// shared with the parent snapshot.
    fn set_value(&mut self, id: &str, path: &[PathSegment], value: Value, is_edit: bool) {
        if is_edit {
            self.edited_node_ids.insert(id.to_string());
        }
        let node = self.ensure_new_snapshot(id);
        let mut data = node.data.take().unwrap_or_default();
        data.set_path(path, value);
        node.data = Some(data);
    }

    /// A writable version of node `id`. Unknown (or removed) ids become
    /// fresh entity nodes.
    fn ensure_new_snapshot(&mut self, id: &str) -> &mut NodeSnapshot {
        match self.new_nodes.entry(id.to_string()) {
            Entry::Occupied(entry) => entry
                .into_mut()
                .get_or_insert_with(|| NodeSnapshot::entity(None)),
            Entry::Vacant(entry) => {
                let node = self
                    .parent
                    .get_node_snapshot(id)
                    .map(|node| node.as_ref().clone())
                    .unwrap_or_else(|| NodeSnapshot::entity(None));
                entry
                    .insert(Some(node))
                    .get_or_insert_with(|| NodeSnapshot::entity(None))
            }
        }
    }

    /// Makes sure a parameterized value node exists for the field at `path`
    /// of the container, and returns its id.
    fn ensure_parameterized_value_snapshot(
        &mut self,
        container_id: &str,
        path: &[PathSegment],
        args: &serde_json::Value,
    ) -> NodeId {
        let field_id = node_id_for_parameterized_value(container_id, path, args);

        // Leave the container alone unless the link is missing.
        let linked = self
            .get_node_snapshot(container_id)
            .is_some_and(|container| container.has_reference(Direction::Outbound, &field_id, path));
        if !linked {
            let mut node = NodeSnapshot::parameterized(None);
            node.add_reference(Direction::Inbound, container_id, path);
            self.new_nodes.insert(field_id.clone(), Some(node));
            self.ensure_new_snapshot(container_id)
                .add_reference(Direction::Outbound, &field_id, path);
        }

        field_id
    }

    /// Writes a value and marks the node edited.
    pub(crate) fn set_node_value(&mut self, id: &str, path: &[PathSegment], value: Value) {
        self.set_value(id, path, value, true);
    }

    /// Inserts (or replaces) a node wholesale.
    pub(crate) fn insert_node(&mut self, id: &str, node: NodeSnapshot) {
        self.edited_node_ids.insert(id.to_string());
        self.new_nodes.insert(id.to_string(), Some(node));
    }

    /// Records a reference from `container_id` to `target_id` on both ends.
    pub(crate) fn link(&mut self, container_id: &str, target_id: &str, path: &[PathSegment]) {
        self.ensure_new_snapshot(container_id)
            .add_reference(Direction::Outbound, target_id, path);
        self.ensure_new_snapshot(target_id)
            .add_reference(Direction::Inbound, container_id, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CacheConfig;
    use crate::nodes::NodeKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn write(
        context: &CacheContext,
        parent: &GraphSnapshot,
        query: &str,
        payload: serde_json::Value,
    ) -> Result<EditedSnapshot> {
        let raw = RawOperation::parse(query).unwrap();
        let mut editor = SnapshotEditor::new(context, parent);
        editor.merge_payload(&raw, &Value::from(payload))?;
        editor.commit()
    }

    fn ids(ids: &[&str]) -> NodeIdSet {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_write_entity_reference() {
        let context = CacheContext::new(CacheConfig::new().verify_snapshots(true));
        let edited = write(
            &context,
            &GraphSnapshot::new(),
            "{ viewer { id name } }",
            json!({"viewer": {"id": 123, "name": "Gouda"}}),
        )
        .unwrap();

        let snapshot = &edited.snapshot;
        assert_eq!(
            snapshot.get_node_data("123"),
            Some(&Value::from(json!({"id": 123, "name": "Gouda"})))
        );
        let root = snapshot.get_node_snapshot("ROOT_QUERY").unwrap();
        assert!(root.has_reference(Direction::Outbound, "123", &["viewer".into()]));
        assert_eq!(
            root.data(),
            Some(&Value::from(json!({"viewer": {"id": 123, "name": "Gouda"}})))
        );
        assert_eq!(edited.edited_node_ids, ids(&["123", "ROOT_QUERY"]));
    }

    #[test]
    fn test_identical_write_edits_nothing() {
        let context = CacheContext::new(CacheConfig::default());
        let query = "{ viewer { id name friends { id } } foo(id: 1) { name } }";
        let payload = json!({
            "viewer": {"id": 1, "name": "Gouda", "friends": [{"id": 2}]},
            "foo": {"name": "Brie"}
        });

        let first = write(&context, &GraphSnapshot::new(), query, payload.clone()).unwrap();
        let second = write(&context, &first.snapshot, query, payload).unwrap();

        assert!(second.edited_node_ids.is_empty());
        for id in first.snapshot.all_node_ids() {
            assert!(Arc::ptr_eq(
                first.snapshot.get_node_snapshot(id).unwrap(),
                second.snapshot.get_node_snapshot(id).unwrap()
            ));
        }
    }

    #[test]
    fn test_nested_edit_rebuilds_referencing_nodes() {
        let context = CacheContext::new(CacheConfig::new().verify_snapshots(true));
        let base = write(
            &context,
            &GraphSnapshot::new(),
            "{ viewer { id friend { id name } } other { id } }",
            json!({"viewer": {"id": 1, "friend": {"id": 2, "name": "Brie"}}, "other": {"id": 3}}),
        )
        .unwrap();

        let edited = write(
            &context,
            &base.snapshot,
            "{ viewer { id friend { id name } } }",
            json!({"viewer": {"id": 1, "friend": {"id": 2, "name": "Camembert"}}}),
        )
        .unwrap();

        assert_eq!(edited.edited_node_ids, ids(&["2"]));
        assert_eq!(
            edited
                .snapshot
                .get_node_data("ROOT_QUERY")
                .and_then(|data| data.get_path(&["viewer".into(), "friend".into(), "name".into()])),
            Some(&Value::from("Camembert"))
        );
        assert!(Arc::ptr_eq(
            base.snapshot.get_node_snapshot("3").unwrap(),
            edited.snapshot.get_node_snapshot("3").unwrap()
        ));
        // The parent snapshot is untouched.
        assert_eq!(
            base.snapshot
                .get_node_data("1")
                .and_then(|data| data.get_path(&["friend".into(), "name".into()])),
            Some(&Value::from("Brie"))
        );
    }

    #[test]
    fn test_nulling_a_reference_orphans_the_subgraph() {
        let context = CacheContext::new(CacheConfig::new().verify_snapshots(true));
        let base = write(
            &context,
            &GraphSnapshot::new(),
            "{ viewer { id friend { id } } }",
            json!({"viewer": {"id": 1, "friend": {"id": 2}}}),
        )
        .unwrap();

        let edited = write(&context, &base.snapshot, "{ viewer { id } }", json!({"viewer": null}))
            .unwrap();

        assert!(!edited.snapshot.contains("1"));
        assert!(!edited.snapshot.contains("2"));
        assert_eq!(
            edited.snapshot.get_node_data("ROOT_QUERY"),
            Some(&Value::from(json!({"viewer": null})))
        );
        assert_eq!(edited.edited_node_ids, ids(&["1", "2", "ROOT_QUERY"]));
    }

    #[test]
    fn test_re_added_reference_is_not_orphaned() {
        let context = CacheContext::new(CacheConfig::new().verify_snapshots(true));
        let base = write(
            &context,
            &GraphSnapshot::new(),
            "{ a { id } b { id } }",
            json!({"a": {"id": 1}, "b": {"id": 2}}),
        )
        .unwrap();

        let edited = write(
            &context,
            &base.snapshot,
            "{ a { id } b { id } }",
            json!({"a": {"id": 2}, "b": {"id": 1}}),
        )
        .unwrap();

        assert!(edited.snapshot.contains("1"));
        assert!(edited.snapshot.contains("2"));
        let root = edited.snapshot.get_node_snapshot("ROOT_QUERY").unwrap();
        assert!(root.has_reference(Direction::Outbound, "2", &["a".into()]));
        assert!(root.has_reference(Direction::Outbound, "1", &["b".into()]));
    }

    #[test]
    fn test_shrinking_array_drops_references() {
        let context = CacheContext::new(CacheConfig::new().verify_snapshots(true));
        let base = write(
            &context,
            &GraphSnapshot::new(),
            "{ list { id } }",
            json!({"list": [{"id": 1}, {"id": 2}]}),
        )
        .unwrap();

        let edited = write(&context, &base.snapshot, "{ list { id } }", json!({"list": [{"id": 2}]}))
            .unwrap();

        let root = edited.snapshot.get_node_snapshot("ROOT_QUERY").unwrap();
        assert_eq!(root.outbound.len(), 1);
        assert!(root.has_reference(Direction::Outbound, "2", &["list".into(), 0.into()]));
        assert!(!edited.snapshot.contains("1"));
        assert_eq!(
            root.data(),
            Some(&Value::from(json!({"list": [{"id": 2}]})))
        );
    }

    #[test]
    fn test_parameterized_field_gets_its_own_node() {
        let context = CacheContext::new(CacheConfig::new().verify_snapshots(true));
        let edited = write(
            &context,
            &GraphSnapshot::new(),
            "{ foo(id: 1, withExtra: true) { name } }",
            json!({"foo": {"name": "Brie"}}),
        )
        .unwrap();

        let id = r#"ROOT_QUERY❖["foo"]❖{"id":1,"withExtra":true}"#;
        let node = edited.snapshot.get_node_snapshot(id).unwrap();
        assert_eq!(node.kind, NodeKind::ParameterizedValue);
        assert_eq!(node.data(), Some(&Value::from(json!({"name": "Brie"}))));
        assert!(node.has_reference(Direction::Inbound, "ROOT_QUERY", &["foo".into()]));
        // Parameterized values are not embedded in their container.
        assert_eq!(edited.snapshot.get_node_data("ROOT_QUERY"), None);
    }

    #[test]
    fn test_identity_transitions_are_rejected() {
        let context = CacheContext::new(CacheConfig::default());
        let base = write(
            &context,
            &GraphSnapshot::new(),
            "{ viewer { id name } }",
            json!({"viewer": {"id": 1, "name": "Gouda"}}),
        )
        .unwrap();

        let err = write(
            &context,
            &base.snapshot,
            "{ viewer { name } }",
            json!({"viewer": {"name": "Brie"}}),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Unsupported transition from an entity to a non-entity value"));

        let err = write(&context, &base.snapshot, "{ viewer { id name } }", json!({"viewer": 5}))
            .unwrap_err();
        assert!(err.to_string().contains("Received a number value"));

        let err = write(
            &context,
            &base.snapshot,
            "{ viewer { id name } }",
            json!({"viewer": [{"id": 1}]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-list to list"));
    }

    #[test]
    fn test_holes_and_undefined_values_warn() {
        let context = CacheContext::new(CacheConfig::default());
        let raw = RawOperation::parse("{ list { name } viewer { id name } }").unwrap();
        let mut payload = Value::object();
        payload.set_path(&["list".into(), 1.into(), "name".into()], Value::from("b"));
        payload.set_path(&["viewer".into(), "id".into()], Value::from(json!(1)));
        payload.set_path(&["viewer".into(), "name".into()], Value::Absent);

        let parent = GraphSnapshot::new();
        let mut editor = SnapshotEditor::new(&context, &parent);
        let warnings = editor.merge_payload(&raw, &payload).unwrap();
        let edited = editor.commit().unwrap();

        assert_eq!(
            warnings,
            vec![
                "Encountered hole in array at list.0. Filling with null".to_string(),
                "Encountered undefined at viewer.name. Treating as null".to_string(),
            ]
        );
        assert_eq!(edited.warnings, warnings);
        assert_eq!(
            edited.snapshot.get_node_data("1"),
            Some(&Value::from(json!({"id": 1, "name": null})))
        );
    }
}
