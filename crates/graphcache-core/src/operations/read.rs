//! Reading operations out of a graph snapshot.
//!
//! Static operations read straight from the root node's embedded data.
//! Dynamic ones (aliases or arguments somewhere in the tree) get a private
//! copy of that data with every parameterized field overlaid from its own
//! node. Either way the result is then walked against the selection to
//! decide completeness, optionally collecting the entities it touched.
//!
//! Results are cached per snapshot and operation.

use std::sync::Arc;

use tracing::trace;

use crate::context::{CacheContext, OperationInstance, RawOperation};
use crate::error::Result;
use crate::graph::{CachedRead, GraphSnapshot};
use crate::nodes::node_id_for_parameterized_value;
use crate::query::ParsedQuery;
use crate::schema::{NodeId, NodeIdSet, PathSegment, StaticNodeId, QUERY_TYPENAME};
use crate::tracer::ReadEnd;
use crate::util::walk_operation;
use crate::value::Value;

/// The outcome of reading an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Data found for the operation; `None` when the root is unknown.
    pub result: Option<Value>,
    /// Every selected field was found.
    pub complete: bool,
    /// Entities the result was built from, when requested.
    pub entity_ids: Option<NodeIdSet>,
    /// Parameterized value nodes consulted, for dynamic operations.
    pub dynamic_node_ids: Option<NodeIdSet>,
}

impl QueryResult {
    /// Whether the result depends on any of `ids`.
    ///
    /// Results without collected entity ids conservatively depend on
    /// everything.
    pub fn depends_on(&self, ids: &NodeIdSet) -> bool {
        let Some(entity_ids) = &self.entity_ids else {
            return true;
        };
        let touches = |set: &NodeIdSet| ids.iter().any(|id| set.contains(id));
        touches(entity_ids) || self.dynamic_node_ids.as_ref().is_some_and(touches)
    }
}

/// Reads `raw` from `snapshot`.
///
/// With `include_node_ids`, the result also records every entity it was
/// built from, which lets callers decide whether later edits affect it.
pub fn read(
    context: &CacheContext,
    raw: &RawOperation,
    snapshot: &GraphSnapshot,
    include_node_ids: bool,
) -> Result<Arc<QueryResult>> {
    let operation = context.parse_operation(raw)?;
    context.tracer().read_start(&operation);

    let (result, cache_hit) = read_operation(context, &operation, snapshot, include_node_ids);

    context.tracer().read_end(
        &operation,
        ReadEnd {
            result: &result,
            cache_hit,
        },
    );
    Ok(result)
}

fn read_operation(
    context: &CacheContext,
    operation: &OperationInstance,
    snapshot: &GraphSnapshot,
    include_node_ids: bool,
) -> (Arc<QueryResult>, bool) {
    let result = match snapshot.cached_read(operation.id) {
        Some(CachedRead::Result(cached)) => {
            if !include_node_ids || cached.entity_ids.is_some() {
                return (cached, true);
            }
            let mut result = cached.as_ref().clone();
            let (complete, entity_ids) =
                visit_selection(context, operation, result.result.as_ref(), true);
            result.complete = complete;
            result.entity_ids = Some(entity_ids);
            result
        }
        // Known to be complete; only the data needs rebuilding.
        Some(CachedRead::Complete) => {
            let mut result = compute_result(context, operation, snapshot);
            result.complete = true;
            if include_node_ids {
                let (_, entity_ids) =
                    visit_selection(context, operation, result.result.as_ref(), true);
                result.entity_ids = Some(entity_ids);
            }
            result
        }
        None => {
            let mut result = compute_result(context, operation, snapshot);
            let (complete, entity_ids) =
                visit_selection(context, operation, result.result.as_ref(), include_node_ids);
            result.complete = complete;
            if include_node_ids {
                result.entity_ids = Some(entity_ids);
            }
            result
        }
    };

    trace!(
        operation = %operation.describe(),
        complete = result.complete,
        "Computed read"
    );
    let result = Arc::new(result);
    snapshot.store_read(operation.id, CachedRead::Result(result.clone()));
    (result, false)
}

fn compute_result(
    context: &CacheContext,
    operation: &OperationInstance,
    snapshot: &GraphSnapshot,
) -> QueryResult {
    let mut result = snapshot.get_node_data(&operation.root_id).cloned();
    let mut dynamic_node_ids = None;

    if !operation.is_static {
        let mut overlay = Overlay {
            context,
            snapshot,
            dynamic_node_ids: NodeIdSet::new(),
        };
        result = overlay.apply(operation);
        dynamic_node_ids = Some(overlay.dynamic_node_ids);
    }

    QueryResult {
        result,
        complete: false,
        entity_ids: None,
        dynamic_node_ids,
    }
}

/// Walks `result` against the selection.
///
/// Returns whether every selected field is present, plus the entity ids
/// seen (when collecting). Collection stops at the first missing field.
fn visit_selection(
    context: &CacheContext,
    operation: &OperationInstance,
    result: Option<&Value>,
    collect_ids: bool,
) -> (bool, NodeIdSet) {
    let mut complete = true;
    let mut entity_ids = NodeIdSet::new();
    if collect_ids && result.is_some() {
        entity_ids.insert(operation.root_id.clone());
    }

    walk_operation(&operation.info.parsed, result, |value, fields| {
        if value.is_none() {
            complete = false;
        }
        if !complete {
            return !collect_ids;
        }
        let Some(value) = value.filter(|value| value.is_object()) else {
            return false;
        };

        if collect_ids {
            if let Some(id) = context.entity_id_for_value(value) {
                entity_ids.insert(id);
            }
        }
        if fields.iter().any(|field| !value.contains_key(field)) {
            complete = false;
        }
        false
    });

    (complete, entity_ids)
}

/// Copies parameterized values into a private copy of the root's data.
struct Overlay<'a> {
    context: &'a CacheContext,
    snapshot: &'a GraphSnapshot,
    dynamic_node_ids: NodeIdSet,
}

impl Overlay<'_> {
    fn apply(&mut self, operation: &OperationInstance) -> Option<Value> {
        let root = self.snapshot.get_node_snapshot(&operation.root_id)?;
        let mut value = root.data().cloned().unwrap_or_else(Value::object);
        self.overlay_object(&mut value, &operation.root_id, &[], &operation.parsed_query);
        Some(value)
    }

    fn overlay_object(
        &mut self,
        value: &mut Value,
        container_id: &str,
        path: &[PathSegment],
        parsed: &ParsedQuery,
    ) {
        let entity_id = self.context.entity_id_for_value(value);
        if entity_id.is_some() {
            if let Some(transformer) = self.context.entity_transformer() {
                if let Some(map) = value.as_object_mut() {
                    transformer(map);
                }
            }
        }

        // Entities restart addressing from their own node.
        let (container_id, path): (NodeId, Vec<PathSegment>) = match entity_id {
            Some(id) => (id, Vec::new()),
            None => (container_id.to_string(), path.to_vec()),
        };

        for (key, node) in parsed {
            let field_name = node.schema_name.as_deref().unwrap_or(key);
            let mut field_path = path.clone();
            field_path.push(PathSegment::from(field_name));

            let (mut child, child_container_id, child_path) = match &node.args {
                Some(args) => {
                    let mut child_id =
                        node_id_for_parameterized_value(&container_id, &field_path, args);
                    if !self.snapshot.contains(&child_id) {
                        match self.redirect(value, &container_id, field_name, args) {
                            Some(redirected) => child_id = redirected,
                            None => continue,
                        }
                    }
                    self.dynamic_node_ids.insert(child_id.clone());
                    let child = self
                        .snapshot
                        .get_node_data(&child_id)
                        .cloned()
                        .unwrap_or_default();
                    (child, child_id, Vec::new())
                }
                None => {
                    let child = value.get(field_name).cloned().unwrap_or_default();
                    (child, container_id.clone(), field_path)
                }
            };

            if let Some(children) = node.children.as_ref().filter(|_| node.has_parameterized_children) {
                self.overlay_child(&mut child, &child_container_id, &child_path, children);
            }

            if !child.is_absent() {
                if let Some(map) = value.as_object_mut() {
                    map.insert(key.clone(), child);
                }
            }
        }
    }

    fn overlay_child(
        &mut self,
        child: &mut Value,
        container_id: &str,
        path: &[PathSegment],
        parsed: &ParsedQuery,
    ) {
        match child {
            Value::Null => {}
            Value::Absent => {
                *child = Value::object();
                self.overlay_object(child, container_id, path, parsed);
            }
            Value::List(items) => {
                for (index, item) in Arc::make_mut(items).iter_mut().enumerate() {
                    let mut item_path = path.to_vec();
                    item_path.push(PathSegment::Index(index));
                    self.overlay_child(item, container_id, &item_path, parsed);
                }
            }
            Value::Object(_) => self.overlay_object(child, container_id, path, parsed),
            _ => {}
        }
    }

    /// Looks up a configured redirect for a parameterized field missing
    /// from the graph.
    fn redirect(
        &self,
        value: &Value,
        container_id: &str,
        field_name: &str,
        args: &serde_json::Value,
    ) -> Option<NodeId> {
        let typename = match value.get("__typename").and_then(Value::as_str) {
            Some(typename) => typename,
            None if container_id == StaticNodeId::QUERY_ROOT => QUERY_TYPENAME,
            None => return None,
        };
        let redirect = self.context.resolver_redirect(typename, field_name)?;
        redirect(args)
    }
}
