//! Transactions: a private working copy of the cache state.
//!
//! A [`CacheTransaction`] collects writes against either the baseline or,
//! when it carries a change id, the optimistic view. Nothing it does is
//! visible until the [`Cache`](crate::Cache) commits it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache_snapshot::CacheSnapshot;
use crate::context::{CacheContext, EntityUpdater, OperationId, RawOperation};
use crate::error::Result;
use crate::graph::GraphSnapshot;
use crate::nodes::NodeSnapshot;
use crate::operations::read::{read, QueryResult};
use crate::operations::write::write;
use crate::optimistic::{ChangeId, OptimisticDelta};
use crate::schema::{NodeId, NodeIdSet, StaticNodeId, QUERY_TYPENAME};
use crate::value::Value;

/// What a committed transaction hands back to the cache.
#[derive(Debug)]
pub(crate) struct TransactionOutcome {
    pub snapshot: CacheSnapshot,
    pub edited_node_ids: NodeIdSet,
    pub written_queries: BTreeSet<OperationId>,
}

pub struct CacheTransaction {
    context: Arc<CacheContext>,
    snapshot: CacheSnapshot,
    parent_snapshot: CacheSnapshot,
    optimistic_change_id: Option<ChangeId>,
    edited_node_ids: NodeIdSet,
    deltas: Vec<OptimisticDelta>,
    written_queries: BTreeSet<OperationId>,
}

impl CacheTransaction {
    pub(crate) fn new(
        context: Arc<CacheContext>,
        snapshot: CacheSnapshot,
        optimistic_change_id: Option<ChangeId>,
    ) -> Self {
        Self {
            context,
            parent_snapshot: snapshot.clone(),
            snapshot,
            optimistic_change_id,
            edited_node_ids: NodeIdSet::new(),
            deltas: Vec::new(),
            written_queries: BTreeSet::new(),
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.optimistic_change_id.is_some()
    }

    /// Nodes edited so far.
    pub fn edited_node_ids(&self) -> &NodeIdSet {
        &self.edited_node_ids
    }

    /// Reads against the transaction's working state.
    pub fn read(&self, raw: &RawOperation) -> Result<Arc<QueryResult>> {
        read(&self.context, raw, self.current_graph(), false)
    }

    pub fn write(&mut self, raw: &RawOperation, payload: &Value) -> Result<()> {
        if self.is_optimistic() {
            self.write_optimistic(raw, payload)
        } else {
            self.write_baseline(raw, payload)
        }
    }

    /// Drops the optimistic update `change_id` and rebuilds the optimistic
    /// view from the baseline.
    pub fn rollback(&mut self, change_id: &str) -> Result<()> {
        let queue = self.snapshot.optimistic_queue.remove(change_id);
        let optimistic = if queue.has_updates() {
            queue.apply(&self.context, &self.snapshot.baseline)?.snapshot
        } else {
            self.snapshot.baseline.clone()
        };

        // Exact changes are not tracked across a rollback.
        self.edited_node_ids
            .extend(self.snapshot.optimistic.all_node_ids().cloned());
        debug!(change_id, pending = queue.len(), "Rolled back optimistic update");

        self.snapshot = CacheSnapshot::new(self.snapshot.baseline.clone(), optimistic, queue);
        Ok(())
    }

    /// A node as it was when the transaction started.
    pub fn get_previous_node_snapshot(&self, id: &str) -> Option<&Arc<NodeSnapshot>> {
        self.parent_snapshot
            .graph(self.is_optimistic())
            .get_node_snapshot(id)
    }

    /// A node as the transaction currently sees it.
    pub fn get_current_node_snapshot(&self, id: &str) -> Option<&Arc<NodeSnapshot>> {
        self.current_graph().get_node_snapshot(id)
    }

    /// Runs entity updaters and packages the working state for the cache.
    pub(crate) fn commit(mut self) -> Result<TransactionOutcome> {
        self.trigger_entity_updaters()?;

        let mut snapshot = self.snapshot;
        if let Some(change_id) = self.optimistic_change_id {
            snapshot.optimistic_queue = snapshot.optimistic_queue.enqueue(change_id, self.deltas);
        }

        Ok(TransactionOutcome {
            snapshot,
            edited_node_ids: self.edited_node_ids,
            written_queries: self.written_queries,
        })
    }

    fn current_graph(&self) -> &Arc<GraphSnapshot> {
        self.snapshot.graph(self.is_optimistic())
    }

    fn write_baseline(&mut self, raw: &RawOperation, payload: &Value) -> Result<()> {
        let edited = write(&self.context, &self.snapshot.baseline, raw, payload)?;
        self.forward_warnings(&edited.warnings);
        self.edited_node_ids.extend(edited.edited_node_ids);
        self.written_queries.extend(edited.written_queries);
        let baseline = edited.snapshot;

        // Pending updates may apply differently on the new baseline.
        let queue = self.snapshot.optimistic_queue.clone();
        let optimistic = if queue.has_updates() {
            let replayed = queue.apply(&self.context, &baseline)?;
            self.edited_node_ids.extend(replayed.edited_node_ids);
            replayed.snapshot
        } else {
            baseline.clone()
        };

        self.snapshot = CacheSnapshot::new(baseline, optimistic, queue);
        Ok(())
    }

    fn write_optimistic(&mut self, raw: &RawOperation, payload: &Value) -> Result<()> {
        let edited = write(&self.context, &self.snapshot.optimistic, raw, payload)?;
        self.forward_warnings(&edited.warnings);
        self.edited_node_ids.extend(edited.edited_node_ids);
        self.written_queries.extend(edited.written_queries);
        self.deltas.push(OptimisticDelta {
            operation: raw.clone(),
            payload: payload.clone(),
        });
        self.snapshot.optimistic = edited.snapshot;
        Ok(())
    }

    fn forward_warnings(&self, warnings: &[String]) {
        for warning in warnings {
            self.context.tracer().warning(warning);
        }
    }

    /// Calls the registered updater of every edited entity, with its next
    /// and previous data.
    fn trigger_entity_updaters(&mut self) -> Result<()> {
        if !self.context.has_entity_updaters() {
            return Ok(());
        }

        let mut pending: Vec<(NodeId, EntityUpdater)> = Vec::new();
        for id in &self.edited_node_ids {
            let Some(node) = self
                .get_current_node_snapshot(id)
                .or_else(|| self.get_previous_node_snapshot(id))
            else {
                continue;
            };
            if !node.is_entity() {
                continue;
            }
            let typename = match node.data().and_then(|data| data.get("__typename")) {
                Some(Value::String(typename)) => typename.as_str(),
                _ if id == StaticNodeId::QUERY_ROOT => QUERY_TYPENAME,
                _ => continue,
            };
            if let Some(updater) = self.context.entity_updater(typename) {
                pending.push((id.clone(), updater.clone()));
            }
        }

        for (id, updater) in pending {
            let next = self
                .get_current_node_snapshot(&id)
                .and_then(|node| node.data())
                .cloned();
            let previous = self
                .get_previous_node_snapshot(&id)
                .and_then(|node| node.data())
                .cloned();
            trace!(node = %id, "Running entity updater");
            updater(self, next.as_ref(), previous.as_ref())?;
        }
        Ok(())
    }
}
