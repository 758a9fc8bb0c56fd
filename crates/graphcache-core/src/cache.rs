//! The cache facade.
//!
//! [`Cache`] owns the current [`CacheSnapshot`] and is the only thing that
//! ever replaces it. Every change goes through a transaction; on commit the
//! new snapshot is published in one step, still-valid cached reads are
//! carried over, and observers are notified in registration order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::cache_snapshot::CacheSnapshot;
use crate::context::{CacheConfig, CacheContext, RawOperation};
use crate::error::{CacheError, Result};
use crate::graph::{CachedRead, GraphSnapshot};
use crate::operations::extract::{extract, SerializedGraph};
use crate::operations::migrate::{migrate, MigrationMap};
use crate::operations::observer::QueryObserver;
use crate::operations::prune::prune;
use crate::operations::read::{read, QueryResult};
use crate::operations::restore::restore;
use crate::schema::NodeIdSet;
use crate::transaction::CacheTransaction;
use crate::value::Value;

/// Handle returned by [`Cache::watch`].
#[derive(Debug, Clone)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Stops notifications. The observer is dropped at the next broadcast.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

struct ObserverEntry {
    active: Arc<AtomicBool>,
    observer: QueryObserver,
}

pub struct Cache {
    context: Arc<CacheContext>,
    snapshot: CacheSnapshot,
    observers: Vec<ObserverEntry>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            context: Arc::new(CacheContext::new(config)),
            snapshot: CacheSnapshot::default(),
            observers: Vec::new(),
        }
    }

    pub fn context(&self) -> &Arc<CacheContext> {
        &self.context
    }

    /// The current public state.
    pub fn snapshot(&self) -> &CacheSnapshot {
        &self.snapshot
    }

    pub fn read(&self, raw: &RawOperation, optimistic: bool) -> Result<Arc<QueryResult>> {
        read(&self.context, raw, self.snapshot.graph(optimistic), false)
    }

    /// Optimistic data of node `id`.
    pub fn get_entity(&self, id: &str) -> Option<&Value> {
        self.snapshot.optimistic.get_node_data(id)
    }

    /// Writes `payload` to the baseline.
    pub fn write(&mut self, raw: &RawOperation, payload: &Value) -> Result<()> {
        self.run_transaction(None, |transaction| transaction.write(raw, payload))
    }

    /// Runs `update` in a transaction, optimistic when `change_id` is given.
    ///
    /// Returns false, leaving the cache untouched, if `update` or the
    /// commit fails.
    pub fn transaction<F>(&mut self, change_id: Option<&str>, update: F) -> bool
    where
        F: FnOnce(&mut CacheTransaction) -> Result<()>,
    {
        self.run_transaction(change_id, update).is_ok()
    }

    /// Like [`Cache::transaction`], but hands back the error.
    pub fn try_transaction<F>(&mut self, change_id: Option<&str>, update: F) -> Result<()>
    where
        F: FnOnce(&mut CacheTransaction) -> Result<()>,
    {
        self.run_transaction(change_id, update)
    }

    /// Drops the optimistic update `change_id`.
    pub fn rollback(&mut self, change_id: &str) -> Result<()> {
        self.run_transaction(None, |transaction| transaction.rollback(change_id))
    }

    /// Calls `callback` with the current result of `raw`, then with each new
    /// result after the graph changes under it.
    pub fn watch(
        &mut self,
        raw: RawOperation,
        callback: impl Fn(&QueryResult) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let observer =
            QueryObserver::new(self.context.clone(), &self.snapshot, raw, Arc::new(callback))?;
        let active = Arc::new(AtomicBool::new(true));
        self.observers.push(ObserverEntry {
            active: active.clone(),
            observer,
        });
        Ok(Subscription { active })
    }

    /// Empties the cache. Every previously known node counts as edited.
    pub fn reset(&mut self) {
        let edited: NodeIdSet = self.snapshot.optimistic.all_node_ids().cloned().collect();
        self.set_snapshot(CacheSnapshot::default(), &edited);
    }

    /// Serializes the baseline or optimistic graph, optionally pruned to
    /// what `prune_query` selects.
    pub fn extract(
        &self,
        optimistic: bool,
        prune_query: Option<&RawOperation>,
    ) -> Result<SerializedGraph> {
        let graph = self.snapshot.graph(optimistic);
        match prune_query {
            Some(query) => extract(&prune(&self.context, graph, query)?.snapshot),
            None => extract(graph),
        }
    }

    /// Replaces the cache contents with `serialized`, migrated by
    /// `migrations`. Fails without touching the cache if `verify_query`
    /// cannot be read completely afterwards.
    pub fn restore(
        &mut self,
        serialized: &SerializedGraph,
        migrations: Option<&MigrationMap>,
        verify_query: Option<&RawOperation>,
    ) -> Result<()> {
        let restored = restore(serialized, &self.context)?;
        let snapshot = match migrations {
            Some(migrations) => migrate(&self.context, &restored.snapshot, migrations)?,
            None => restored.snapshot,
        };

        if let Some(query) = verify_query {
            if !read(&self.context, query, &snapshot.baseline, false)?.complete {
                return Err(CacheError::unsatisfied(
                    "Restored cache cannot satisfy the verification query",
                ));
            }
        }

        debug!(nodes = snapshot.baseline.len(), "Restored cache");
        self.set_snapshot(snapshot, &restored.edited_node_ids);
        Ok(())
    }

    fn run_transaction<F>(&mut self, change_id: Option<&str>, update: F) -> Result<()>
    where
        F: FnOnce(&mut CacheTransaction) -> Result<()>,
    {
        self.context.tracer().transaction_start();

        let mut transaction = CacheTransaction::new(
            self.context.clone(),
            self.snapshot.clone(),
            change_id.map(str::to_string),
        );
        let outcome = update(&mut transaction).and_then(|()| transaction.commit());

        match outcome {
            Ok(outcome) => {
                debug!(
                    change_id,
                    edited = outcome.edited_node_ids.len(),
                    operations = outcome.written_queries.len(),
                    "Committed transaction"
                );
                self.set_snapshot(outcome.snapshot, &outcome.edited_node_ids);
                self.context.tracer().transaction_end(None);
                Ok(())
            }
            Err(error) => {
                self.context.tracer().transaction_end(Some(&error));
                Err(error)
            }
        }
    }

    /// Publishes `snapshot` and broadcasts the edit.
    fn set_snapshot(&mut self, snapshot: CacheSnapshot, edited_node_ids: &NodeIdSet) {
        let previous = std::mem::replace(&mut self.snapshot, snapshot);

        self.copy_unaffected_reads(&previous.baseline, &self.snapshot.baseline, edited_node_ids);
        if self.snapshot.has_distinct_optimistic() {
            self.copy_unaffected_reads(
                &previous.optimistic,
                &self.snapshot.optimistic,
                edited_node_ids,
            );
        }

        self.broadcast(edited_node_ids);
    }

    fn copy_unaffected_reads(
        &self,
        from: &Arc<GraphSnapshot>,
        to: &Arc<GraphSnapshot>,
        edited_node_ids: &NodeIdSet,
    ) {
        if Arc::ptr_eq(from, to) {
            return;
        }
        let strict = self.context.strict();

        for (operation, entry) in from.cached_reads() {
            match entry {
                CachedRead::Complete if !strict => to.store_read(operation, CachedRead::Complete),
                CachedRead::Complete => {}
                CachedRead::Result(result) => {
                    if !result.complete {
                        continue;
                    }
                    if !strict {
                        to.store_read(operation, CachedRead::Complete);
                        continue;
                    }
                    if result.entity_ids.is_none() || result.depends_on(edited_node_ids) {
                        continue;
                    }
                    to.store_read(operation, CachedRead::Result(result));
                }
            }
        }
    }

    fn broadcast(&mut self, edited_node_ids: &NodeIdSet) {
        let tracer = self.context.tracer();
        tracer.broadcast_start(edited_node_ids);

        self.observers
            .retain(|entry| entry.active.load(Ordering::Acquire));
        for entry in &mut self.observers {
            // Unsubscribed by an earlier callback in this broadcast.
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            entry.observer.consume_changes(&self.snapshot, edited_node_ids);
        }

        if let Some(on_change) = &self.context.config().on_change {
            on_change(&self.snapshot, edited_node_ids);
        }
        tracer.broadcast_end(edited_node_ids);
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
