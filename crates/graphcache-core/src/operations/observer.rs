//! Query observers: re-read an operation when the graph changes under it.

use std::sync::Arc;

use tracing::warn;

use crate::cache_snapshot::CacheSnapshot;
use crate::context::{CacheContext, RawOperation};
use crate::error::Result;
use crate::operations::read::{read, QueryResult};
use crate::schema::NodeIdSet;

/// Receives every new result of an observed operation.
pub type ObserverCallback = Arc<dyn Fn(&QueryResult) + Send + Sync>;

pub struct QueryObserver {
    context: Arc<CacheContext>,
    operation: RawOperation,
    callback: ObserverCallback,
    result: Arc<QueryResult>,
}

impl QueryObserver {
    /// Reads `operation` from the optimistic view and hands the result to
    /// `callback` straight away.
    pub fn new(
        context: Arc<CacheContext>,
        snapshot: &CacheSnapshot,
        operation: RawOperation,
        callback: ObserverCallback,
    ) -> Result<Self> {
        let result = read(&context, &operation, &snapshot.optimistic, context.strict())?;
        callback(result.as_ref());
        Ok(Self {
            context,
            operation,
            callback,
            result,
        })
    }

    /// The last result read.
    pub fn result(&self) -> &Arc<QueryResult> {
        &self.result
    }

    /// Re-reads and notifies if `edited_node_ids` may affect the result.
    pub fn consume_changes(&mut self, snapshot: &CacheSnapshot, edited_node_ids: &NodeIdSet) {
        if !self.has_changes(edited_node_ids) {
            return;
        }

        match read(
            &self.context,
            &self.operation,
            &snapshot.optimistic,
            self.context.strict(),
        ) {
            Ok(result) => {
                self.result = result;
                (self.callback)(&self.result);
            }
            Err(error) => warn!(error = %error, "Observer failed to re-read its operation"),
        }
    }

    fn has_changes(&self, edited_node_ids: &NodeIdSet) -> bool {
        !self.result.complete || self.result.depends_on(edited_node_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CacheConfig;
    use crate::operations::write::write;
    use crate::value::Value;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_observer_only_rereads_on_relevant_edits() {
        let context = Arc::new(CacheContext::new(CacheConfig::default()));
        let write_op = RawOperation::parse("{ viewer { id name } other { id } }").unwrap();
        let edited = write(
            &context,
            &crate::graph::GraphSnapshot::new(),
            &write_op,
            &Value::from(json!({"viewer": {"id": 1, "name": "Gouda"}, "other": {"id": 2}})),
        )
        .unwrap();
        let snapshot = CacheSnapshot::from_baseline(edited.snapshot);

        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut observer = QueryObserver::new(
            context.clone(),
            &snapshot,
            RawOperation::parse("{ viewer { id name } }").unwrap(),
            Arc::new(move |_: &QueryResult| *counter.lock() += 1),
        )
        .unwrap();
        assert!(observer.result().complete);
        assert_eq!(*calls.lock(), 1);

        observer.consume_changes(&snapshot, &["2".to_string()].into_iter().collect());
        assert_eq!(*calls.lock(), 1);

        observer.consume_changes(&snapshot, &["1".to_string()].into_iter().collect());
        assert_eq!(*calls.lock(), 2);
    }
}
