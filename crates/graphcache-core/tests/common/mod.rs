//! Common test utilities for integration tests.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;

use graphcache_core::{
    Cache, CacheConfig, CacheError, NodeIdSet, OperationInstance, RawOperation, Tracer, Value,
};
use parking_lot::Mutex;

/// Parses a query, panicking on invalid input.
pub fn query(source: &str) -> RawOperation {
    RawOperation::parse(source).expect("query should parse")
}

pub fn payload(json: serde_json::Value) -> Value {
    Value::from(json)
}

pub fn ids(ids: &[&str]) -> NodeIdSet {
    ids.iter().map(|id| id.to_string()).collect()
}

/// A cache that checks reference symmetry on every commit.
pub fn verified_cache() -> Cache {
    Cache::new(CacheConfig::new().verify_snapshots(true))
}

/// Data read for `source`, panicking when incomplete.
pub fn read_complete(cache: &Cache, source: &str, optimistic: bool) -> serde_json::Value {
    let result = cache
        .read(&query(source), optimistic)
        .expect("read should succeed");
    assert!(result.complete, "expected a complete read of {}", source);
    result
        .result
        .as_ref()
        .map(Value::to_json)
        .unwrap_or(serde_json::Value::Null)
}

/// Records tracer events as short strings.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingTracer {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl Tracer for RecordingTracer {
    fn warning(&self, message: &str) {
        self.events.lock().push(format!("warning: {}", message));
    }

    fn transaction_start(&self) {
        self.events.lock().push("transaction_start".to_string());
    }

    fn transaction_end(&self, error: Option<&CacheError>) {
        let event = match error {
            Some(error) => format!("transaction_end: {}", error),
            None => "transaction_end".to_string(),
        };
        self.events.lock().push(event);
    }

    fn broadcast_start(&self, edited_node_ids: &NodeIdSet) {
        self.events
            .lock()
            .push(format!("broadcast_start: {}", edited_node_ids.len()));
    }
}
