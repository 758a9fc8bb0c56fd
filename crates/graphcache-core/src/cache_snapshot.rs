//! The cache's public state at one point in time.

use std::sync::Arc;

use crate::graph::GraphSnapshot;
use crate::optimistic::OptimisticUpdateQueue;

/// Baseline and optimistic graphs, plus the queue that derives one from the
/// other. When no updates are pending both graphs are the same allocation.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub baseline: Arc<GraphSnapshot>,
    pub optimistic: Arc<GraphSnapshot>,
    pub optimistic_queue: OptimisticUpdateQueue,
}

impl CacheSnapshot {
    pub fn new(
        baseline: Arc<GraphSnapshot>,
        optimistic: Arc<GraphSnapshot>,
        optimistic_queue: OptimisticUpdateQueue,
    ) -> Self {
        Self {
            baseline,
            optimistic,
            optimistic_queue,
        }
    }

    /// A snapshot whose optimistic view is its baseline.
    pub fn from_baseline(baseline: Arc<GraphSnapshot>) -> Self {
        Self {
            optimistic: baseline.clone(),
            baseline,
            optimistic_queue: OptimisticUpdateQueue::new(),
        }
    }

    pub fn graph(&self, optimistic: bool) -> &Arc<GraphSnapshot> {
        if optimistic {
            &self.optimistic
        } else {
            &self.baseline
        }
    }

    /// Whether the optimistic view is a separate graph.
    pub fn has_distinct_optimistic(&self) -> bool {
        !Arc::ptr_eq(&self.baseline, &self.optimistic)
    }
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self::from_baseline(Arc::new(GraphSnapshot::new()))
    }
}
