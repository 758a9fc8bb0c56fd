//! Structured hooks around cache operations.
//!
//! Every method has a no-op default, so a tracer only implements the events
//! it cares about. [`LoggingTracer`] is installed when no tracer is
//! configured and forwards to `tracing`.

use tracing::{debug, info, warn};

use crate::context::OperationInstance;
use crate::error::CacheError;
use crate::operations::read::QueryResult;
use crate::schema::NodeIdSet;
use crate::value::Value;

/// Details of a finished read.
#[derive(Debug, Clone, Copy)]
pub struct ReadEnd<'a> {
    pub result: &'a QueryResult,
    /// The result came from the snapshot's read cache.
    pub cache_hit: bool,
}

/// Details of a finished write.
#[derive(Debug, Clone, Copy)]
pub struct WriteEnd<'a> {
    pub payload: &'a Value,
    pub edited_node_ids: &'a NodeIdSet,
    pub warnings: &'a [String],
}

pub trait Tracer: Send + Sync {
    /// A non-fatal problem, such as a malformed payload value.
    fn warning(&self, _message: &str) {}

    fn read_start(&self, _operation: &OperationInstance) {}

    fn read_end(&self, _operation: &OperationInstance, _info: ReadEnd<'_>) {}

    fn write_start(&self, _operation: &OperationInstance, _payload: &Value) {}

    fn write_end(&self, _operation: &OperationInstance, _info: WriteEnd<'_>) {}

    fn transaction_start(&self) {}

    /// `error` is set when the transaction was rolled back.
    fn transaction_end(&self, _error: Option<&CacheError>) {}

    fn broadcast_start(&self, _edited_node_ids: &NodeIdSet) {}

    fn broadcast_end(&self, _edited_node_ids: &NodeIdSet) {}
}

/// Logs warnings always, and reads/writes when verbose.
#[derive(Debug, Clone, Default)]
pub struct LoggingTracer {
    verbose: bool,
}

impl LoggingTracer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Tracer for LoggingTracer {
    fn warning(&self, message: &str) {
        warn!("{}", message);
    }

    fn read_end(&self, operation: &OperationInstance, info: ReadEnd<'_>) {
        if !self.verbose {
            return;
        }
        if info.cache_hit {
            debug!(
                operation = %operation.describe(),
                complete = info.result.complete,
                "read (cached)"
            );
        } else {
            info!(
                operation = %operation.describe(),
                complete = info.result.complete,
                "read"
            );
        }
    }

    fn write_end(&self, operation: &OperationInstance, info: WriteEnd<'_>) {
        if !self.verbose {
            return;
        }
        if info.warnings.is_empty() {
            debug!(
                operation = %operation.describe(),
                edited = info.edited_node_ids.len(),
                "write"
            );
            return;
        }
        warn!(
            operation = %operation.describe(),
            payload = %info.payload.to_json(),
            "write produced {} warning(s)",
            info.warnings.len()
        );
    }

    fn transaction_end(&self, error: Option<&CacheError>) {
        if let Some(error) = error {
            warn!(error = %error, "Rolling transaction back due to error");
        }
    }
}
