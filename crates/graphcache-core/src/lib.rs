//! GraphCache Core - Normalized object-graph cache with copy-on-write snapshots
//!
//! This crate provides the cache engine:
//! - Normalization of query payloads into entity and parameterized-value nodes
//! - Immutable graph snapshots with structural sharing between versions
//! - Reads with completeness tracking and per-snapshot result caching
//! - Transactions with an optimistic update layer that can be rolled back
//! - Observers that re-read only when an edit touches their dependencies
//! - Extract, restore, migrate and prune for persisted snapshots

// Implemented modules
pub mod cache;
pub mod cache_snapshot;
pub mod context;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod operations;
pub mod optimistic;
pub mod query;
pub mod schema;
pub mod tracer;
pub mod transaction;
pub mod util;
pub mod value;

// Re-exports for convenience
pub use cache::{Cache, Subscription};
pub use cache_snapshot::CacheSnapshot;
pub use context::{
    CacheConfig, CacheContext, ChangeCallback, EntityIdFn, EntityTransformer, EntityUpdater,
    OperationId, OperationInstance, RawOperation, ResolverRedirect, Variables,
};
pub use error::{CacheError, QueryError, Result};
pub use graph::GraphSnapshot;
pub use nodes::{node_id_for_parameterized_value, Direction, NodeKind, NodeSnapshot};
pub use schema::{NodeId, NodeIdSet, NodeReference, OperationType, Path, PathSegment, StaticNodeId};
pub use transaction::CacheTransaction;
pub use value::{ObjectMap, Value};

// Query re-exports
pub use query::{Document, ParsedQuery, ParsedQueryNode, QueryInfo};

// Operation re-exports
pub use operations::{
    extract, migrate, prune, read, restore, write, CopyFrom, EditedSnapshot, FieldMigration,
    MigrationMap, ParameterizedMigration, PrunedSnapshot, QueryObserver, QueryResult,
    RestoredSnapshot, SerializedGraph, SerializedNode, SnapshotEditor,
};

// Optimistic update re-exports
pub use optimistic::{ChangeId, OptimisticDelta, OptimisticUpdateQueue};

// Tracer re-exports
pub use tracer::{LoggingTracer, ReadEnd, Tracer, WriteEnd};
