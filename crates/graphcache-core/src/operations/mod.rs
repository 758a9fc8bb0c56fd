//! Operations over graph snapshots.
//!
//! - `editor`: copy-on-write merging of payloads into a snapshot.
//! - `read` / `write`: the two primitive operations.
//! - `observer`: re-reading operations as the graph changes.
//! - `extract` / `restore` / `migrate` / `prune`: persistence.

pub mod editor;
pub mod extract;
pub mod migrate;
pub mod observer;
pub mod prune;
pub mod read;
pub mod restore;
pub mod write;

pub use editor::{EditedSnapshot, ReferenceEdit, SnapshotEditor};
pub use extract::{extract, SerializedGraph, SerializedNode};
pub use migrate::{migrate, CopyFrom, FieldMigration, MigrationMap, ParameterizedMigration};
pub use observer::{ObserverCallback, QueryObserver};
pub use prune::{prune, PrunedSnapshot};
pub use read::{read, QueryResult};
pub use restore::{restore, RestoredSnapshot};
pub use write::write;
