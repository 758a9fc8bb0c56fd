//! Schema evolution for restored snapshots.
//!
//! A [`MigrationMap`] rewrites entity fields by typename and adds
//! parameterized values that older snapshots lack, so queries written
//! against the new schema can still be satisfied.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::cache_snapshot::CacheSnapshot;
use crate::context::CacheContext;
use crate::error::Result;
use crate::nodes::{node_id_for_parameterized_value, NodeSnapshot};
use crate::operations::editor::SnapshotEditor;
use crate::schema::{NodeId, Path, PathSegment, StaticNodeId, QUERY_TYPENAME};
use crate::value::Value;

/// Maps the current value of a field (if any) to its migrated value.
pub type FieldMigration = Arc<dyn Fn(Option<&Value>) -> Value + Send + Sync>;

/// Where to copy a new parameterized value's data from.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyFrom {
    pub path: Path,
    pub args: JsonValue,
}

/// A parameterized field to add to every entity of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedMigration {
    pub path: Path,
    pub args: JsonValue,
    /// Data of the new node, unless copied.
    pub default_return: Value,
    pub copy_from: Option<CopyFrom>,
}

#[derive(Clone, Default)]
pub struct MigrationMap {
    pub entities: HashMap<String, HashMap<String, FieldMigration>>,
    pub parameterized: HashMap<String, Vec<ParameterizedMigration>>,
}

impl MigrationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites `field` of every entity of `typename`.
    pub fn entity_field(
        mut self,
        typename: impl Into<String>,
        field: impl Into<String>,
        migration: impl Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.entities
            .entry(typename.into())
            .or_default()
            .insert(field.into(), Arc::new(migration));
        self
    }

    /// Adds a parameterized value to every entity of `typename`.
    pub fn parameterized(
        mut self,
        typename: impl Into<String>,
        migration: ParameterizedMigration,
    ) -> Self {
        self.parameterized
            .entry(typename.into())
            .or_default()
            .push(migration);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.parameterized.is_empty()
    }
}

impl fmt::Debug for MigrationMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entities: HashMap<&String, Vec<&String>> = self
            .entities
            .iter()
            .map(|(typename, fields)| (typename, fields.keys().collect()))
            .collect();
        f.debug_struct("MigrationMap")
            .field("entities", &entities)
            .field("parameterized", &self.parameterized)
            .finish()
    }
}

/// Applies `migrations` to the baseline of `snapshot`.
///
/// The result has no pending optimistic updates: its optimistic view is
/// the migrated baseline.
pub fn migrate(
    context: &CacheContext,
    snapshot: &CacheSnapshot,
    migrations: &MigrationMap,
) -> Result<CacheSnapshot> {
    let baseline = snapshot.baseline.clone();
    let mut editor = SnapshotEditor::new(context, &baseline);

    let mut ids: Vec<&NodeId> = baseline.all_node_ids().collect();
    ids.sort();

    for id in ids {
        let Some(node) = baseline.get_node_snapshot(id) else {
            continue;
        };
        if !node.is_entity() {
            continue;
        }
        let Some(data) = node.data().filter(|data| data.is_object()) else {
            continue;
        };
        let typename = match data.get("__typename").and_then(Value::as_str) {
            Some(typename) => typename,
            None if id == StaticNodeId::QUERY_ROOT => QUERY_TYPENAME,
            None => continue,
        };

        if let Some(fields) = migrations.entities.get(typename) {
            for (field, migration) in fields {
                let current = data.get(field);
                let next = migration(current);
                if current != Some(&next) {
                    editor.set_node_value(id, &[PathSegment::from(field.as_str())], next);
                }
            }
        }

        for migration in migrations.parameterized.get(typename).into_iter().flatten() {
            add_parameterized_value(&mut editor, id, migration);
        }
    }

    let edited = editor.commit()?;
    debug!(edited = edited.edited_node_ids.len(), "Migrated graph snapshot");
    Ok(CacheSnapshot::from_baseline(edited.snapshot))
}

fn add_parameterized_value(
    editor: &mut SnapshotEditor<'_>,
    container_id: &str,
    migration: &ParameterizedMigration,
) {
    let field_id = node_id_for_parameterized_value(container_id, &migration.path, &migration.args);
    if links_to(editor, container_id, &field_id) {
        return;
    }

    let mut data = Some(migration.default_return.clone());
    if let Some(copy_from) = &migration.copy_from {
        let source_id =
            node_id_for_parameterized_value(container_id, &copy_from.path, &copy_from.args);
        if links_to(editor, container_id, &source_id) {
            if let Some(source) = editor.get_node_snapshot(&source_id) {
                data = source.data.clone();
            }
        } else {
            editor.insert_node(
                &source_id,
                NodeSnapshot::parameterized(Some(migration.default_return.clone())),
            );
            editor.link(container_id, &source_id, &copy_from.path);
        }
    }

    editor.insert_node(&field_id, NodeSnapshot::parameterized(data));
    editor.link(container_id, &field_id, &migration.path);
}

fn links_to(editor: &SnapshotEditor<'_>, container_id: &str, field_id: &str) -> bool {
    editor
        .get_node_snapshot(container_id)
        .is_some_and(|container| container.outbound.contains_key(field_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CacheConfig, RawOperation};
    use crate::graph::GraphSnapshot;
    use crate::operations::read::read;
    use crate::operations::write::write;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(context: &CacheContext, query: &str, payload: serde_json::Value) -> CacheSnapshot {
        let raw = RawOperation::parse(query).unwrap();
        let edited = write(context, &GraphSnapshot::new(), &raw, &Value::from(payload)).unwrap();
        CacheSnapshot::from_baseline(edited.snapshot)
    }

    #[test]
    fn test_entity_field_migration_updates_embedded_copies() {
        let context = CacheContext::new(CacheConfig::default());
        let source = snapshot(
            &context,
            "{ viewer { __typename id name } }",
            json!({"viewer": {"__typename": "User", "id": 1, "name": "gouda"}}),
        );

        let migrations = MigrationMap::new().entity_field("User", "name", |name| {
            Value::from(name.and_then(Value::as_str).unwrap_or_default().to_uppercase())
        });
        let migrated = migrate(&context, &source, &migrations).unwrap();

        assert_eq!(
            migrated.baseline.get_node_data("ROOT_QUERY"),
            Some(&Value::from(json!({"viewer": {"__typename": "User", "id": 1, "name": "GOUDA"}})))
        );
        assert!(Arc::ptr_eq(&migrated.baseline, &migrated.optimistic));
    }

    #[test]
    fn test_parameterized_migration_makes_query_satisfiable() {
        let context = CacheContext::new(CacheConfig::default());
        let source = snapshot(
            &context,
            "{ version items(first: 10) { id } }",
            json!({"version": 1, "items": [{"id": 1}]}),
        );

        let query = RawOperation::parse("{ items(first: 10) { id } count(kind: \"all\") }").unwrap();
        assert!(!read(&context, &query, &source.baseline, false).unwrap().complete);

        let migrations = MigrationMap::new().parameterized(
            "Query",
            ParameterizedMigration {
                path: vec!["count".into()],
                args: json!({"kind": "all"}),
                default_return: Value::from(json!(0)),
                copy_from: None,
            },
        );
        let migrated = migrate(&context, &source, &migrations).unwrap();

        let result = read(&context, &query, &migrated.baseline, false).unwrap();
        assert!(result.complete);
        assert_eq!(
            result.result.as_ref().and_then(|data| data.get("count")),
            Some(&Value::from(json!(0)))
        );
        migrated.baseline.verify_references().unwrap();
    }

    #[test]
    fn test_parameterized_migration_copies_existing_value() {
        let context = CacheContext::new(CacheConfig::default());
        let source = snapshot(
            &context,
            "{ version greeting(lang: \"en\") }",
            json!({"version": 1, "greeting": "hello"}),
        );

        let migrations = MigrationMap::new().parameterized(
            "Query",
            ParameterizedMigration {
                path: vec!["greeting".into()],
                args: json!({"lang": "en", "formal": false}),
                default_return: Value::Null,
                copy_from: Some(CopyFrom {
                    path: vec!["greeting".into()],
                    args: json!({"lang": "en"}),
                }),
            },
        );
        let migrated = migrate(&context, &source, &migrations).unwrap();

        let query =
            RawOperation::parse("{ greeting(lang: \"en\", formal: false) }").unwrap();
        let result = read(&context, &query, &migrated.baseline, false).unwrap();
        assert!(result.complete);
        assert_eq!(
            result.result.as_ref().and_then(|data| data.get("greeting")),
            Some(&Value::from("hello"))
        );
    }
}
