//! Integration tests for extracting, restoring and migrating cache contents.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package graphcache-core --test persistence
//! ```

mod common;

use std::sync::Arc;

use common::{payload, query, read_complete, verified_cache};
use graphcache_core::{CacheError, Document, MigrationMap, RawOperation, SerializedGraph, Value};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

const PROFILE: &str = "{ viewer { __typename id name friends { __typename id name } } }";

fn populated_cache() -> graphcache_core::Cache {
    let mut cache = verified_cache();
    cache
        .write(
            &query(PROFILE),
            &payload(json!({
                "viewer": {
                    "__typename": "User",
                    "id": 1,
                    "name": "Gouda",
                    "friends": [
                        {"__typename": "User", "id": 2, "name": "Brie"},
                        {"__typename": "User", "id": 3, "name": "Feta"}
                    ]
                }
            })),
        )
        .unwrap();
    cache
        .write(
            &query("{ search(text: \"cheese\") { __typename id name } }"),
            &payload(json!({"search": [{"__typename": "User", "id": 2, "name": "Brie"}]})),
        )
        .unwrap();
    cache
}

// ============================================================================
// Extract and restore
// ============================================================================

#[test]
fn test_json_round_trip_preserves_reads() {
    let source = populated_cache();
    let text = serde_json::to_string(&source.extract(false, None).unwrap()).unwrap();

    let serialized: SerializedGraph = serde_json::from_str(&text).unwrap();
    let mut restored = verified_cache();
    restored.restore(&serialized, None, None).unwrap();

    for query_text in [PROFILE, "{ search(text: \"cheese\") { id name } }"] {
        assert_eq!(
            read_complete(&restored, query_text, false),
            read_complete(&source, query_text, false)
        );
    }
    assert_eq!(restored.get_entity("2"), source.get_entity("2"));
    restored.snapshot().baseline.verify_references().unwrap();
}

#[test]
fn test_extracted_entities_are_not_embedded() {
    let cache = populated_cache();
    let serialized = cache.extract(false, None).unwrap();

    // The viewer slot is restored from the reference.
    assert_eq!(serialized["ROOT_QUERY"].data.as_ref().unwrap().to_json(), json!({}));
    assert_eq!(
        serialized["1"].data.as_ref().unwrap().to_json(),
        json!({"__typename": "User", "id": 1, "name": "Gouda", "friends": [null, null]})
    );
}

#[test]
fn test_restore_through_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cache.json");

    let source = populated_cache();
    let text = serde_json::to_string_pretty(&source.extract(false, None).unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();

    let serialized: SerializedGraph =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let mut restored = verified_cache();
    restored.restore(&serialized, None, None).unwrap();

    assert_eq!(
        read_complete(&restored, PROFILE, false),
        read_complete(&source, PROFILE, false)
    );
}

#[test]
fn test_failed_verification_leaves_cache_untouched() {
    let serialized = populated_cache().extract(false, None).unwrap();

    let mut cache = verified_cache();
    cache
        .write(&query("{ motd }"), &payload(json!({"motd": "hello"})))
        .unwrap();
    let before = cache.snapshot().baseline.clone();

    let err = cache
        .restore(&serialized, None, Some(&query("{ viewer { id email } }")))
        .unwrap_err();

    assert!(matches!(err, CacheError::UnsatisfiedCache { .. }));
    assert!(Arc::ptr_eq(&before, &cache.snapshot().baseline));
    assert_eq!(read_complete(&cache, "{ motd }", false), json!({"motd": "hello"}));
}

#[test]
fn test_restore_notifies_observers() {
    let serialized = populated_cache().extract(false, None).unwrap();

    let mut cache = verified_cache();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let _subscription = cache
        .watch(query("{ viewer { id name } }"), move |result| {
            seen.lock().push(result.complete);
        })
        .unwrap();

    cache
        .restore(&serialized, None, Some(&query("{ viewer { id name } }")))
        .unwrap();

    // Empty before the restore, complete after it.
    assert_eq!(*calls.lock(), vec![false, true]);
}

// ============================================================================
// Pruning
// ============================================================================

#[test]
fn test_extract_with_prune_keeps_only_selected_nodes() {
    let cache = populated_cache();
    let serialized = cache
        .extract(false, Some(&query("{ viewer { id name } }")))
        .unwrap();

    let mut ids: Vec<&str> = serialized.keys().map(String::as_str).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["1", "ROOT_QUERY"]);

    let mut restored = verified_cache();
    restored.restore(&serialized, None, None).unwrap();
    assert_eq!(
        read_complete(&restored, "{ viewer { id name } }", false),
        json!({"viewer": {"id": 1, "name": "Gouda"}})
    );
    assert!(!restored.read(&query(PROFILE), false).unwrap().complete);
}

// ============================================================================
// Migration
// ============================================================================

#[test]
fn test_restore_with_entity_migration() {
    let serialized = populated_cache().extract(false, None).unwrap();

    let migrations = MigrationMap::new().entity_field("User", "name", |name| {
        Value::from(
            name.and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase(),
        )
    });
    let mut cache = verified_cache();
    cache.restore(&serialized, Some(&migrations), None).unwrap();

    let data = read_complete(&cache, PROFILE, false);
    assert_eq!(data["viewer"]["name"], json!("gouda"));
    assert_eq!(data["viewer"]["friends"][0]["name"], json!("brie"));
    assert_eq!(
        cache.get_entity("3"),
        Some(&payload(json!({"__typename": "User", "id": 3, "name": "feta"})))
    );
    cache.snapshot().baseline.verify_references().unwrap();
}

// ============================================================================
// Long reference chains
// ============================================================================

const CHAIN_LENGTH: usize = 500;

/// `ROOT_QUERY.head` -> 0 -> 1 -> ... through each node's `next` field.
fn chain_graph() -> SerializedGraph {
    let mut nodes = serde_json::Map::new();
    nodes.insert(
        "ROOT_QUERY".to_string(),
        json!({
            "type": 0,
            "data": {"head": null},
            "outbound": [{"id": "0", "path": ["head"]}]
        }),
    );
    for index in 0..CHAIN_LENGTH {
        let inbound = match index {
            0 => json!([{"id": "ROOT_QUERY", "path": ["head"]}]),
            _ => json!([{"id": (index - 1).to_string(), "path": ["next"]}]),
        };
        let mut node = json!({
            "type": 0,
            "data": {"id": index, "name": format!("node {}", index), "next": null},
            "inbound": inbound
        });
        if index + 1 < CHAIN_LENGTH {
            node["outbound"] = json!([{"id": (index + 1).to_string(), "path": ["next"]}]);
        }
        nodes.insert(index.to_string(), node);
    }
    serde_json::from_value(serde_json::Value::Object(nodes)).unwrap()
}

/// Name of the last entity embedded in the root's copy of the chain.
fn embedded_tail_name(cache: &graphcache_core::Cache) -> Option<Value> {
    let mut current = cache.snapshot().baseline.get_node_data("ROOT_QUERY")?.get("head")?;
    for _ in 1..CHAIN_LENGTH {
        current = current.get("next")?;
    }
    current.get("name").cloned()
}

#[test]
fn test_long_reference_chain_round_trip() {
    let mut cache = verified_cache();
    cache.restore(&chain_graph(), None, None).unwrap();

    assert_eq!(cache.snapshot().baseline.len(), CHAIN_LENGTH + 1);
    assert_eq!(
        embedded_tail_name(&cache),
        Some(Value::from(format!("node {}", CHAIN_LENGTH - 1)))
    );

    let document = Arc::new(
        Document::parse("fragment Name on Node { id name } query { head { ...Name } }").unwrap(),
    );
    let tail = RawOperation::fragment(document, "Name", (CHAIN_LENGTH - 1).to_string());
    cache
        .write(
            &tail,
            &payload(json!({"id": CHAIN_LENGTH - 1, "name": "renamed"})),
        )
        .unwrap();

    assert_eq!(embedded_tail_name(&cache), Some(Value::from("renamed")));
}
