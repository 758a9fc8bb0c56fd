//! Integration tests for the graphcache CLI
//!
//! These tests run full workflows against snapshot files in a temporary
//! directory, with HOME pointed there so no user config is picked up.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VIEWER_QUERY: &str = "{ viewer { id name friends { id name } } }";
const VIEWER_PAYLOAD: &str = r#"{
    "viewer": {
        "id": 1,
        "name": "Gouda",
        "friends": [{"id": 2, "name": "Brie"}]
    }
}"#;

/// A graphcache command isolated in `dir`.
#[allow(deprecated)]
fn graphcache(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("graphcache").expect("Failed to find graphcache binary");
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("GRAPHCACHE_CONFIG");
    cmd
}

fn write_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("Failed to write fixture");
}

/// A temp dir holding `cache.json` with the viewer payload written.
fn setup_snapshot() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_file(temp.path(), "viewer.graphql", VIEWER_QUERY);
    write_file(temp.path(), "viewer.json", VIEWER_PAYLOAD);

    graphcache(temp.path())
        .args([
            "write",
            "cache.json",
            "--query",
            "viewer.graphql",
            "--payload",
            "viewer.json",
        ])
        .assert()
        .success();

    temp
}

// ============================================================================
// Write and Read
// ============================================================================

#[test]
fn test_write_reports_edited_nodes() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "viewer.graphql", VIEWER_QUERY);
    write_file(temp.path(), "viewer.json", VIEWER_PAYLOAD);

    let output = graphcache(temp.path())
        .args([
            "write",
            "cache.json",
            "--query",
            "viewer.graphql",
            "--payload",
            "viewer.json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["edited"], serde_json::json!(["1", "2", "ROOT_QUERY"]));
    assert_eq!(report["warnings"], serde_json::json!([]));
    assert!(temp.path().join("cache.json").exists());
}

#[test]
fn test_read_round_trips_through_file() {
    let temp = setup_snapshot();

    let output = graphcache(temp.path())
        .args(["read", "cache.json", "--query", "viewer.graphql"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["complete"], serde_json::json!(true));
    assert_eq!(
        result["result"],
        serde_json::from_str::<serde_json::Value>(VIEWER_PAYLOAD).unwrap()
    );
}

#[test]
fn test_read_fragment_at_entity() {
    let temp = setup_snapshot();
    write_file(
        temp.path(),
        "user.graphql",
        "fragment UserName on User { id name } query { viewer { ...UserName } }",
    );

    graphcache(temp.path())
        .args([
            "read",
            "cache.json",
            "--query",
            "user.graphql",
            "--fragment",
            "UserName",
            "--root",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Brie"))
        .stdout(predicate::str::contains("\"complete\": true"));
}

#[test]
fn test_read_with_variables() {
    let temp = TempDir::new().unwrap();
    write_file(
        temp.path(),
        "user.graphql",
        "query User($id: ID!) { user(id: $id) { id name } }",
    );
    write_file(
        temp.path(),
        "user.json",
        r#"{"user": {"id": "7", "name": "Feta"}}"#,
    );

    graphcache(temp.path())
        .args([
            "write",
            "cache.json",
            "--query",
            "user.graphql",
            "--variables",
            r#"{"id": "7"}"#,
            "--payload",
            "user.json",
        ])
        .assert()
        .success();

    graphcache(temp.path())
        .args([
            "read",
            "cache.json",
            "--query",
            "user.graphql",
            "--variables",
            r#"{"id": "7"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"complete\": true"));

    graphcache(temp.path())
        .args([
            "read",
            "cache.json",
            "--query",
            "user.graphql",
            "--variables",
            r#"{"id": "8"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"complete\": false"));
}

#[test]
fn test_write_rejects_invalid_payload() {
    let temp = setup_snapshot();
    write_file(temp.path(), "bad.json", r#"{"viewer": {"name": "No id"}}"#);
    let before = std::fs::read_to_string(temp.path().join("cache.json")).unwrap();

    graphcache(temp.path())
        .args([
            "write",
            "cache.json",
            "--query",
            "viewer.graphql",
            "--payload",
            "bad.json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported transition"));

    let after = std::fs::read_to_string(temp.path().join("cache.json")).unwrap();
    assert_eq!(before, after);
}

// ============================================================================
// Inspect, Prune and Verify
// ============================================================================

#[test]
fn test_inspect_json() {
    let temp = setup_snapshot();

    let output = graphcache(temp.path())
        .args(["inspect", "cache.json", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["nodes"], serde_json::json!(3));
    assert_eq!(report["entities"], serde_json::json!(3));
    assert_eq!(report["parameterized_values"], serde_json::json!(0));
    assert_eq!(report["orphaned"], serde_json::json!([]));
    assert_eq!(report["consistency_error"], serde_json::Value::Null);
}

#[test]
fn test_inspect_missing_snapshot_is_empty() {
    let temp = TempDir::new().unwrap();

    graphcache(temp.path())
        .args(["inspect", "missing.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes:                0"));
}

#[test]
fn test_verify_success_and_failure() {
    let temp = setup_snapshot();
    write_file(temp.path(), "email.graphql", "{ viewer { id email } }");

    graphcache(temp.path())
        .args(["verify", "cache.json", "--query", "viewer.graphql"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));

    graphcache(temp.path())
        .args(["verify", "cache.json", "--query", "email.graphql"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot satisfy"));
}

#[test]
fn test_prune_to_output_file() {
    let temp = setup_snapshot();
    write_file(temp.path(), "name.graphql", "{ viewer { id name } }");

    graphcache(temp.path())
        .args([
            "prune",
            "cache.json",
            "--query",
            "name.graphql",
            "--output",
            "pruned.json",
        ])
        .assert()
        .success();

    let pruned: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("pruned.json")).unwrap(),
    )
    .unwrap();
    let mut ids: Vec<&String> = pruned.as_object().unwrap().keys().collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "ROOT_QUERY"]);

    graphcache(temp.path())
        .args(["verify", "pruned.json", "--query", "viewer.graphql"])
        .assert()
        .failure();
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_default_snapshot_path_from_local_config() {
    let temp = setup_snapshot();
    std::fs::create_dir_all(temp.path().join(".graphcache")).unwrap();
    write_file(
        temp.path(),
        ".graphcache/config.toml",
        "[persistence]\nsnapshot_path = \"cache.json\"\n",
    );

    graphcache(temp.path())
        .args(["read", "--query", "viewer.graphql"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gouda"));
}

#[test]
fn test_config_show_reflects_overrides() {
    let temp = TempDir::new().unwrap();

    graphcache(temp.path())
        .args(["--verify-snapshots", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verify_snapshots = true"))
        .stdout(predicate::str::contains("strict = true"));
}

#[test]
fn test_explicit_config_file() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "custom.toml", "[logging]\nlevel = \"warn\"\n");

    graphcache(temp.path())
        .args(["--config", "custom.toml", "config", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"level\": \"warn\""));
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "custom.toml", "[logging]\nlevel = \"loud\"\n");

    graphcache(temp.path())
        .args(["--config", "custom.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("logging.level"));
}

#[test]
fn test_config_path_lists_locations() {
    let temp = TempDir::new().unwrap();

    graphcache(temp.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".graphcache"))
        .stdout(predicate::str::contains("not found"));
}
