//! End-to-end tests for ltoweave CLI commands.
//!
//! These tests run the binary against manifests written to a temp directory.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// A manifest file living in its own temporary directory.
struct TestManifest {
    _temp_dir: TempDir,
    path: PathBuf,
}

impl TestManifest {
    fn new(source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("graph.json");
        fs::write(&path, source).expect("Failed to write manifest");

        Self {
            _temp_dir: temp_dir,
            path,
        }
    }
}

fn chain_manifest() -> &'static str {
    r#"{
        "policy": { "global_thin_default": false },
        "modules": [
            { "name": "app", "lto": { "full": true }, "deps": [ { "target": "liba" } ] },
            { "name": "liba", "deps": [ { "target": "libb" } ] },
            { "name": "libb" }
        ]
    }"#
}

fn ltoweave() -> Command {
    let mut cmd = Command::cargo_bin("ltoweave").expect("Failed to find binary");
    cmd.env_remove("DISABLE_LTO")
        .env_remove("GLOBAL_THINLTO")
        .env_remove("USE_THINLTO_CACHE")
        .env_remove("RUST_LOG");
    cmd
}

// =============================================================================
// plan
// =============================================================================

#[test]
fn test_plan_text_output() {
    let manifest = TestManifest::new(chain_manifest());

    ltoweave()
        .arg("plan")
        .arg(&manifest.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("app: full"))
        .stdout(predicate::str::contains("  -> liba#lto-full"))
        .stdout(predicate::str::contains("liba#lto-full: full [not installed]"))
        .stdout(predicate::str::contains("2 variants created"));
}

#[test]
fn test_plan_json_output() {
    let manifest = TestManifest::new(chain_manifest());

    let output = ltoweave()
        .args(["plan", "--format", "json"])
        .arg(&manifest.path)
        .output()
        .expect("Failed to run ltoweave");
    assert!(output.status.success());

    let plan: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Plan is not valid JSON");
    assert_eq!(plan["clones_created"], 2);
    let modules = plan["modules"].as_array().expect("modules must be a list");
    let clone = modules
        .iter()
        .find(|m| m["name"] == "libb#lto-full")
        .expect("missing libb variant");
    assert_eq!(clone["mode"], "full");
    assert_eq!(clone["variation"], "lto-full");
    assert_eq!(clone["installable"], false);
}

#[test]
fn test_plan_disable_lto_flag() {
    let manifest = TestManifest::new(chain_manifest());

    ltoweave()
        .args(["plan", "--disable-lto"])
        .arg(&manifest.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("app: none [never]"))
        .stdout(predicate::str::contains("#lto-full").not());
}

#[test]
fn test_plan_reports_conflicting_modes() {
    let manifest = TestManifest::new(
        r#"{ "modules": [ { "name": "bad", "lto": { "full": true, "thin": true } } ] }"#,
    );

    ltoweave()
        .arg("plan")
        .arg(&manifest.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("module 'bad'"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_plan_missing_manifest() {
    ltoweave()
        .args(["plan", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"))
        .stderr(predicate::str::contains("IO error"));
}

// =============================================================================
// check
// =============================================================================

#[test]
fn test_check_reports_modes() {
    let manifest = TestManifest::new(chain_manifest());

    ltoweave()
        .arg("check")
        .arg(&manifest.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("app: full"))
        .stdout(predicate::str::contains("liba: none"))
        .stdout(predicate::str::contains("3 modules OK"));
}

#[test]
fn test_check_unknown_dependency() {
    let manifest = TestManifest::new(
        r#"{ "modules": [ { "name": "app", "deps": [ { "target": "ghost" } ] } ] }"#,
    );

    ltoweave()
        .arg("check")
        .arg(&manifest.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}
