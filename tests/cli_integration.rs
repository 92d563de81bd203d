// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the bundle-importer CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A command isolated from the caller's configuration
fn bundle_importer(config_dir: &TempDir) -> Command {
    let config = config_dir.path().join("config.toml");
    if !config.exists() {
        fs::write(&config, "").unwrap();
    }
    let mut cmd = Command::cargo_bin("bundle-importer").unwrap();
    cmd.env("BUNDLE_IMPORTER_CONFIG", &config)
        .env_remove("BUNDLE_IMPORTER_BUNDLE_SERVICE_URL")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

const CHANGESET: &str = r#"[
    {"id": "addUnit-2", "method": "addUnit", "args": ["$deploy-1", 1, null], "requires": ["deploy-1"]},
    {"id": "deploy-1", "method": "deploy", "args": ["$addCharm-0", "trusty", "mysql", {}, null], "requires": ["addCharm-0"]},
    {"id": "addCharm-0", "method": "addCharm", "args": ["cs:trusty/mysql-38"], "requires": []}
]"#;

const CHARMS: &str = r#"{
    "cs:trusty/mysql-38": {"name": "mysql", "series": "trusty",
                           "options": {"dataset-size": {"type": "string", "default": "80%"}}}
}"#;

#[test]
fn test_sort_text() {
    let dir = TempDir::new().unwrap();
    let changeset = write(&dir, "changes.json", CHANGESET);

    bundle_importer(&dir)
        .arg("sort")
        .arg(&changeset)
        .assert()
        .success()
        .stdout(predicate::str::contains("1. addCharm-0"))
        .stdout(predicate::str::contains("2. deploy-1  (after addCharm-0)"))
        .stdout(predicate::str::contains("3. addUnit-2  (after deploy-1)"));
}

#[test]
fn test_sort_json() {
    let dir = TempDir::new().unwrap();
    let changeset = write(&dir, "changes.json", CHANGESET);

    let output = bundle_importer(&dir)
        .args(["sort", "--format", "json"])
        .arg(&changeset)
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        body["order"],
        serde_json::json!(["addCharm-0", "deploy-1", "addUnit-2"])
    );
    assert_eq!(body["records"][1]["args"][0], "$addCharm-0");
}

#[test]
fn test_sort_dot() {
    let dir = TempDir::new().unwrap();
    let changeset = write(&dir, "changes.json", CHANGESET);

    bundle_importer(&dir)
        .args(["sort", "--format", "dot"])
        .arg(&changeset)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph changeset"))
        .stdout(predicate::str::contains(r#""addCharm-0" -> "deploy-1";"#));
}

#[test]
fn test_sort_rejects_cycle() {
    let dir = TempDir::new().unwrap();
    let changeset = write(
        &dir,
        "changes.json",
        r#"[
            {"id": "a-1", "method": "addMachines", "requires": ["b-2"]},
            {"id": "b-2", "method": "addMachines", "requires": ["a-1"]}
        ]"#,
    );

    bundle_importer(&dir)
        .arg("sort")
        .arg(&changeset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("a-1"));
}

#[test]
fn test_import_changeset() {
    let dir = TempDir::new().unwrap();
    let changeset = write(&dir, "changes.json", CHANGESET);
    let charms = write(&dir, "charms.json", CHARMS);

    bundle_importer(&dir)
        .arg("import")
        .arg(&changeset)
        .arg("--charms")
        .arg(&charms)
        .assert()
        .success()
        .stdout(predicate::str::contains("Import Complete"))
        .stdout(predicate::str::contains("charm cs:trusty/mysql-38"))
        .stdout(predicate::str::contains("application mysql (cs:trusty/mysql-38) units: mysql/0"))
        .stdout(predicate::str::contains("machine 0"));
}

#[test]
fn test_import_json_summary() {
    let dir = TempDir::new().unwrap();
    let changeset = write(&dir, "changes.json", CHANGESET);
    let charms = write(&dir, "charms.json", CHARMS);

    let output = bundle_importer(&dir)
        .arg("--json")
        .arg("import")
        .arg(&changeset)
        .arg("--charms")
        .arg(&charms)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["outcome"], "completed");
    assert_eq!(summary["charms"][0]["loaded"], true);
    assert_eq!(summary["applications"][0]["config"]["dataset-size"], "80%");
    assert_eq!(summary["units"][0]["pending"], false);
}

#[test]
fn test_import_halts_on_unavailable_charm() {
    let dir = TempDir::new().unwrap();
    let changeset = write(&dir, "changes.json", CHANGESET);
    let charms = write(&dir, "charms.json", CHARMS);

    bundle_importer(&dir)
        .arg("import")
        .arg(&changeset)
        .arg("--charms")
        .arg(&charms)
        .args(["--unavailable-charm", "cs:trusty/mysql-38"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unable to load charm"))
        .stderr(predicate::str::contains("halted at addCharm-0"));
}

#[test]
fn test_import_rejects_unsupported_file() {
    let dir = TempDir::new().unwrap();
    let bundle = write(&dir, "bundle.zip", "");

    bundle_importer(&dir)
        .arg("import")
        .arg(&bundle)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unsupported file type"))
        .stderr(predicate::str::contains("did not start"));
}

#[test]
fn test_import_yaml_without_bundle_service() {
    let dir = TempDir::new().unwrap();
    let bundle = write(&dir, "bundle.yaml", "applications: {}\n");

    bundle_importer(&dir)
        .arg("import")
        .arg(&bundle)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error generating changeSet"));
}

#[test]
fn test_config_show_uses_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "config.toml", "resource_channel = \"edge\"\n");

    bundle_importer(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("resource_channel = \"edge\""))
        .stdout(predicate::str::contains("annotation_offset = 150"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("bundle-importer")
        .unwrap()
        .env("BUNDLE_IMPORTER_CONFIG", dir.path().join("absent.toml"))
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
