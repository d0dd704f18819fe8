//! End-to-end tests for the tabload CLI
//!
//! These drive the compiled binary against real files in a temp directory:
//! load, duplicate short-circuit, status reporting, and argument validation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CSV: &str = "\
player_name,club,goals
arjen,fcb,10
kevin,mci,8
mo,liv,22
";

fn write_source(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn tabload() -> Command {
    Command::cargo_bin("tabload").unwrap()
}

#[test]
fn test_load_ingests_into_store() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "stats.csv.processed", CSV);
    let store = dir.path().join("stats.sqlite3");

    tabload()
        .arg("load")
        .arg("--source")
        .arg(&source)
        .arg("--store")
        .arg(&store)
        .arg("--key")
        .arg("player_name")
        .arg("--key")
        .arg("club")
        .assert()
        .success();

    assert!(store.exists());
    // run completed, so no checkpoint is left next to the source
    assert!(!dir.path().join("stats.csv.processed.progress").exists());
}

#[test]
fn test_second_load_is_a_duplicate_and_still_succeeds() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "stats.csv.processed", CSV);
    let store = dir.path().join("stats.sqlite3");

    for _ in 0..2 {
        tabload()
            .arg("load")
            .arg("--source")
            .arg(&source)
            .arg("--store")
            .arg(&store)
            .arg("--key")
            .arg("player_name")
            .arg("--key")
            .arg("club")
            .assert()
            .success();
    }
}

#[test]
fn test_load_rejects_unstaged_source() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "raw.csv", CSV);
    let store = dir.path().join("stats.sqlite3");

    tabload()
        .arg("load")
        .arg("--source")
        .arg(&source)
        .arg("--store")
        .arg(&store)
        .arg("--key")
        .arg("player_name")
        .assert()
        .failure();
}

#[test]
fn test_load_requires_a_natural_key() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "stats.csv.processed", CSV);

    tabload()
        .arg("load")
        .arg("--source")
        .arg(&source)
        .arg("--store")
        .arg(dir.path().join("stats.sqlite3"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--key"));
}

#[test]
fn test_status_before_and_after_load() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "stats.csv.processed", CSV);
    let store = dir.path().join("stats.sqlite3");

    tabload()
        .arg("status")
        .arg("--source")
        .arg(&source)
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpoint: none"))
        .stdout(predicate::str::contains("imported: no"));

    tabload()
        .arg("load")
        .arg("--source")
        .arg(&source)
        .arg("--store")
        .arg(&store)
        .arg("--key")
        .arg("player_name")
        .arg("--key")
        .arg("club")
        .assert()
        .success();

    tabload()
        .arg("status")
        .arg("--source")
        .arg(&source)
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpoint: none"))
        .stdout(predicate::str::contains("imported: yes"));
}
