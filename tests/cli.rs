use assert_cmd::Command;
use git2::{Repository, Signature};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("uast-extractor").unwrap()
}

/// A one-commit repository plus a config file cataloguing it as `r1`
fn setup() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let repo_path = dir.path().join("r1");
    let repo = Repository::init(&repo_path).unwrap();

    std::fs::write(repo_path.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
    std::fs::write(repo_path.join("README.md"), "# r1\n").unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new("main.go")).unwrap();
    index.add_path(Path::new("README.md")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    let config = format!(
        r#"
[cache]
enabled = true
path = {:?}

[[repositories]]
id = "r1"
path = {:?}
url = "https://example.com/r1.git"
"#,
        dir.path().join("cache.db"),
        repo_path,
    );
    std::fs::write(dir.path().join("config.toml"), config).unwrap();

    (dir, oid.to_string())
}

#[test]
fn test_validate_rejects_empty_commit_hash() {
    cmd()
        .args(["validate", "request"])
        .write_stdin(r#"{"repository_id":"r1","root_commit_hash":"","reference":"refs/heads/main"}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("root_commit_hash is empty"));
}

#[test]
fn test_validate_accepts_scenario_request() {
    cmd()
        .args(["validate", "request"])
        .write_stdin(
            r#"{"repository_id":"r1","root_commit_hash":"abcd1234","reference":"refs/heads/main"}"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid request for r1 at abcd1234"));
}

#[test]
fn test_validate_rejects_duplicate_paths() {
    let response = r#"{"repository_id":"r1","url":"https://example.com/r1.git","files":[
        {"language":"go","path":"main.go","uast":"<tree>","hash":"9f8e"},
        {"language":"go","path":"main.go","uast":"<tree>","hash":"9f8e"}]}"#;

    cmd()
        .args(["validate", "response"])
        .write_stdin(response)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate path"));
}

#[test]
fn test_extract_from_catalog() {
    let (dir, commit) = setup();
    let config = dir.path().join("config.toml");

    let output = cmd()
        .arg("--config")
        .arg(&config)
        .args(["extract", "r1", &commit, "--reference", "refs/heads/main"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let data: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(data["repository_id"], "r1");
    assert_eq!(data["url"], "https://example.com/r1.git");
    assert_eq!(data["files"].as_array().unwrap().len(), 1);
    assert_eq!(data["files"][0]["path"], "main.go");
    assert_eq!(data["files"][0]["language"], "go");

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extractions: 1"));
}

#[test]
fn test_handle_binary_request() {
    let (dir, commit) = setup();
    let config = dir.path().join("config.toml");

    let request = uast_extractor::Request::new(
        "r1",
        uast_extractor::Digest::from_hex(&commit).unwrap(),
        "refs/heads/main",
    );
    let input = uast_extractor::contract::wire::encode(
        &request,
        uast_extractor::WireFormat::Binary,
    )
    .unwrap();

    let output = cmd()
        .arg("--config")
        .arg(&config)
        .args(["--format", "binary", "handle", "--no-cache"])
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let data = uast_extractor::service::decode_response(
        &request,
        &output,
        uast_extractor::WireFormat::Binary,
    )
    .unwrap();
    assert_eq!(data.files[0].path, "main.go");
}

#[test]
fn test_extract_unknown_repository() {
    let (dir, commit) = setup();

    cmd()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["extract", "nope", &commit])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the catalog"));
}
