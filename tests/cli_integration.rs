//! CLI integration tests
//!
//! These tests run the scrgen binary and verify:
//! - Command parsing
//! - Output formatting
//! - Exit codes

mod support;

use serde_json::{json, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use support::{component, greeter_component, library, setter, unit, with};
use tempfile::TempDir;

/// Helper to get the path to the scrgen binary
fn scrgen_bin() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();

    // Test executables live in target/<profile>/deps
    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }

    path.join("scrgen")
}

fn run(args: &[&str]) -> Output {
    Command::new(scrgen_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute scrgen")
}

fn write_snapshot(dir: &Path, units: Vec<Value>) -> PathBuf {
    let path = dir.join("snapshot.json");
    let snapshot = json!({ "units": units, "library": library() });
    fs::write(&path, snapshot.to_string()).expect("Failed to write snapshot");
    path
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scrgen"));
    assert!(stdout.contains("build"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("name"));
}

#[test]
fn test_name_command() {
    let output = run(&["name", "service_ranking"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "service.ranking\n");

    let output = run(&["name", "getFooBar", "--class-name", "--prefix", "acme."]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "acme.get.foo.bar\n");

    let output = run(&["name", "$_$", "--spec-version", "1.3"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), ".\n");
}

#[test]
fn test_build_writes_descriptors() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(
        dir.path(),
        vec![unit("com/acme/GreeterImpl.java", vec![greeter_component("com.acme.GreeterImpl", None)])],
    );

    let output = run(&[
        "build",
        snapshot.to_str().unwrap(),
        "--project-dir",
        dir.path().to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).expect("JSON report");
    assert_eq!(report["retained"][0], "OSGI-INF/com.acme.GreeterImpl.xml");
    assert_eq!(report["units"][0]["descriptors"][0]["status"], "created");
    assert!(dir.path().join("OSGI-INF/com.acme.GreeterImpl.xml").is_file());

    let output = run(&["build", snapshot.to_str().unwrap(), "-p", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unchanged"));
    assert!(stdout.contains("Service-Component: OSGI-INF/com.acme.GreeterImpl.xml"));
}

#[test]
fn test_check_reports_errors() {
    let dir = TempDir::new().unwrap();
    let broken = with(
        component("com.acme.Comp", json!({})),
        "methods",
        json!([setter("setLog", "com.acme.Log", Some(json!({ "policy": "dynamic" })))]),
    );
    let snapshot = write_snapshot(dir.path(), vec![unit("com/acme/Comp.java", vec![broken])]);
    let snapshot = snapshot.to_str().unwrap();
    let project = dir.path().to_str().unwrap();

    let output = run(&["check", snapshot, "-p", project]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Check Failed"));
    assert!(!dir.path().join("OSGI-INF").exists());

    let output = run(&["check", snapshot, "-p", project, "--missing-unbind-level", "ignore"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_missing_snapshot_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let output = run(&[
        "build",
        missing.to_str().unwrap(),
        "-p",
        dir.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_project_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path(), Vec::new());
    fs::write(dir.path().join("scrgen.toml"), "output-path = \"../outside\"\n").unwrap();

    let output = run(&[
        "check",
        snapshot.to_str().unwrap(),
        "-p",
        dir.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
}
