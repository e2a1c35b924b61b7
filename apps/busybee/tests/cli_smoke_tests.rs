#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the busybee binary

use httpmock::prelude::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn run_busybee(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_busybee"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute busybee")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Config pointing at `okapi_url` with millisecond retry backoff
fn write_config(dir: &TempDir, okapi_url: &str) -> PathBuf {
    let path = dir.path().join("busybee.yaml");
    std::fs::write(
        &path,
        format!(
            r#"
okapi:
  url: "{okapi_url}"
  enable:
    retry:
      initial_backoff: "1ms"
      max_backoff: "5ms"
"#
        ),
    )
    .unwrap();
    path
}

fn write_manifest(dir: &Path) -> PathBuf {
    std::fs::write(
        dir.join("mod-users.json"),
        r#"{"id": "mod-users-19.2.0", "name": "users"}"#,
    )
    .unwrap();
    let path = dir.join("modules.yaml");
    std::fs::write(
        &path,
        r"
- kind: okapi
- kind: module
  name: mod-users
  http_port: 9131
  descriptor: mod-users.json
",
    )
    .unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    let output = run_busybee(&["--help"]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("Usage:"));
    for word in ["deploy", "enable", "run", "check", "--config"] {
        assert!(out.contains(word), "help should mention {word}: {out}");
    }
}

#[test]
fn version_is_printed() {
    let output = run_busybee(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("busybee"));
}

#[test]
fn missing_config_file_fails() {
    let output = run_busybee(&["--config", "/nonexistent/busybee.yaml", "check"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("does not exist"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn invalid_yaml_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invalid.yaml");
    std::fs::write(&path, "okapi: [unclosed").unwrap();

    let output = run_busybee(&["--config", path.to_str().unwrap(), "check"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load config"));
}

#[test]
fn check_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "http://okapi.internal:9130");

    let output = run_busybee(&["--config", path.to_str().unwrap(), "check"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Configuration is valid"));
    assert!(out.contains("okapi.internal"));
}

#[test]
fn check_rejects_non_http_url() {
    let output = run_busybee(&["--okapi-url", "ftp://okapi:9130", "check"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("okapi"));
}

#[test]
fn print_config_applies_cli_override() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "http://okapi.internal:9130");

    let output = run_busybee(&[
        "--config",
        path.to_str().unwrap(),
        "--okapi-url",
        "http://override:9130",
        "--print-config",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("http://override:9130"));
    assert!(out.contains("1ms"));
}

#[test]
fn unknown_strategy_rejected_by_parser() {
    let output = run_busybee(&[
        "enable",
        "--manifest",
        "modules.yaml",
        "--tenant",
        "diku",
        "--strategy",
        "sometimes",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("sometimes"));
}

#[test]
fn run_deploys_then_enables() {
    let server = MockServer::start();
    let discovery = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/_/discovery/modules")
            .header("x-okapi-tenant", "supertenant")
            .body_includes(r#""srvcId":"mod-users-19.2.0""#)
            .body_includes(r#""url":"http://localhost:9131""#);
        then.status(201);
    });
    let lookup = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/_/proxy/tenants/diku/modules/mod-users-19.2.0");
        then.status(404);
    });
    let enable = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/_/proxy/tenants/diku/modules")
            .json_body(serde_json::json!({ "id": "mod-users-19.2.0" }));
        then.status(201);
    });

    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.base_url());
    let manifest = write_manifest(dir.path());

    let output = run_busybee(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        "--manifest",
        manifest.to_str().unwrap(),
        "--tenant",
        "diku",
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    discovery.assert_calls(1);
    lookup.assert_calls(1);
    enable.assert_calls(1);

    let out = stdout(&output);
    assert!(out.contains("deployed mod-users-19.2.0 at http://localhost:9131"));
    assert!(out.contains("\"enabled\""));
}

#[test]
fn enable_with_install_strategy() {
    let server = MockServer::start();
    let install = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/_/proxy/tenants/diku/install")
            .query_param("deploy", "false");
        then.status(200);
    });

    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.base_url());
    let manifest = write_manifest(dir.path());

    let output = run_busybee(&[
        "--config",
        config.to_str().unwrap(),
        "enable",
        "--manifest",
        manifest.to_str().unwrap(),
        "--tenant",
        "diku",
        "--strategy",
        "unconditional-install",
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    install.assert_calls(1);
}

#[test]
fn deployment_rejection_exits_non_zero() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(Method::POST).path("/_/discovery/modules");
        then.status(500).body("no such module");
    });

    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.base_url());
    let manifest = write_manifest(dir.path());

    let output = run_busybee(&[
        "--config",
        config.to_str().unwrap(),
        "deploy",
        "--manifest",
        manifest.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("failed to deploy mod-users:9131"), "{err}");
    assert!(err.contains("no such module"), "{err}");
}
