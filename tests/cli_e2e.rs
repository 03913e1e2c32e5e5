//! End-to-end CLI tests for the fetcher binary.

use assert_cmd::Command;
use predicates::prelude::*;

mod support;
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn fetcher() -> Command {
    let mut cmd = Command::cargo_bin("fetcher").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", "/nonexistent-fetcher-config");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    fetcher()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetch pages and download large files"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    fetcher()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetcher"));
}

/// Test that a missing subcommand is a usage error.
#[test]
fn test_binary_without_command_fails() {
    fetcher()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

/// Test that plain http is refused before any network I/O.
#[test]
fn test_binary_http_url_refused_by_policy() {
    fetcher()
        .args(["-q", "get", "http://127.0.0.1:9/x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("only https is allowed"));
}

/// Test that a URL outside the base site is refused.
#[test]
fn test_binary_off_site_url_refused() {
    fetcher()
        .args([
            "-q",
            "--base-url",
            "https://data.example.com",
            "get",
            "https://other.example.com/x",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("only site 'https://data.example.com'"));
}

/// Test that the specify strategy without a name is refused.
#[test]
fn test_binary_specify_strategy_requires_name() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    fetcher()
        .args(["-q", "--strategy", "specify", "--temp-dir"])
        .arg(temp_dir.path())
        .args(["download", "https://data.example.com/f.bin"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("file name must be given"));
}

/// Test that a missing explicit config file is refused.
#[test]
fn test_binary_missing_config_file_refused() {
    fetcher()
        .args(["--config", "/nonexistent/fetcher.toml", "get", "https://a.com"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read config file"));
}

/// Test that `get` writes the body to stdout.
#[tokio::test(flavor = "multi_thread")]
async fn test_binary_get_writes_body_to_stdout() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
        .mount(&server)
        .await;

    let url = format!("{}/hello", server.uri());
    let temp_dir = tempfile::TempDir::new().unwrap();
    let output = tokio::task::spawn_blocking(move || {
        fetcher()
            .args(["-q", "--allow-http", "--pre-load-delay", "0", "--temp-dir"])
            .arg(temp_dir.path())
            .args(["get", &url])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello world");
}
