//! CLI integration tests
//!
//! Tests the tack-testbed CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn tack_testbed() -> Command {
    Command::cargo_bin("tack-testbed")
        .expect("Failed to locate tack-testbed binary - ensure it's built before running tests")
}

/// Config file with no certificate or key, so defaults on disk never leak in
fn empty_config() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").expect("Failed to write config");
    (dir, path)
}

#[test]
fn test_cli_help() {
    tack_testbed()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tack-testbed"))
        .stdout(predicate::str::contains("TACK pin rotation testbed"));
}

#[test]
fn test_cli_version() {
    tack_testbed()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tack-testbed"));
}

#[test]
fn test_cli_server_help() {
    tack_testbed()
        .args(["server", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cert"))
        .stdout(predicate::str::contains("--key"));
}

#[test]
fn test_cli_client_help() {
    tack_testbed()
        .args(["client", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trust assertion"));
}

#[test]
fn test_cli_rotate_help() {
    tack_testbed()
        .args(["rotate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--control"));
}

#[test]
fn test_cli_server_without_identity() {
    let (_dir, config) = empty_config();
    tack_testbed()
        .args(["--config", config.to_str().unwrap(), "server"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("certificate"));
}

#[test]
fn test_cli_server_without_key() {
    let (dir, config) = empty_config();
    let cert = dir.path().join("cert.pem");
    tack_testbed()
        .args(["--config", config.to_str().unwrap(), "server", "-c"])
        .arg(&cert)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("private key"));
}

#[test]
fn test_cli_server_missing_files() {
    let (dir, config) = empty_config();
    tack_testbed()
        .args(["--config", config.to_str().unwrap(), "server"])
        .arg("-c")
        .arg(dir.path().join("nope.pem"))
        .arg("-k")
        .arg(dir.path().join("nope.key"))
        .args(["--tls-bind", "127.0.0.1:0", "--control-bind", "127.0.0.1:0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Server failed"));
}

#[test]
fn test_cli_missing_config_file() {
    tack_testbed()
        .args(["--config", "/nonexistent/tack-testbed.toml", "server"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_unknown_command() {
    tack_testbed()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_rotate_unreachable() {
    // Port 9 (discard) on loopback is not expected to run an HTTP server
    tack_testbed()
        .args(["rotate", "--control", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Is the testbed running?"));
}
