use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_version_command() {
    Command::cargo_bin("promptlane")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("promptlane"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("promptlane")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_help() {
    Command::cargo_bin("promptlane")
        .unwrap()
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_help_flag() {
    Command::cargo_bin("promptlane")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serial inference chat gateway"));
}

#[test]
fn test_unknown_subcommand_fails() {
    Command::cargo_bin("promptlane")
        .unwrap()
        .arg("bogus")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_serve_fails_fast_without_engine() {
    // Nothing listens on port 1; engine init failure must abort startup
    Command::cargo_bin("promptlane")
        .unwrap()
        .args([
            "serve",
            "--engine-url",
            "http://127.0.0.1:1",
            "--config",
            "/nonexistent/promptlane.json",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("inference engine"));
}
