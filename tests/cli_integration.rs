//! Binary-level CLI tests.

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn avitag() -> Command {
    let mut cmd = Command::cargo_bin("avitag").unwrap();
    // Make sure ambient credentials never leak into these tests.
    cmd.env_remove("AVITAG_STORE_URL");
    cmd.env_remove("AVITAG_STORE_KEY");
    cmd.env_remove("OPENAI_API_KEY");
    cmd
}

#[test]
fn help_mentions_batch_options() {
    avitag()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--continuous"));
}

#[test]
fn config_path_prints_toml_location() {
    avitag()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn run_without_store_config_fails_fast() {
    // Point the config dir at an empty directory so a developer's real
    // config cannot satisfy validation.
    let config_home = tempfile::tempdir().unwrap();
    avitag()
        .env("XDG_CONFIG_HOME", config_home.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration validation failed"));
}

#[test]
fn invalid_threshold_is_rejected_at_parse_time() {
    avitag()
        .args(["-c", "2.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0.0 and 1.0"));
}
