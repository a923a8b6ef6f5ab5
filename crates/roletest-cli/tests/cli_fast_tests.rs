//! Fast CLI tests using assert_cmd.
//! These test the binary directly without needing a container daemon.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;

/// Binary isolated from the user's configuration and daemon settings
fn cmd(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ansible-role-test").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("DOCKER_HOST")
        .env_remove("DOCKER_TLS_VERIFY")
        .env_remove("DOCKER_CERT_PATH")
        .env_remove("ANSIBLE_LIBRARY");
    cmd
}

#[test]
fn test_help_flag() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("testing utility for ansible roles"))
        .stdout(predicate::str::contains("--extra-vars"))
        .stdout(predicate::str::contains("ansible-galaxy role name"));
}

#[test]
fn test_short_help_flag() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path()).arg("-h").assert().success();
}

#[test]
fn test_version_flag() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path()).arg("--version").assert().success();
}

#[test]
fn test_missing_role_fails() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("<ROLE>"));
}

#[test]
fn test_unknown_ansible_version_fails() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .args(["--ansible-version", "2.0", "acme.base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_paths_file_fails() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .args(["-c", "/nonexistent/paths.toml", "acme.base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_invalid_paths_file_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = tmp.path().join("paths.toml");
    std::fs::write(&paths, "modules = \"library\"\n").unwrap();

    cmd(tmp.path())
        .arg("--config")
        .arg(&paths)
        .arg("acme.base")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_invalid_global_config_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let config_dir = tmp.path().join(".config").join("ansible-role-test");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "[daemon]\nhost = \"\"\n").unwrap();

    cmd(tmp.path())
        .arg("acme.base")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
