#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("lamp-build").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[COMPONENTS]..."))
        .stdout(predicate::str::contains("--cluster"))
        .stdout(predicate::str::contains("CLUSTER_NAME"))
        .stdout(predicate::str::contains("--hash"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("lamp-build").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lamp-build"));
}

/// CLUSTER_NAME が未設定ならエラーになることを確認
#[test]
fn test_cluster_is_required() {
    let mut cmd = Command::cargo_bin("lamp-build").unwrap();
    cmd.env_remove("CLUSTER_NAME")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--cluster"));
}

/// プロジェクトディレクトリ外で実行するとエラーになることを確認
#[test]
fn test_without_project() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("lamp-build").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("CLUSTER_NAME", "LOCAL")
        .env_remove("LAMP_PROJECT_ROOT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("lamp.json"));
}

/// lamp.json が壊れている場合はビルド前にエラーになることを確認
#[test]
fn test_invalid_project_descriptor() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("lamp.json"), "{ not json").unwrap();

    let mut cmd = Command::cargo_bin("lamp-build").unwrap();
    cmd.arg("--project-root")
        .arg(temp_dir.path())
        .env("CLUSTER_NAME", "LOCAL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("lamp.json"));
}
