//! CLI 二进制的集成测试
//!
//! 只覆盖不需要真实会话的路径：字段表、配置管理、参数校验。
//! 会话链路的端到端测试在 washlink-sdk 的 mock 集成测试里。

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("washlink-cli").unwrap()
}

#[test]
fn test_fields_lists_wire_names() {
    cli()
        .arg("fields")
        .assert()
        .success()
        .stdout(predicate::str::contains("userConfiguration\n"))
        .stdout(predicate::str::contains("doorCount\n"))
        .stdout(predicate::str::contains("controlLock\n"));
}

#[test]
fn test_read_unknown_field_fails_fast() {
    cli()
        .args(["read", "tubLight"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Field not recognised: \"tubLight\""));
}

#[test]
fn test_write_rejects_read_only_field() {
    cli()
        .args(["write", "doorCount", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not writable"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_path_respects_xdg_config_home() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("washlink/config.toml"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_set_then_show_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "set", "--min-spacing-ms", "250"])
        .assert()
        .success()
        .stdout(predicate::str::contains("min_spacing_ms = 250"));

    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("min_spacing_ms = 250"));
}

#[test]
fn test_config_show_without_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("min_spacing_ms = 500"));
}
