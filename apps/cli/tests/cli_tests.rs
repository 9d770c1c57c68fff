//! nova-cli 离线命令集成测试
//!
//! 只覆盖不需要控制器的命令；配置文件放在临时目录中。

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn nova_cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nova-cli").unwrap();
    cmd.arg("--config").arg(dir.path().join("config.toml"));
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_check_safe_pose() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["check", "--", "-350,0,200,180,0,0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(": safe"));
}

#[test]
fn test_check_reports_each_failing_category() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["check", "--nearest", "--", "-50,50,200,180,90,0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unsafe"))
        .stdout(predicate::str::contains("[shoulder]"))
        .stdout(predicate::str::contains("[wrist]"))
        .stdout(predicate::str::contains("nearest safe position"));
}

#[test]
fn test_check_rejects_malformed_pose() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["check", "1,2,3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pose"));
}

#[test]
fn test_path_inserts_detour() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["path", "--", "-200,-80,300,180,0,0", "200,80,300,180,0,0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1: (150, 150, 300, 180, 0, 0)"))
        .stdout(predicate::str::contains("2: (200, 80, 300, 180, 0, 0)"));
}

#[test]
fn test_alarm_decodes_status_text() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["alarm", "--lang", "en", "0,{16,0},GetErrorID()"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Collision detected"));

    nova_cli(&dir)
        .args(["alarm", "0,{0,0},GetErrorID()"])
        .assert()
        .success()
        .stdout(predicate::str::diff("no alarm\n"));
}

#[test]
fn test_alarm_by_id() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["alarm", "--servo", "99999"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown alarm 99999"));
}

#[test]
fn test_alarm_rejects_malformed_status() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["alarm", "malformed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to parse error id"));
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["config", "set", "--ip", "10.0.0.9", "--policy", "strict"])
        .assert()
        .success();

    nova_cli(&dir)
        .args(["config", "get", "ip"])
        .assert()
        .success()
        .stdout(predicate::str::diff("10.0.0.9\n"));

    nova_cli(&dir)
        .args(["config", "get", "policy"])
        .assert()
        .success()
        .stdout(predicate::str::diff("strict\n"));
}

#[test]
fn test_config_rejects_unknown_policy() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["config", "set", "--policy", "lenient"])
        .assert()
        .failure();
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_dance_list() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["dance", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wave_right"))
        .stdout(predicate::str::contains("test_nod"));
}

#[test]
fn test_dance_unknown_move() {
    let dir = TempDir::new().unwrap();
    nova_cli(&dir)
        .args(["dance", "moonwalk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown dance move"));
}
