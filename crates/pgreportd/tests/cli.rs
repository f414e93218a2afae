use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn pgreportd() -> Command {
    let mut cmd = Command::cargo_bin("pgreportd").unwrap();
    cmd.env_remove("PGREPORT_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_options() {
    pgreportd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--port"));
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    pgreportd()
        .arg("--config")
        .arg(dir.path().join("nope.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn no_config_in_working_directory_fails() {
    let dir = TempDir::new().unwrap();
    pgreportd()
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No config file found"));
}

#[test]
fn duplicate_server_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(
        &config,
        r#"
this_service_port: 8080
report_dir: ./report
servers:
  - { name: pg1, host: a, user: postgres, database: postgres }
  - { name: pg1, host: b, user: postgres, database: postgres }
"#,
    )
    .unwrap();

    pgreportd()
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate server name: pg1"));
    assert!(!dir.path().join("report").exists());
}

#[test]
fn zero_port_override_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "this_service_port = 8080\nservers = []\n").unwrap();

    pgreportd()
        .arg("--config")
        .arg(&config)
        .args(["--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("this_service_port must be non-zero"));
}
