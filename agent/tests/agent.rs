//! End-to-end smoke tests of the `harvestd` binary.

use assert_cmd::Command;
use indoc::indoc;

#[test]
fn help_runs() {
    Command::cargo_bin("harvestd").unwrap().arg("--help").assert().success();
}

#[test]
fn bounded_dry_run_with_dump_sink() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("harvestd.toml");
    std::fs::write(
        &config,
        indoc! {r#"
            [loop]
            interval = "1s"

            [sinks.dump]
        "#},
    )
    .unwrap();

    Command::cargo_bin("harvestd")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--cycles", "1", "--dry-run"])
        .assert()
        .success();
}

#[test]
fn unknown_element_name_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("harvestd.toml");
    std::fs::write(&config, "[sinks.nonexistent]\n").unwrap();

    Command::cargo_bin("harvestd")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--cycles", "1"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("nonexistent"));
}

#[test]
fn disabled_unknown_element_is_ignored() {
    // A disabled entry is skipped before its factory lookup, so even an
    // unknown name is harmless when turned off.
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("harvestd.toml");
    std::fs::write(
        &config,
        indoc! {r#"
            [sinks.nonexistent]
            enabled = false
        "#},
    )
    .unwrap();

    Command::cargo_bin("harvestd")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--cycles", "1"])
        .assert()
        .success();
}
