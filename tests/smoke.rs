//! Smoke tests -- verify the binary runs and argument validation happens up front.

use assert_cmd::Command;
use std::io::Write;

fn poolprobe() -> Command {
    let mut cmd = Command::cargo_bin("poolprobe").unwrap();
    cmd.env_remove("POOLPROBE_CONFIG")
        .env_remove("POOLPROBE_ENDPOINT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    poolprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Concurrent upload load tester"));
}

#[test]
fn test_cli_version() {
    poolprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("poolprobe"));
}

#[test]
fn test_run_subcommand_exists() {
    poolprobe()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("--count"));
}

#[test]
fn test_serve_subcommand_exists() {
    poolprobe().args(["serve", "--help"]).assert().success();
}

#[test]
fn test_run_requires_file() {
    poolprobe().arg("run").assert().failure();
}

#[test]
fn test_run_rejects_count_above_limit() {
    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(b"%PDF-1.4").unwrap();

    poolprobe()
        .args(["run", "--count", "21", "--file"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicates::str::contains("between 1 and 20"));
}

#[test]
fn test_run_rejects_missing_artifact() {
    poolprobe()
        .args(["run", "--file", "/nonexistent/fatura.pdf"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("failed to read artifact"));
}

#[test]
fn test_explicit_config_must_exist() {
    poolprobe()
        .args(["--config", "/nonexistent/poolprobe.toml", "run", "--file", "x.pdf"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("failed to read config file"));
}

#[test]
fn test_run_finishes_against_unreachable_endpoint() {
    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(b"%PDF-1.4").unwrap();

    // Port 1 refuses connections, so both attempts settle as errors and the
    // progress loop exits on its own without a Ctrl-C.
    poolprobe()
        .args(["run", "--count", "2", "--endpoint", "http://127.0.0.1:1/UploadInvoice", "--file"])
        .arg(file.path())
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicates::str::contains("Completed:      2"))
        .stdout(predicates::str::contains("Failed:         2"));
}
