//! Command-line tests for the `eil` binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn eil() -> Command {
    let mut cmd = Command::cargo_bin("eil").unwrap();
    cmd.env_remove("EIL_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn jsonl(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn config_prints_defaults_as_toml() {
    eil()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("consensus_threshold = 0.85"))
        .stdout(predicate::str::contains("[microadapt]"));
}

#[test]
fn config_reads_file() {
    let mut cfg = NamedTempFile::new().unwrap();
    writeln!(cfg, "forecast_horizon = 12").unwrap();
    eil()
        .args(["--config", cfg.path().to_str().unwrap(), "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("forecast_horizon = 12"));
}

#[test]
fn invalid_config_fails() {
    let mut cfg = NamedTempFile::new().unwrap();
    writeln!(cfg, "approval_threshold = 2.0").unwrap();
    eil()
        .args(["--config", cfg.path().to_str().unwrap(), "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("approval_threshold"));
}

#[test]
fn replay_emits_one_decision_per_line() {
    let input = jsonl(&[
        r#"{"energy_map": [[10.0, 10.0], [10.0, 10.0]], "domain": "fluid_dynamics"}"#,
        "",
        r#"{"energy_map": [[10.0, 10.5], [10.2, 10.1]], "domain": "fluid_dynamics", "cluster": "east"}"#,
        r#"{"energy_map": [[9.0]], "domain": "grid", "hypothesis": {"claim": "steady"}}"#,
    ]);

    let output = eil()
        .args(["replay", input.path().to_str().unwrap(), "--seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let decisions: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(decisions.len(), 3);
    assert_eq!(decisions[0]["forecast_horizon"], 60);
    assert_eq!(decisions[0]["energy_state"], 10.0);
    assert_eq!(decisions[1]["context"]["cluster"], "east");
    assert_eq!(decisions[2]["hypothesis"]["claim"], "steady");
}

#[test]
fn replay_stats_line() {
    let input = jsonl(&[r#"{"energy_map": [[1.0, 2.0]], "domain": "grid"}"#]);
    let output = eil()
        .args(["replay", input.path().to_str().unwrap(), "--stats"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["ticks_processed"], 1);
    assert_eq!(last["history_size"], 1);
}

#[test]
fn replay_reads_stdin() {
    eil()
        .args(["replay", "-"])
        .write_stdin("{\"energy_map\": [[3.0]], \"domain\": \"grid\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"unified_regime\""));
}

#[test]
fn replay_reports_bad_line() {
    let input = jsonl(&[
        r#"{"energy_map": [[1.0]], "domain": "grid"}"#,
        r#"{"energy_map": [[1.0, 2.0], [3.0]], "domain": "grid"}"#,
    ]);
    eil()
        .args(["replay", input.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn replay_rejects_empty_map() {
    let input = jsonl(&[r#"{"energy_map": [], "domain": "grid"}"#]);
    eil()
        .args(["replay", input.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("energy map is empty"));
}

#[test]
fn missing_input_fails() {
    eil()
        .args(["replay", "/nonexistent/input.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));
}
