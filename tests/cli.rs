//! End-to-end runs of the piquad binary

use piquad::config::OutputFormat;
use piquad::coordinator::ProcessLauncher;
use piquad::integrate::summation::Summation;
use piquad::integrate::EstimateParams;
use piquad::worker::spawn_workers;
use std::process::{Command, Output};

fn piquad(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_piquad"))
        .args(args)
        .output()
        .expect("failed to run piquad")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Fields of a result line: workers, pi, error, runtime
fn parse_row(line: &str) -> (usize, f64, f64, f64) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    assert_eq!(fields.len(), 4, "unexpected row: {:?}", line);
    (
        fields[0].parse().unwrap(),
        fields[1].parse().unwrap(),
        fields[2].parse().unwrap(),
        fields[3].parse().unwrap(),
    )
}

#[test]
fn test_threads_single_line() {
    let output = piquad(&["-N", "10000", "-w", "2"]);
    assert!(output.status.success(), "{:?}", output);

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let (workers, pi, err, runtime) = parse_row(&lines[0]);
    assert_eq!(workers, 2);
    assert!((pi - std::f64::consts::PI).abs() < 1e-8);
    assert!(err < 1e-8);
    assert!(runtime >= 0.0);
}

#[test]
fn test_table_sweep() {
    let output = piquad(&["-N", "20k", "--sweep", "1,2,4", "--format", "table"]);
    assert!(output.status.success(), "{:?}", output);

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with('W'));
    let workers: Vec<usize> = lines[1..].iter().map(|l| parse_row(l).0).collect();
    assert_eq!(workers, vec![1, 2, 4]);
}

#[test]
fn test_processes_single_line() {
    let output = piquad(&["-N", "10000", "-w", "3", "--launcher", "processes"]);
    assert!(output.status.success(), "{:?}", output);

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1, "only rank 0 reports: {:?}", lines);
    let (workers, _, err, _) = parse_row(&lines[0]);
    assert_eq!(workers, 3);
    assert!(err < 1e-8);
}

#[test]
fn test_process_launcher_matches_threads_bitwise() {
    let params = EstimateParams::new(50_000, Summation::Exact).unwrap();
    let launcher =
        ProcessLauncher::with_program(env!("CARGO_BIN_EXE_piquad"), OutputFormat::Text, false);

    let from_processes = launcher.run(&params, 4).unwrap();
    let from_threads = spawn_workers(params, 4, false).unwrap().estimate;
    assert_eq!(from_processes.pi.to_bits(), from_threads.pi.to_bits());
    assert_eq!(from_processes.workers, 4);
}

#[test]
fn test_json_format() {
    let output = piquad(&["-N", "1000", "-w", "1", "--format", "json", "--summation", "naive"]);
    assert!(output.status.success(), "{:?}", output);

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(value["workers"], 1);
    assert_eq!(value["intervals"], 1000);
    assert_eq!(value["summation"], "naive");
}

#[test]
fn test_result_files() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("runs.json");
    let csv = dir.path().join("runs.csv");

    let output = piquad(&[
        "-N",
        "5000",
        "--sweep",
        "1,2",
        "--json-output",
        json.to_str().unwrap(),
        "--csv-output",
        csv.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["runs"].as_array().unwrap().len(), 2);

    let rows = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(rows.lines().count(), 3);
}

#[test]
fn test_config_file_with_cli_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piquad.toml");
    std::fs::write(&path, "[estimate]\nintervals = 4000\n\n[workers]\ncount = 2\n").unwrap();

    let output = piquad(&["-c", path.to_str().unwrap(), "-w", "3"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(parse_row(&stdout_lines(&output)[0]).0, 3);
}

#[test]
fn test_dry_run() {
    let output = piquad(&["-N", "1M", "-w", "2", "--dry-run"]);
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Intervals: 1000000"));
    assert!(stdout.contains("Dry run mode"));
}

#[test]
fn test_invalid_input_fails() {
    assert!(!piquad(&["-N", "0"]).status.success());
    assert!(!piquad(&["-w", "0"]).status.success());
    assert!(!piquad(&["--summation", "pairwise"]).status.success());
    assert!(!piquad(&["--rank", "1"]).status.success());
}

#[test]
#[cfg(not(feature = "mpi"))]
fn test_mpi_launcher_needs_feature() {
    let output = piquad(&["-N", "1000", "--launcher", "mpi"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("`mpi` feature"));
}
