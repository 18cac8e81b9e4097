//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const SNAPSHOT: &str = r#"{
    "workloads": [
        {
            "name": "web",
            "namespace": "shop",
            "replicas": 3,
            "series": {
                "cpu_request": [{"labels": {"container": "app"}, "points": [{"timestamp": 100, "value": 1.0}]}],
                "memory_request": [{"labels": {"container": "app"}, "points": [{"timestamp": 100, "value": 2147483648}]}],
                "cpu_usage": [{"labels": {"container": "app", "pod": "web-a"}, "points": [{"timestamp": 100, "value": 0.2}]}],
                "memory_usage": [{"labels": {"container": "app", "pod": "web-a"}, "points": [{"timestamp": 100, "value": 419430400}]}],
                "autoscaler_cpu": [{"labels": {"container": "app"}, "points": [{"timestamp": 100, "value": 0.25}]}],
                "autoscaler_memory": [{"labels": {"container": "app"}, "points": [{"timestamp": 100, "value": 536870912}]}],
                "pod_count": [
                    {"labels": {"pod": "web-a"}, "points": [{"timestamp": 100, "value": 1}]},
                    {"labels": {"pod": "web-b"}, "points": [{"timestamp": 100, "value": 1}]},
                    {"labels": {"pod": "web-c"}, "points": [{"timestamp": 100, "value": 1}]}
                ]
            }
        },
        {
            "name": "batch",
            "namespace": "jobs",
            "fault": {"error": "unavailable", "message": "backend down"}
        }
    ]
}"#;

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file
}

/// Run the CLI with an empty config file so local settings cannot leak in
fn wra(args: &[&str]) -> Output {
    let config = temp_file(".toml", "");
    let config_path = config.path().to_str().expect("utf-8 path").to_string();

    Command::new("cargo")
        .args(["run", "-q", "-p", "wra-cli", "--", "--config", &config_path])
        .args(args)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "wra-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Workload Resource Advisor"),
        "Should show app name"
    );
    assert!(stdout.contains("analyze"), "Should show analyze command");
    assert!(stdout.contains("costs"), "Should show costs command");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "wra-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("wra"), "Should show binary name");
}

/// Test analyze subcommand help
#[test]
fn test_analyze_help() {
    let output = wra(&["analyze", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "analyze help should succeed");
    assert!(stdout.contains("--project"), "Should show project option");
    assert!(stdout.contains("--snapshot"), "Should show snapshot option");
    assert!(stdout.contains("--time-range"), "Should show time range option");
    assert!(stdout.contains("--no-cache"), "Should show no-cache option");
}

#[test]
fn test_costs_json() {
    let output = wra(&["--format", "json", "costs", "--cpu", "500m", "--memory", "1Gi"]);
    assert!(output.status.success(), "costs should succeed");

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("costs output should be JSON");
    assert_eq!(report["cpu_millicores"], 500);
    assert_eq!(report["memory_bytes"], 1073741824u64);
    assert_eq!(report["monthly_cost"], 14.43);
    assert_eq!(report["currency"], "USD");
}

#[test]
fn test_costs_table_with_replicas() {
    let output = wra(&["costs", "--cpu", "500m", "--memory", "1Gi", "--replicas", "3"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "costs should succeed");
    assert!(stdout.contains("$14.43"), "Should show per-replica cost");
    assert!(stdout.contains("$43.29"), "Should show total cost");
}

#[test]
fn test_costs_rejects_bad_quantity() {
    let output = wra(&["costs", "--cpu", "lots", "--memory", "1Gi"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "invalid quantity should fail");
    assert!(stderr.contains("--cpu"), "Should name the bad option");
}

#[test]
fn test_analyze_snapshot_json() {
    let snapshot = temp_file(".json", SNAPSHOT);
    let snapshot_path = snapshot.path().to_str().expect("utf-8 path");

    let output = wra(&[
        "--format", "json", "analyze", "-p", "proj", "-c", "prod", "-s", snapshot_path,
    ]);
    assert!(
        output.status.success(),
        "analyze should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("analyze output should be JSON");
    let workloads = response["workloads"].as_array().expect("workloads array");
    assert_eq!(workloads.len(), 2);

    let web = &workloads[0];
    assert_eq!(web["name"], "web");
    assert_eq!(web["source"], "autoscaler");
    assert_eq!(web["replica_count"], 3);
    assert_eq!(web["efficiency_score"], 20);
    assert_eq!(web["recommended_request"]["cpu_millicores"], 250);
    assert_eq!(web["recommended_request"]["memory_bytes"], 536870912u64);

    let batch = &workloads[1];
    assert_eq!(batch["name"], "batch");
    assert_eq!(batch["kind"], "unavailable");
    assert!(batch.get("efficiency_score").is_none());
}

#[test]
fn test_analyze_table_shows_failures() {
    let snapshot = temp_file(".json", SNAPSHOT);
    let snapshot_path = snapshot.path().to_str().expect("utf-8 path");

    let output = wra(&["analyze", "-p", "proj", "-c", "prod", "-s", snapshot_path]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "analyze should succeed");
    assert!(stdout.contains("Workload Analysis"));
    assert!(stdout.contains("Failed Workloads"));
    assert!(stdout.contains("backend down"));
    assert!(stdout.contains("1 failed"));
}

#[test]
fn test_analyze_namespace_filter() {
    let snapshot = temp_file(".json", SNAPSHOT);
    let snapshot_path = snapshot.path().to_str().expect("utf-8 path");

    let output = wra(&[
        "--format", "json", "analyze", "-p", "proj", "-c", "prod", "-n", "shop", "-s",
        snapshot_path, "--no-cache",
    ]);
    assert!(output.status.success(), "analyze should succeed");

    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("analyze output should be JSON");
    let workloads = response["workloads"].as_array().expect("workloads array");
    assert_eq!(workloads.len(), 1);
    assert_eq!(workloads[0]["name"], "web");
}

#[test]
fn test_analyze_rejects_bad_time_range() {
    let snapshot = temp_file(".json", SNAPSHOT);
    let snapshot_path = snapshot.path().to_str().expect("utf-8 path");

    let output = wra(&[
        "analyze", "-p", "proj", "-c", "prod", "-s", snapshot_path, "--time-range", "500",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "out of range window should fail");
    assert!(stderr.contains("time range"), "Should explain the error");
}
