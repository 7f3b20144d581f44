//! Integration tests that run the lobster binary

mod common;

use common::{create_temp_project, lobster_bin};
use indoc::indoc;

#[test]
fn test_report_command_writes_report() {
    let project = create_temp_project();

    let output = lobster_bin(project.path())
        .arg("report")
        .output()
        .expect("Failed to run lobster");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "report should succeed: {stderr}");

    // Reference problems are reported but do not fail the run
    assert!(
        stderr.contains("unknown tracing target req brakes.nope"),
        "Should report the unknown target: {stderr}"
    );
    assert!(stderr.contains("tests/test_abs.cpp:40"), "{stderr}");

    let report = std::fs::read_to_string(project.path().join("report.lobster"))
        .expect("report.lobster should be written");
    let value: serde_json::Value = serde_json::from_str(&report).expect("valid JSON");
    assert_eq!(value["schema"], "lobster-report");
    assert_eq!(value["version"], 2);
    assert_eq!(value["levels"].as_array().unwrap().len(), 3);
}

#[test]
fn test_report_command_custom_paths() {
    let project = create_temp_project();
    std::fs::rename(
        project.path().join("lobster.conf"),
        project.path().join("policy.conf"),
    )
    .unwrap();

    let output = lobster_bin(project.path())
        .args(["report", "--lobster-config", "policy.conf", "--out", "out.json"])
        .output()
        .expect("Failed to run lobster");

    assert!(output.status.success());
    assert!(project.path().join("out.json").exists());
    assert!(!project.path().join("report.lobster").exists());
}

#[test]
fn test_report_command_fails_on_bad_policy() {
    let project = create_temp_project();
    std::fs::write(
        project.path().join("lobster.conf"),
        indoc! {r#"
            requirements "Req" {
              source: "reqs.lobster";
            }
            implementation "Code" {
              source: "code.lobster";
              trace to: "Requirement";
            }
        "#},
    )
    .unwrap();

    let output = lobster_bin(project.path())
        .arg("report")
        .output()
        .expect("Failed to run lobster");

    assert!(!output.status.success(), "bad policy must fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lobster.conf:6:13"), "{stderr}");
    assert!(stderr.contains("unknown trace target level 'Requirement'"), "{stderr}");
    assert!(!project.path().join("report.lobster").exists());
}

#[test]
fn test_status_command() {
    let project = create_temp_project();
    let built = lobster_bin(project.path()).arg("report").output().unwrap();
    assert!(built.status.success());

    let output = lobster_bin(project.path())
        .arg("status")
        .output()
        .expect("Failed to run lobster");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("System Requirements"), "{stdout}");
    assert!(stdout.contains("(2/3 items)"), "{stdout}");
    assert!(stdout.contains("gtest Brakes.Orphan"), "{stdout}");
    assert!(stdout.contains("missing up reference"), "{stdout}");
}

#[test]
fn test_status_check_threshold() {
    let project = create_temp_project();
    let built = lobster_bin(project.path()).arg("report").output().unwrap();
    assert!(built.status.success());

    let strict = lobster_bin(project.path())
        .args(["status", "--check"])
        .output()
        .unwrap();
    assert!(!strict.status.success(), "incomplete tracing must fail --check");

    let lenient = lobster_bin(project.path())
        .args(["status", "--check", "--threshold", "50"])
        .output()
        .unwrap();
    assert!(lenient.status.success());
}

#[test]
fn test_status_json_format() {
    let project = create_temp_project();
    let built = lobster_bin(project.path()).arg("report").output().unwrap();
    assert!(built.status.success());

    let output = lobster_bin(project.path())
        .args(["status", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("status JSON");
    assert_eq!(value["passing"], false);
    assert_eq!(value["levels"][2]["name"], "Unit Tests");
    assert_eq!(value["levels"][2]["coverage_percent"], 50.0);
}

#[test]
fn test_status_json_passing_matches_exit_code() {
    let project = create_temp_project();
    let built = lobster_bin(project.path()).arg("report").output().unwrap();
    assert!(built.status.success());

    for (threshold, expected) in [("50", true), ("100", false)] {
        let output = lobster_bin(project.path())
            .args(["status", "--format", "json", "--check", "--threshold", threshold])
            .output()
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("status JSON");
        assert_eq!(value["passing"], expected, "threshold {threshold}");
        assert_eq!(output.status.success(), expected, "threshold {threshold}");
    }
}

#[test]
fn test_status_rejects_foreign_schema() {
    let project = create_temp_project();
    std::fs::write(
        project.path().join("report.lobster"),
        r#"{"schema": "wrong-schema", "version": 2, "generator": "x",
            "levels": [], "policy": {}, "matrix": []}"#,
    )
    .unwrap();

    let output = lobster_bin(project.path()).arg("status").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown schema kind wrong-schema"), "{stderr}");
}
