//! Integration tests for `msalign evaluate` and `msalign resolve`.
#![allow(clippy::expect_used)]

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Path to the compiled `msalign` binary.
fn msalign_bin() -> PathBuf {
    let mut path = std::env::current_exe().expect("current exe");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("msalign");
    path
}

/// Path to a shared fixture file.
fn fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../../tests/fixtures");
    path.push(name);
    path.to_str().expect("path").to_owned()
}

fn json_of(out: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).expect("stdout is JSON")
}

fn close(value: &serde_json::Value, expected: f64) -> bool {
    value
        .as_f64()
        .is_some_and(|v| (v - expected).abs() < 1e-6)
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

#[test]
fn evaluate_reference_scores_perfectly() {
    let out = Command::new(msalign_bin())
        .args([
            "evaluate",
            &fixture("animals.track.json"),
            &fixture("animals.reference.json"),
            "-f",
            "json",
        ])
        .output()
        .expect("run msalign evaluate");
    assert!(out.status.success(), "exit code: {:?}", out.status.code());
    let report = json_of(&out);
    let records = report["per_test_case"].as_array().expect("records");
    assert_eq!(records.len(), 3);
    for record in records {
        assert!(close(&record["f1"], 1.0), "{record}");
        assert_eq!(record["covered"], true);
    }
    assert!(close(&report["micro"]["f1"], 1.0));
    assert!(close(&report["macro"]["f1"], 1.0));
}

#[test]
fn evaluate_partial_alignment_from_stdin() {
    let partial = std::fs::read(fixture("animals.partial.json")).expect("fixture");
    let mut child = Command::new(msalign_bin())
        .args(["evaluate", &fixture("animals.track.json"), "-", "-f", "json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn msalign evaluate");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(&partial)
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait");
    assert!(out.status.success(), "exit code: {:?}", out.status.code());

    let report = json_of(&out);
    let counts = &report["micro"]["counts"];
    assert_eq!(counts["true_positive"], 4);
    assert_eq!(counts["false_positive"], 1);
    assert_eq!(counts["false_negative"], 6);
    assert!(close(&report["micro"]["precision"], 0.8));
    assert!(close(&report["micro"]["recall"], 0.4));

    let farm_vet = report["per_test_case"]
        .as_array()
        .expect("records")
        .iter()
        .find(|r| r["test_case"] == "farm-vet")
        .expect("farm-vet");
    assert!(close(&farm_vet["f1"], 8.0 / 9.0), "{farm_vet}");

    let ambiguous = report["ambiguous"].as_object().expect("ambiguous");
    assert!(ambiguous.contains_key("farm-zoo"));
    assert!(ambiguous.contains_key("zoo-vet"));
}

#[test]
fn evaluate_human_marks_uncovered_test_cases() {
    let out = Command::new(msalign_bin())
        .args([
            "evaluate",
            &fixture("animals.track.json"),
            &fixture("animals.partial.json"),
        ])
        .output()
        .expect("run msalign evaluate");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("farm-zoo"), "stdout: {stdout}");
    assert!(stdout.contains("(not covered)"), "stdout: {stdout}");
    assert!(stdout.contains("micro"), "stdout: {stdout}");
    assert!(stdout.contains("one-sided:"), "stdout: {stdout}");
}

#[test]
fn evaluate_macro_divisor_changes_macro_scores() {
    let run = |divisor: &str| {
        let out = Command::new(msalign_bin())
            .args([
                "evaluate",
                &fixture("animals.track.json"),
                &fixture("animals.partial.json"),
                "--macro-divisor",
                divisor,
                "-f",
                "json",
            ])
            .output()
            .expect("run msalign evaluate");
        assert!(out.status.success());
        json_of(&out)["macro"]["f1"].as_f64().expect("f1")
    };
    let non_empty = run("non-empty");
    let fixed = run("6");
    assert!(fixed < non_empty, "{fixed} vs {non_empty}");
}

#[test]
fn evaluate_malformed_alignment_exits_2() {
    let mut bad = tempfile::NamedTempFile::new().expect("temp file");
    bad.write_all(b"[{\"entity_one\": 1}]").expect("write");
    let out = Command::new(msalign_bin())
        .args([
            "evaluate",
            &fixture("animals.track.json"),
            bad.path().to_str().expect("path"),
        ])
        .output()
        .expect("run msalign evaluate");
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("not a valid alignment"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[test]
fn resolve_prints_namespace_datasets() {
    let out = Command::new(msalign_bin())
        .args(["resolve", &fixture("animals.track.json")])
        .output()
        .expect("run msalign resolve");
    assert!(out.status.success(), "exit code: {:?}", out.status.code());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("farm-zoo: http://farm.example.com/ontology/ -> http://zoo.example.com/ontology/"),
        "stdout: {stdout}"
    );
}

#[test]
fn resolve_with_url_pattern() {
    let out = Command::new(msalign_bin())
        .args([
            "resolve",
            &fixture("animals.track.json"),
            "--dataset-pattern",
            r"^https?://([^./]+)\.",
            "-f",
            "json",
        ])
        .output()
        .expect("run msalign resolve");
    assert!(out.status.success(), "exit code: {:?}", out.status.code());
    let resolved = json_of(&out);
    assert_eq!(resolved["sources"][0]["dataset"], "farm");
    assert_eq!(resolved["sources"][1]["dataset"], "zoo");
    assert_eq!(resolved["test_cases"][2]["name"], "zoo-vet");
    assert_eq!(resolved["test_cases"][2]["target"], "vet");
}

#[test]
fn resolve_unresolvable_source_exits_2() {
    let mut track = tempfile::NamedTempFile::new().expect("temp file");
    track
        .write_all(br#"{"name": "empty", "sources": [{"label": "a"}, {"label": "b"}]}"#)
        .expect("write");
    let out = Command::new(msalign_bin())
        .args(["resolve", track.path().to_str().expect("path")])
        .output()
        .expect("run msalign resolve");
    assert_eq!(out.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("(unresolved)"), "stdout: {stdout}");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("a, b"), "stderr: {stderr}");
}

#[test]
fn resolve_bad_pattern_exits_2() {
    let out = Command::new(msalign_bin())
        .args([
            "resolve",
            &fixture("animals.track.json"),
            "--dataset-pattern",
            "(",
        ])
        .output()
        .expect("run msalign resolve");
    assert_eq!(out.status.code(), Some(2));
}
