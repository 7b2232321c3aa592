use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn diff_shows_changes_against_base_text() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("policy-merge"));
    cmd.arg("diff")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .arg(fixture("fixtures/fingerprint_web_b.yaml"))
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(" # Baseline for the web tier"))
        .stdout(predicate::str::contains("-  latestTimestamp: 1700000000"))
        .stdout(predicate::str::contains("+  latestTimestamp: 1700000500"))
        .stdout(predicate::str::contains("+    - name: curl"))
        .stdout(predicate::str::contains("+        - hooks.stripe.com"))
        .stdout(predicate::str::contains("added="));
}

#[test]
fn diff_of_identical_documents_is_all_context() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("policy-merge"));
    cmd.arg("diff")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .arg(fixture("fixtures/fingerprint_web_a.yaml"))
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("added=0 removed=0"))
        .stdout(predicate::str::contains("\n+").not())
        .stdout(predicate::str::contains("\n-").not());
}

#[test]
fn diff_fails_on_missing_file() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("policy-merge"));
    cmd.arg("diff")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .arg(fixture("fixtures/does_not_exist.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn diff_json_output_tags_each_line() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("policy-merge"))
        .arg("diff")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .arg(fixture("fixtures/fingerprint_web_b.yaml"))
        .arg("--format")
        .arg("json")
        .output()
        .expect("run diff");
    assert!(output.status.success());

    let lines: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json diff");
    let lines = lines.as_array().expect("array");
    assert_eq!(lines[0]["type"], "context");
    assert_eq!(lines[0]["text"], "# Baseline for the web tier, generated from node-a fingerprints.");
    assert!(lines
        .iter()
        .any(|line| line["type"] == "added" && line["text"] == "  latestTimestamp: 1700000500"));
    assert!(lines
        .iter()
        .any(|line| line["type"] == "removed" && line["text"] == "  latestTimestamp: 1700000000"));
}
