use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_yaml::Value;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn policy_merge() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("policy-merge"))
}

#[test]
fn symmetric_merge_prints_generalized_yaml() {
    let output = policy_merge()
        .arg("merge")
        .arg(fixture("fixtures/fingerprint_web_a.yaml"))
        .arg(fixture("fixtures/fingerprint_web_b.yaml"))
        .arg("--symmetric")
        .output()
        .expect("run merge");
    assert!(output.status.success());

    let merged: Value = serde_yaml::from_slice(&output.stdout).expect("yaml output");
    assert_eq!(
        merged["spec"]["containerSelector"]["image"],
        Value::from("docker.io/acme/web:1.*")
    );
    assert!(merged["spec"].get("podSelector").is_none());
    assert_eq!(
        merged["spec"]["networkPolicy"]["egress"]
            .as_sequence()
            .expect("egress")
            .len(),
        1
    );
}

#[test]
fn merge_writes_json_output_file() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("merged.json");

    policy_merge()
        .arg("merge")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .arg(fixture("fixtures/fingerprint_web_b.yaml"))
        .arg("--format")
        .arg("json")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let raw = fs::read_to_string(&out).expect("read output");
    let merged: serde_json::Value = serde_json::from_str(&raw).expect("json output");
    assert_eq!(merged["kind"], "SpyderbatBaseline");
    assert_eq!(merged["spec"]["podSelector"]["matchLabels"]["app"], "web");
    assert_eq!(
        merged["spec"]["networkPolicy"]["egress"]
            .as_array()
            .expect("egress")
            .len(),
        2
    );
}

#[test]
fn merge_refuses_to_overwrite_an_input() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path().join("base.yaml");
    fs::copy(fixture("fixtures/baseline_web.yaml"), &base).expect("copy base");
    let before = fs::read_to_string(&base).expect("read base");

    policy_merge()
        .arg("merge")
        .arg(&base)
        .arg(fixture("fixtures/fingerprint_web_b.yaml"))
        .arg("--output")
        .arg(&base)
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));

    assert_eq!(fs::read_to_string(&base).expect("read base"), before);
}

#[test]
fn merge_reports_malformed_input() {
    let dir = tempdir().expect("tempdir");
    let broken = dir.path().join("broken.yaml");
    fs::write(
        &broken,
        "spec:\n  processPolicy:\n  - name: sh\n    exe: [/bin/sh]\n    id: sh_0\n",
    )
    .expect("write");

    policy_merge()
        .arg("merge")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to merge"))
        .stderr(predicate::str::contains("has no euser"));
}

#[test]
fn merge_warns_when_result_fails_validation() {
    let dir = tempdir().expect("tempdir");
    let profiles = dir.path().join("profiles");
    fs::create_dir(&profiles).expect("mkdir");
    fs::write(
        profiles.join("default.toml"),
        "allowed_kinds = [\"SpyderbatPolicy\"]\n",
    )
    .expect("write profile");

    policy_merge()
        .arg("merge")
        .arg(fixture("fixtures/fingerprint_web_a.yaml"))
        .arg(fixture("fixtures/fingerprint_web_b.yaml"))
        .arg("--profiles-dir")
        .arg(&profiles)
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: merged document does not pass validation"));
}

#[test]
fn merge_requires_another_document() {
    policy_merge()
        .arg("merge")
        .arg(fixture("fixtures/baseline_web.yaml"))
        .assert()
        .failure();
}
