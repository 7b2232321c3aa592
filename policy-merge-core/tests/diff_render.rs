use std::path::PathBuf;

use policy_merge_core::{
    default_schemas, format_summary, load_file, AcceptAll, DiffLine, DiffSummary, MergeObject,
};
use pretty_assertions::assert_eq;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn baseline() -> MergeObject {
    let doc = load_file(&fixture("fixtures/baseline_web.yaml")).expect("baseline parse");
    MergeObject::new(doc, default_schemas(), AcceptAll)
}

#[test]
fn unmerged_document_diffs_as_its_own_text() {
    let obj = baseline();
    let lines = obj.diff_lines();
    let original: Vec<&str> = obj.original().text.lines().collect();

    assert_eq!(lines.len(), original.len());
    for (line, text) in lines.iter().zip(&original) {
        assert_eq!(line, &DiffLine::Context((*text).to_string()));
    }
    assert!(DiffSummary::from_lines(&lines).is_clean());
}

#[test]
fn merged_fingerprint_renders_line_accurate_changes() {
    let mut obj = baseline();
    let incoming = load_file(&fixture("fixtures/fingerprint_web_b.yaml")).expect("fingerprint");
    obj.asymmetric_merge(&incoming).expect("merge");

    let diff = obj.get_diff();
    for expected in [
        "-  latestTimestamp: 1700000000",
        "+  latestTimestamp: 1700000500",
        "-    image: docker.io/acme/web:1.2",
        "+    image: docker.io/acme/web:1.*",
        "+    - /usr/local/bin/python3.11",
        "+    - name: curl",
        "+      - ipBlock:",
        "+          cidr: 10.0.1.0/24",
        "+        - hooks.stripe.com",
        "+      - curl_0",
    ] {
        assert!(diff.contains(expected), "missing {expected:?} in\n{diff}");
    }
    assert!(diff.starts_with(" # Baseline for the web tier"));
    assert!(diff.contains(" kind: SpyderbatBaseline"));

    let lines = obj.diff_lines();
    let kept: Vec<&str> = lines
        .iter()
        .filter(|line| !matches!(line, DiffLine::Added(_)))
        .map(DiffLine::text)
        .collect();
    let original: Vec<&str> = obj.original().text.lines().collect();
    assert_eq!(kept, original);
}

#[test]
fn summary_counts_changed_lines() {
    let mut obj = baseline();
    let incoming = load_file(&fixture("fixtures/fingerprint_web_b.yaml")).expect("fingerprint");
    obj.asymmetric_merge(&incoming).expect("merge");

    let summary = DiffSummary::from_lines(&obj.diff_lines());
    assert!(summary.added > summary.removed);
    assert!(format_summary(&obj.diff_lines()).starts_with("added="));
}
