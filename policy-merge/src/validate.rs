//! Profile-driven validation of policy documents.
//!
//! The merge engine treats validity as advisory; this module supplies the
//! [`Validator`] it consults and a report for the `validate` command.

use policy_merge_core::{BuildError, Direction, NetworkNodeList, ProcessNodeList, Validator};
use serde::Serialize;
use serde_yaml::Value;

use crate::profile::ValidationProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub kind: Option<String>,
    pub profiles_source: String,
    pub errors: usize,
    pub warnings: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }
}

pub fn build_validation_report(
    document: &Value,
    profile: &ValidationProfile,
    profiles_source: &str,
) -> ValidationReport {
    let kind = document
        .get("kind")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut issues = Vec::new();
    if !document.is_mapping() {
        issues.push(err("not_a_mapping", "document root must be a mapping"));
    } else {
        issues.extend(profile_issues(document, kind.as_deref(), profile));
        issues.extend(policy_issues(document));
    }

    let errors = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    let warnings = issues.len() - errors;
    ValidationReport {
        kind,
        profiles_source: profiles_source.to_string(),
        errors,
        warnings,
        issues,
    }
}

pub fn render_validation_text(report: &ValidationReport, verbose: bool) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "validate kind={}",
        report.kind.as_deref().unwrap_or("none")
    ));
    if verbose {
        out.push(format!("Using profiles: {}", report.profiles_source));
    }
    out.push(format!(
        "result errors={} warnings={}",
        report.errors, report.warnings
    ));
    out.push("issues".to_string());
    if report.issues.is_empty() {
        out.push("- none".to_string());
        return out.join("\n");
    }
    for issue in &report.issues {
        let sev = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        out.push(format!("- [{sev}] {}: {}", issue.code, issue.message));
    }
    out.join("\n")
}

/// [`Validator`] backed by a validation profile; warnings do not fail.
#[derive(Debug, Clone)]
pub struct ProfileValidator {
    profile: ValidationProfile,
}

impl ProfileValidator {
    pub fn new(profile: ValidationProfile) -> Self {
        Self { profile }
    }
}

impl Validator for ProfileValidator {
    fn validate(&self, document: &Value) -> bool {
        build_validation_report(document, &self.profile, "").is_valid()
    }
}

fn profile_issues(
    document: &Value,
    kind: Option<&str>,
    profile: &ValidationProfile,
) -> Vec<ValidationIssue> {
    let mut out = Vec::new();
    if let Some(kind) = kind {
        if !profile.allowed_kinds.is_empty() && !profile.allowed_kinds.iter().any(|k| k == kind) {
            out.push(err("unknown_kind", &format!("kind '{kind}' is not allowed")));
        }
    }

    let rules = kind.and_then(|k| profile.kind(k));
    let required = profile
        .required_fields
        .iter()
        .chain(rules.into_iter().flat_map(|r| r.required_fields.iter()));
    for path in required {
        if lookup(document, path).is_none() {
            out.push(err(
                "missing_required_field",
                &format!("required field '{path}' is missing"),
            ));
        }
    }

    let Some(rules) = rules else {
        return out;
    };
    if !rules.required_any_fields.is_empty()
        && !rules
            .required_any_fields
            .iter()
            .any(|path| lookup(document, path).is_some())
    {
        out.push(err(
            "missing_selector",
            &format!("one of {} is required", rules.required_any_fields.join(", ")),
        ));
    }
    if !rules.allowed_modes.is_empty() {
        if let Some(mode) = lookup(document, "spec.mode").and_then(Value::as_str) {
            if !rules.allowed_modes.iter().any(|m| m == mode) {
                out.push(err("invalid_mode", &format!("mode '{mode}' is not allowed")));
            }
        }
    }
    out
}

fn policy_issues(document: &Value) -> Vec<ValidationIssue> {
    let mut out = Vec::new();
    let processes = match lookup(document, "spec.processPolicy") {
        None => None,
        Some(value) => match ProcessNodeList::from_value(value) {
            Ok(list) => {
                if list.is_empty() {
                    out.push(warn("empty_process_policy", "processPolicy has no nodes"));
                }
                Some(list)
            }
            Err(e) => {
                out.push(build_issue("invalid_process_policy", &e));
                None
            }
        },
    };

    for direction in [Direction::Ingress, Direction::Egress] {
        let path = format!("spec.networkPolicy.{}", direction.field());
        let Some(value) = lookup(document, &path) else {
            continue;
        };
        let rules = match NetworkNodeList::from_value(value, direction) {
            Ok(rules) => rules,
            Err(e) => {
                out.push(build_issue("invalid_network_policy", &e));
                continue;
            }
        };
        let Some(processes) = &processes else {
            continue;
        };
        for id in rules.nodes.iter().flat_map(|rule| rule.processes.iter()) {
            if processes.get(id).is_none() {
                out.push(warn(
                    "dangling_process_reference",
                    &format!("{} rule references unknown process '{id}'", direction.field()),
                ));
            }
        }
    }
    out
}

/// Follow a dot-separated path of mapping keys; `null` counts as missing.
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, key| value.get(key))
        .filter(|value| !value.is_null())
}

fn build_issue(code: &str, error: &BuildError) -> ValidationIssue {
    err(code, &error.to_string())
}

fn err(code: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        severity: Severity::Error,
        code: code.to_string(),
        message: message.to_string(),
    }
}

fn warn(code: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        severity: Severity::Warning,
        code: code.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_validation_report, render_validation_text, ProfileValidator};
    use crate::profile::default_profile;
    use policy_merge_core::Validator;
    use serde_yaml::Value;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).expect("yaml")
    }

    const POLICY: &str = r#"
apiVersion: spyderbat/v1
kind: SpyderbatPolicy
metadata: {name: web, type: container}
spec:
  mode: audit
  containerSelector: {image: nginx}
  processPolicy:
  - {name: nginx, exe: [/usr/sbin/nginx], id: nginx_0, euser: [root]}
  networkPolicy:
    ingress: []
    egress:
    - {to: [{dnsSelector: [x.io]}], processes: [nginx_0, ghost_0], ports: [{port: 443}]}
  response: {default: [], actions: []}
"#;

    #[test]
    fn valid_policy_has_only_warnings() {
        let report = build_validation_report(&doc(POLICY), &default_profile(), "embedded");
        assert_eq!(report.errors, 0);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.issues[0].code, "dangling_process_reference");
        assert!(ProfileValidator::new(default_profile()).validate(&doc(POLICY)));
    }

    #[test]
    fn missing_fields_and_bad_mode_are_errors() {
        let broken = POLICY
            .replace("mode: audit", "mode: block")
            .replace("  response: {default: [], actions: []}\n", "")
            .replace("  containerSelector: {image: nginx}\n", "");
        let report = build_validation_report(&doc(&broken), &default_profile(), "embedded");
        let codes: Vec<&str> = report.issues.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"missing_required_field"));
        assert!(codes.contains(&"missing_selector"));
        assert!(codes.contains(&"invalid_mode"));
        assert!(!report.is_valid());
    }

    #[test]
    fn malformed_process_policy_is_an_error() {
        let broken = POLICY.replace(", euser: [root]", "");
        let report = build_validation_report(&doc(&broken), &default_profile(), "embedded");
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == "invalid_process_policy" && i.message.contains("nginx_0")));
    }

    #[test]
    fn text_report_lists_issues() {
        let report = build_validation_report(&doc("kind: Other"), &default_profile(), "embedded");
        let text = render_validation_text(&report, true);
        assert!(text.starts_with("validate kind=Other"));
        assert!(text.contains("Using profiles: embedded"));
        assert!(text.contains("- [error] unknown_kind: kind 'Other' is not allowed"));
    }
}
