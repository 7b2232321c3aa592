use crate::diff::DiffLine;

/// Format diff lines as JSON.
pub fn format_json(lines: &[DiffLine]) -> String {
    serde_json::to_string_pretty(lines).unwrap_or_else(|_| "[]".to_string())
}
