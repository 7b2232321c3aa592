use colored::Colorize;
use policy_merge_core::{format_diff, format_summary, DiffLine};

/// Render diff lines for terminal output.
pub fn render_diff(lines: &[DiffLine], color: bool) -> String {
    let raw = format_diff(lines);
    if !color {
        return raw;
    }

    let mut out = Vec::new();
    for line in raw.lines() {
        let colored = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }
    out.join("\n")
}

/// Render summary counts for terminal output.
pub fn render_summary(lines: &[DiffLine], color: bool) -> String {
    let summary = format_summary(lines);
    if color {
        summary.cyan().to_string()
    } else {
        summary
    }
}
