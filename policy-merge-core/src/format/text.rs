use serde::Serialize;

use crate::diff::DiffLine;

/// Format diff lines with ` `, `-` and `+` prefixes.
pub fn format_diff(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .map(|line| match line {
            DiffLine::Context(text) => format!(" {text}"),
            DiffLine::Removed(text) => format!("-{text}"),
            DiffLine::Added(text) => format!("+{text}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line counts of a rendered diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn from_lines(lines: &[DiffLine]) -> Self {
        let mut summary = Self::default();
        for line in lines {
            match line {
                DiffLine::Context(_) => summary.unchanged += 1,
                DiffLine::Removed(_) => summary.removed += 1,
                DiffLine::Added(_) => summary.added += 1,
            }
        }
        summary
    }

    /// `true` when the diff changes nothing.
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Format a one-line summary of diff counts.
pub fn format_summary(lines: &[DiffLine]) -> String {
    let DiffSummary {
        added,
        removed,
        unchanged,
    } = DiffSummary::from_lines(lines);
    format!("added={added} removed={removed} unchanged={unchanged}")
}

#[cfg(test)]
mod tests {
    use super::{format_diff, format_summary, DiffSummary};
    use crate::diff::DiffLine;

    #[test]
    fn prefixes_and_counts() {
        let lines = vec![
            DiffLine::Context("spec:".into()),
            DiffLine::Removed("  mode: audit".into()),
            DiffLine::Added("  mode: enforce".into()),
        ];
        assert_eq!(format_diff(&lines), " spec:\n-  mode: audit\n+  mode: enforce");
        assert_eq!(format_summary(&lines), "added=1 removed=1 unchanged=1");
        assert!(!DiffSummary::from_lines(&lines).is_clean());
        assert!(DiffSummary::from_lines(&lines[..1]).is_clean());
    }
}
