use std::ops::AddAssign;

use serde::Serialize;

/// Counters describing what one merge call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Process nodes folded into an existing partner.
    pub merged_nodes: usize,
    /// Process nodes grafted as new subtrees.
    pub grafted_nodes: usize,
    /// Grafted process nodes whose id had to be renamed.
    pub renamed_ids: usize,
    /// Network rules folded into an existing rule.
    pub merged_rules: usize,
    /// Network rules appended as new entries.
    pub appended_rules: usize,
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.merged_nodes += rhs.merged_nodes;
        self.grafted_nodes += rhs.grafted_nodes;
        self.renamed_ids += rhs.renamed_ids;
        self.merged_rules += rhs.merged_rules;
        self.appended_rules += rhs.appended_rules;
    }
}
