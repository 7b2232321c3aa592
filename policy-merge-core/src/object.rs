use std::fmt;

use serde_yaml::Value;

use crate::diff::{self, DiffLine};
use crate::document::{Document, Validator};
use crate::error::{BuildError, MergeError};
use crate::format::format_diff;
use crate::schema::{merge_schema_fields, MergeContext, MergeSchema};
use crate::stats::MergeStats;

/// Anything that can be merged into a [`MergeObject`].
pub trait MergeData {
    /// The document value to merge from.
    fn merge_data(&self) -> &Value;
}

impl MergeData for Value {
    fn merge_data(&self) -> &Value {
        self
    }
}

impl MergeData for Document {
    fn merge_data(&self) -> &Value {
        &self.value
    }
}

impl MergeData for MergeObject {
    fn merge_data(&self) -> &Value {
        &self.obj_data
    }
}

/// A document being merged, together with its original form.
///
/// Merges are computed on a scratch copy and committed only when they
/// succeed, so a failed merge leaves [`MergeObject::obj_data`] untouched.
pub struct MergeObject {
    obj_data: Value,
    original: Document,
    schemas: Vec<MergeSchema>,
    validator: Box<dyn Validator>,
    last_stats: MergeStats,
}

impl MergeObject {
    pub fn new(
        document: Document,
        schemas: Vec<MergeSchema>,
        validator: impl Validator + 'static,
    ) -> Self {
        Self {
            obj_data: document.value.clone(),
            original: document,
            schemas,
            validator: Box::new(validator),
            last_stats: MergeStats::default(),
        }
    }

    /// Widen both sides toward a common generalization.
    pub fn symmetric_merge<T: MergeData + ?Sized>(&mut self, other: &T) -> Result<(), MergeError> {
        self.merge(other.merge_data(), true)
    }

    /// Widen this document so it also covers `other`.
    pub fn asymmetric_merge<T: MergeData + ?Sized>(&mut self, other: &T) -> Result<(), MergeError> {
        self.merge(other.merge_data(), false)
    }

    fn merge(&mut self, other: &Value, symmetric: bool) -> Result<(), MergeError> {
        let theirs = other.as_mapping().ok_or_else(not_a_mapping)?;
        let mut working = self.obj_data.clone();
        let ours = working.as_mapping_mut().ok_or_else(not_a_mapping)?;

        let mut ctx = MergeContext::new();
        merge_schema_fields(&mut ctx, ours, theirs, &self.schemas, symmetric)?;

        self.obj_data = working;
        self.last_stats = ctx.stats();
        tracing::debug!(symmetric, stats = ?self.last_stats, "merged document");
        Ok(())
    }

    /// Ask the validator whether the current document is acceptable.
    pub fn is_valid_obj(&self) -> bool {
        self.validator.validate(&self.obj_data)
    }

    pub fn obj_data(&self) -> &Value {
        &self.obj_data
    }

    pub fn into_obj_data(self) -> Value {
        self.obj_data
    }

    pub fn original(&self) -> &Document {
        &self.original
    }

    /// Counters from the most recent successful merge.
    pub fn last_stats(&self) -> MergeStats {
        self.last_stats
    }

    /// Diff of the current document against the original, as text.
    pub fn get_diff(&self) -> String {
        format_diff(&self.diff_lines())
    }

    /// Diff of the current document against the original, line by line.
    pub fn diff_lines(&self) -> Vec<DiffLine> {
        diff::diff_lines(&self.original, &self.obj_data)
    }
}

impl fmt::Debug for MergeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeObject")
            .field("obj_data", &self.obj_data)
            .field("schemas", &self.schemas.len())
            .field("last_stats", &self.last_stats)
            .finish_non_exhaustive()
    }
}

fn not_a_mapping() -> MergeError {
    MergeError::Build(BuildError::InvalidField {
        context: "document",
        field: "root",
        detail: "expected a mapping".to_string(),
    })
}
