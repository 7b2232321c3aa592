//! Line-anchored diffs between a document's original text and a merged value.
//!
//! The walk follows the original and updated values in lock-step with the
//! original lines, so everything that did not change keeps its original
//! layout, comments included. Values that cannot be anchored (flow style,
//! JSON text) are replaced as a whole.

mod engine;
mod locate;
mod span;

pub use engine::diff_spans;
pub use span::{render, unify_diffs, DiffLine, DiffSpan, SpanKey, SpanKind};

use serde_yaml::Value;

use crate::document::Document;

/// Diff `updated` against `original`, anchored on the original text.
pub fn diff_lines(original: &Document, updated: &Value) -> Vec<DiffLine> {
    let spans = diff_spans(&original.text, &original.value, updated);
    let lines: Vec<&str> = original.text.lines().collect();
    render(&spans, &lines)
}
