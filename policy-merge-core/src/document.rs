//! Document loading, serialization, and the validity collaborator.

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors that can occur while loading a policy document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read the input file.
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    /// Input text is not valid YAML (JSON is accepted as a YAML subset).
    #[error("failed to parse document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The document root is not a mapping.
    #[error("document root must be a mapping")]
    NotAMapping,
}

/// A parsed document together with the text it was parsed from.
///
/// The text is kept verbatim so diffs can be anchored to the original
/// layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub value: Value,
    pub text: String,
}

impl Document {
    /// Build a document from an in-memory value, serializing it for anchoring.
    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        if !value.is_mapping() {
            return Err(LoadError::NotAMapping);
        }
        let text = serde_yaml::to_string(&value)?;
        Ok(Self { value, text })
    }

    /// Original text split into lines, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        self.text.lines().map(ToString::to_string).collect()
    }
}

/// Parse a YAML or JSON document.
pub fn load_str(text: &str) -> Result<Document, LoadError> {
    let value: Value = serde_yaml::from_str(text)?;
    if !value.is_mapping() {
        return Err(LoadError::NotAMapping);
    }
    Ok(Document {
        value,
        text: text.to_string(),
    })
}

/// Read and parse a YAML or JSON document from `path`.
pub fn load_file(path: &Path) -> Result<Document, LoadError> {
    let text = fs::read_to_string(path)?;
    load_str(&text)
}

/// Serialize `value` as block YAML lines indented by `indent` spaces.
pub fn serialize_lines(value: &Value, indent: usize) -> Vec<String> {
    let raw = match serde_yaml::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            // Values built from parsed YAML always serialize.
            tracing::warn!(error = %e, "failed to serialize value for display");
            return Vec::new();
        }
    };
    let pad = " ".repeat(indent);
    raw.lines()
        .filter(|line| *line != "---")
        .map(|line| format!("{pad}{line}"))
        .collect()
}

/// Serialize a single `key: value` entry at `indent`.
pub fn serialize_entry(key: &Value, value: &Value, indent: usize) -> Vec<String> {
    let mut entry = Mapping::new();
    entry.insert(key.clone(), value.clone());
    serialize_lines(&Value::Mapping(entry), indent)
}

/// Serialize `value` as one sequence item (`- ...`) at `indent`.
pub fn serialize_item(value: &Value, indent: usize) -> Vec<String> {
    serialize_lines(&Value::Sequence(vec![value.clone()]), indent)
}

/// External validity predicate consulted by `MergeObject::is_valid_obj`.
pub trait Validator {
    /// Return `true` when `document` is acceptable as a final policy.
    fn validate(&self, document: &Value) -> bool;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> bool,
{
    fn validate(&self, document: &Value) -> bool {
        self(document)
    }
}

/// Validator that accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _document: &Value) -> bool {
        true
    }
}
