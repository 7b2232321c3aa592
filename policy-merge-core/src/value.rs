//! Small accessors over `serde_yaml` values shared by the policy models.

use serde_yaml::{Mapping, Value};

use crate::error::BuildError;

/// Read an optional scalar field as a string.
pub(crate) fn string_field(
    map: &Mapping,
    field: &'static str,
    context: &'static str,
) -> Result<Option<String>, BuildError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_string(value)
            .map(Some)
            .ok_or_else(|| BuildError::InvalidField {
                context,
                field,
                detail: "expected a string".to_string(),
            }),
    }
}

/// Read a string or a sequence of strings, dropping duplicates.
pub(crate) fn string_list(
    value: Option<&Value>,
    context: &'static str,
    field: &'static str,
) -> Result<Vec<String>, BuildError> {
    let invalid = || BuildError::InvalidField {
        context,
        field,
        detail: "expected a string or a list of strings".to_string(),
    };
    let mut out = Vec::new();
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Sequence(items)) => {
            for item in items {
                let item = scalar_string(item).ok_or_else(invalid)?;
                push_unique(&mut out, &item);
            }
        }
        Some(other) => out.push(scalar_string(other).ok_or_else(invalid)?),
    }
    Ok(out)
}

/// Render a scalar as a string; mappings and sequences yield `None`.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Append `item` unless an equal entry is already present.
pub(crate) fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}
