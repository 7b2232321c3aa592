//! Declarative merge schemas.
//!
//! A [`MergeSchema`] describes one mapping field of a document: which child
//! fields are merged by which [`MergeFunction`], which child fields are
//! nested schemas, and how the field behaves when one side lacks it.
//! Fields not declared by a schema are stripped from the merged output.

use serde_yaml::{Mapping, Value};

use crate::error::MergeError;
use crate::network::{Direction, NetworkNodeList};
use crate::process::ProcessNodeList;
use crate::stats::MergeStats;
use crate::wildcard::generalize;

/// How one field's two values are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeFunction {
    /// Generalize two strings into one `*` pattern; drops the field on failure.
    Wildcard,
    /// Keep the base value.
    KeepBase,
    /// Keep the larger number or later string (timestamps).
    GreatestValue,
    /// Keep the value only when both sides agree.
    AllEqual,
    /// Union two lists, keeping base order.
    UniqueList,
    /// Merge process trees.
    ProcessPolicy,
    /// Merge ingress or egress rules against the merged process trees.
    NetworkRules(Direction),
}

impl MergeFunction {
    /// Combine `base` and `other`; `None` means the field does not survive.
    ///
    /// An absent side never reaches the individual functions: an asymmetric
    /// merge keeps the base when `other` is absent and drops the field when
    /// the base is absent; a symmetric merge drops the field when either
    /// side is absent.
    pub fn apply(
        self,
        ctx: &mut MergeContext,
        base: Option<&Value>,
        other: Option<&Value>,
        symmetric: bool,
    ) -> Result<Option<Value>, MergeError> {
        let (base, other) = match (present(base), present(other)) {
            (Some(base), Some(other)) => (base, other),
            (Some(base), None) if !symmetric => return Ok(Some(base.clone())),
            _ => return Ok(None),
        };

        match self {
            MergeFunction::Wildcard => Ok(wildcard_merge(base, other)),
            MergeFunction::KeepBase => Ok(Some(base.clone())),
            MergeFunction::GreatestValue => Ok(Some(greatest_value(base, other).clone())),
            MergeFunction::AllEqual => Ok((base == other).then(|| base.clone())),
            MergeFunction::UniqueList => Ok(Some(unique_list(base, other))),
            MergeFunction::ProcessPolicy => ctx.merge_processes(base, other, symmetric).map(Some),
            MergeFunction::NetworkRules(direction) => ctx
                .merge_network(base, other, direction, symmetric)
                .map(Some),
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn wildcard_merge(base: &Value, other: &Value) -> Option<Value> {
    match (base.as_str(), other.as_str()) {
        (Some(ours), Some(theirs)) => generalize(&[ours, theirs]).map(Value::from),
        _ => (base == other).then(|| base.clone()),
    }
}

fn greatest_value<'a>(base: &'a Value, other: &'a Value) -> &'a Value {
    match (base, other) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) if b > a => other,
            _ => base,
        },
        (Value::String(a), Value::String(b)) if b > a => other,
        _ => base,
    }
}

fn unique_list(base: &Value, other: &Value) -> Value {
    match (base, other) {
        (Value::Sequence(ours), Value::Sequence(theirs)) => {
            let mut merged = ours.clone();
            for item in theirs {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Value::Sequence(merged)
        }
        _ => base.clone(),
    }
}

/// State shared by the merge functions of one top-level merge call.
///
/// The process trees merged for `processPolicy` are kept here so the network
/// rules merged afterwards can resolve their process references.
#[derive(Debug, Default)]
pub struct MergeContext {
    base_procs: Option<ProcessNodeList>,
    other_procs: Option<ProcessNodeList>,
    stats: MergeStats,
}

impl MergeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    fn merge_processes(
        &mut self,
        base: &Value,
        other: &Value,
        symmetric: bool,
    ) -> Result<Value, MergeError> {
        let mut ours = ProcessNodeList::from_value(base)?;
        let mut theirs = ProcessNodeList::from_value(other)?;
        let stats = if symmetric {
            ours.symmetric_merge(&mut theirs)?
        } else {
            ours.asymmetric_merge(&mut theirs)?
        };
        self.stats += stats;
        let merged = ours.to_value();
        self.base_procs = Some(ours);
        self.other_procs = Some(theirs);
        Ok(merged)
    }

    fn merge_network(
        &mut self,
        base: &Value,
        other: &Value,
        direction: Direction,
        symmetric: bool,
    ) -> Result<Value, MergeError> {
        let mut ours = NetworkNodeList::from_value(base, direction)?;
        let theirs = NetworkNodeList::from_value(other, direction)?;
        let (base_procs, other_procs) = (self.base_procs.as_ref(), self.other_procs.as_ref());
        let stats = if symmetric {
            ours.symmetric_merge(&theirs, base_procs, other_procs)?
        } else {
            ours.asymmetric_merge(&theirs, base_procs, other_procs)?
        };
        self.stats += stats;
        Ok(ours.to_value())
    }
}

/// Merge rules for one mapping field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSchema {
    pub field: &'static str,
    pub sub_schemas: Vec<MergeSchema>,
    pub merge_functions: Vec<(&'static str, MergeFunction)>,
    /// Drop the field when nothing survives the merge.
    pub values_required: bool,
    /// Selectors present on only one side are dropped by symmetric merges.
    pub is_selector: bool,
}

impl MergeSchema {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            sub_schemas: Vec::new(),
            merge_functions: Vec::new(),
            values_required: false,
            is_selector: false,
        }
    }

    /// Selector schema: values required, dropped when one-sided in symmetric merges.
    pub fn selector(field: &'static str) -> Self {
        Self {
            values_required: true,
            is_selector: true,
            ..Self::new(field)
        }
    }

    #[must_use]
    pub fn merge(mut self, field: &'static str, function: MergeFunction) -> Self {
        self.merge_functions.push((field, function));
        self
    }

    #[must_use]
    pub fn sub(mut self, schema: MergeSchema) -> Self {
        self.sub_schemas.push(schema);
        self
    }

    #[must_use]
    pub fn values_required(mut self) -> Self {
        self.values_required = true;
        self
    }

    fn declares(&self, field: &str) -> bool {
        self.merge_functions.iter().any(|(name, _)| *name == field)
            || self.sub_schemas.iter().any(|sub| sub.field == field)
    }
}

/// Schema table for baselines and policies.
///
/// Merge functions run before nested schemas, so `processPolicy` is always
/// merged before the `networkPolicy` rules that reference it.
pub fn default_schemas() -> Vec<MergeSchema> {
    use MergeFunction::{AllEqual, GreatestValue, KeepBase, NetworkRules, ProcessPolicy, Wildcard};

    vec![
        MergeSchema::new("metadata")
            .merge("name", KeepBase)
            .merge("type", KeepBase)
            .merge("uid", KeepBase)
            .merge("latestTimestamp", GreatestValue),
        MergeSchema::new("spec")
            .merge("enabled", KeepBase)
            .merge("mode", KeepBase)
            .merge("processPolicy", ProcessPolicy)
            .merge("response", KeepBase)
            .sub(
                MergeSchema::selector("containerSelector")
                    .merge("image", Wildcard)
                    .merge("imageID", Wildcard)
                    .merge("containerName", Wildcard)
                    .merge("containerID", Wildcard),
            )
            .sub(MergeSchema::selector("serviceSelector").merge("cgroup", Wildcard))
            .sub(
                MergeSchema::selector("machineSelector")
                    .merge("hostname", Wildcard)
                    .merge("machineUID", Wildcard),
            )
            .sub(
                MergeSchema::selector("podSelector")
                    .merge("matchLabels", AllEqual)
                    .merge("matchExpressions", AllEqual),
            )
            .sub(
                MergeSchema::selector("namespaceSelector")
                    .merge("matchLabels", AllEqual)
                    .merge("matchExpressions", AllEqual),
            )
            .sub(
                MergeSchema::new("networkPolicy")
                    .merge("ingress", NetworkRules(Direction::Ingress))
                    .merge("egress", NetworkRules(Direction::Egress)),
            ),
    ]
}

/// Merge every field declared by `schemas` from `other` into `data`.
pub(crate) fn merge_schema_fields(
    ctx: &mut MergeContext,
    data: &mut Mapping,
    other: &Mapping,
    schemas: &[MergeSchema],
    symmetric: bool,
) -> Result<(), MergeError> {
    for schema in schemas {
        let field = schema.field;
        let theirs = other.get(field).and_then(Value::as_mapping);
        let Some(ours) = data.get_mut(field).and_then(Value::as_mapping_mut) else {
            continue;
        };
        match theirs {
            Some(theirs) => {
                if !merge_subfields(ctx, ours, theirs, schema, symmetric)? {
                    data.shift_remove(field);
                }
            }
            None if symmetric && schema.is_selector => {
                data.shift_remove(field);
            }
            None => {}
        }
    }
    Ok(())
}

/// Merge one schema-described mapping in place.
///
/// Returns `false` when the schema requires values and nothing survived, so
/// the caller removes the field.
pub(crate) fn merge_subfields(
    ctx: &mut MergeContext,
    data: &mut Mapping,
    other: &Mapping,
    schema: &MergeSchema,
    symmetric: bool,
) -> Result<bool, MergeError> {
    for (field, function) in &schema.merge_functions {
        let merged = function.apply(ctx, data.get(*field), other.get(*field), symmetric)?;
        match merged {
            Some(value) => {
                data.insert(Value::from(*field), value);
            }
            None => {
                data.shift_remove(*field);
            }
        }
    }

    merge_schema_fields(ctx, data, other, &schema.sub_schemas, symmetric)?;

    let undeclared: Vec<Value> = data
        .keys()
        .filter(|key| !key.as_str().is_some_and(|name| schema.declares(name)))
        .cloned()
        .collect();
    for key in undeclared {
        data.shift_remove(&key);
    }

    Ok(!(schema.values_required && data.is_empty()))
}
