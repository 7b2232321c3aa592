use std::collections::HashMap;

use serde_yaml::{Mapping, Value};

use super::ProcessNode;
use crate::error::{BuildError, MergeError};
use crate::stats::MergeStats;

/// Arena owning every node of one process forest.
///
/// Nodes are stored by id; roots and children are kept as ordered id lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessNodeList {
    nodes: HashMap<String, ProcessNode>,
    roots: Vec<String>,
    names: HashMap<String, Vec<String>>,
}

impl ProcessNodeList {
    /// Build a forest from a `processPolicy` sequence. `null` yields an empty list.
    pub fn from_value(value: &Value) -> Result<Self, BuildError> {
        let mut list = Self::default();
        let items = match value {
            Value::Null => return Ok(list),
            Value::Sequence(items) => items,
            _ => {
                return Err(BuildError::InvalidField {
                    context: "process policy",
                    field: "processPolicy",
                    detail: "expected a list of process nodes".to_string(),
                })
            }
        };
        for item in items {
            let id = list.parse_node(item, None)?;
            list.roots.push(id);
        }
        Ok(list)
    }

    fn parse_node(&mut self, value: &Value, parent: Option<&str>) -> Result<String, BuildError> {
        let map = value.as_mapping().ok_or(BuildError::InvalidField {
            context: "process policy",
            field: "processPolicy",
            detail: "process node must be a mapping".to_string(),
        })?;
        let inherited = parent
            .and_then(|id| self.nodes.get(id))
            .map(|node| node.euser.clone());
        let node = ProcessNode::from_mapping(map, inherited.as_deref())?;
        let id = node.id.clone();
        if self.nodes.contains_key(&id) {
            return Err(BuildError::DuplicateId(id));
        }
        self.insert(node);

        let children = match map.get("children") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Sequence(items)) => items.as_slice(),
            Some(_) => {
                return Err(BuildError::InvalidField {
                    context: "process node",
                    field: "children",
                    detail: "expected a list of process nodes".to_string(),
                })
            }
        };
        for child in children {
            let child_id = self.parse_node(child, Some(&id))?;
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child_id);
            }
        }
        Ok(id)
    }

    fn insert(&mut self, node: ProcessNode) {
        self.names
            .entry(node.name.clone())
            .or_default()
            .push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Serialize the forest back into a `processPolicy` sequence.
    pub fn to_value(&self) -> Value {
        Value::Sequence(
            self.roots
                .iter()
                .filter_map(|id| self.node_value(id, None))
                .collect(),
        )
    }

    fn node_value(&self, id: &str, parent_euser: Option<&[String]>) -> Option<Value> {
        let node = self.nodes.get(id)?;
        let mut map: Mapping = node.to_mapping(parent_euser);
        let children: Vec<Value> = node
            .children
            .iter()
            .filter_map(|child| self.node_value(child, Some(&node.euser)))
            .collect();
        if !children.is_empty() {
            map.insert("children".into(), Value::Sequence(children));
        }
        Some(Value::Mapping(map))
    }

    /// Look up a node by id.
    pub fn get(&self, id: &str) -> Option<&ProcessNode> {
        self.nodes.get(id)
    }

    /// Root ids in document order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Ids of nodes currently named exactly `name`.
    pub fn ids_named(&self, name: &str) -> &[String] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id that `id` was merged or grafted into during the last merge.
    ///
    /// Returns `None` when this list has no node `id`; a node that took part
    /// in no merge resolves to itself.
    pub fn resolve_id(&self, id: &str) -> Option<&str> {
        let node = self.nodes.get(id)?;
        Some(node.merged_id.as_deref().unwrap_or(&node.id))
    }

    /// Widen both forests toward each other, folding `other` into `self`.
    pub fn symmetric_merge(&mut self, other: &mut ProcessNodeList) -> Result<MergeStats, MergeError> {
        self.merge(other, true)
    }

    /// Extend `self` so it also covers `other`; uncovered subtrees are grafted.
    pub fn asymmetric_merge(
        &mut self,
        other: &mut ProcessNodeList,
    ) -> Result<MergeStats, MergeError> {
        self.merge(other, false)
    }

    fn merge(&mut self, other: &mut ProcessNodeList, symmetric: bool) -> Result<MergeStats, MergeError> {
        let mut stats = MergeStats::default();
        let other_roots = other.roots.clone();
        self.merge_level(None, &other_roots, other, symmetric, &mut stats)?;
        Ok(stats)
    }

    fn merge_level(
        &mut self,
        parent: Option<&str>,
        other_ids: &[String],
        other: &mut ProcessNodeList,
        symmetric: bool,
        stats: &mut MergeStats,
    ) -> Result<(), MergeError> {
        for other_id in other_ids {
            let candidates = match parent {
                None => self.roots.clone(),
                Some(id) => lookup(&self.nodes, id)?.children.clone(),
            };
            let incoming = lookup(&other.nodes, other_id)?;
            let partner = candidates.into_iter().find(|candidate| {
                self.nodes
                    .get(candidate)
                    .is_some_and(|node| node.is_partner(incoming, symmetric))
            });

            let Some(partner) = partner else {
                self.graft(parent, other_id, other, stats)?;
                continue;
            };

            let incoming = other.nodes.get_mut(other_id).ok_or_else(|| missing(other_id))?;
            let target = self.nodes.get_mut(&partner).ok_or_else(|| missing(&partner))?;
            let old_name = target.name.clone();
            if symmetric {
                target.symmetric_merge(incoming)?;
            } else {
                target.asymmetric_merge(incoming)?;
            }
            let new_name = target.name.clone();
            let grandchildren = incoming.children.clone();
            if new_name != old_name {
                self.rename_index(&partner, &old_name, &new_name);
            }
            stats.merged_nodes += 1;

            self.merge_level(Some(&partner), &grandchildren, other, symmetric, stats)?;
        }
        Ok(())
    }

    fn graft(
        &mut self,
        parent: Option<&str>,
        other_id: &str,
        other: &mut ProcessNodeList,
        stats: &mut MergeStats,
    ) -> Result<String, MergeError> {
        let source = lookup(&other.nodes, other_id)?.clone();
        let new_id = self.unique_id(&source.id);
        if new_id != source.id {
            tracing::debug!(from = %source.id, to = %new_id, "renamed colliding process id");
            stats.renamed_ids += 1;
        }

        let mut node = source.clone();
        node.id = new_id.clone();
        node.children = Vec::new();
        node.merged_id = None;
        self.insert(node);
        match parent {
            None => self.roots.push(new_id.clone()),
            Some(id) => self
                .nodes
                .get_mut(id)
                .ok_or_else(|| missing(id))?
                .children
                .push(new_id.clone()),
        }
        if let Some(incoming) = other.nodes.get_mut(other_id) {
            incoming.merged_id = Some(new_id.clone());
        }
        stats.grafted_nodes += 1;

        for child in &source.children {
            self.graft(Some(&new_id), child, other, stats)?;
        }
        Ok(new_id)
    }

    /// First free id derived from `id`: `foo` becomes `foo_0`, `foo_0` becomes `foo_1`.
    fn unique_id(&self, id: &str) -> String {
        let mut candidate = id.to_string();
        while self.nodes.contains_key(&candidate) {
            candidate = bump_suffix(&candidate);
        }
        candidate
    }

    fn rename_index(&mut self, id: &str, old_name: &str, new_name: &str) {
        if let Some(ids) = self.names.get_mut(old_name) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.names.remove(old_name);
            }
        }
        self.names
            .entry(new_name.to_string())
            .or_default()
            .push(id.to_string());
    }

    /// `true` when every node of `other` has a containing partner in `self`
    /// at the same position in the tree.
    pub fn covers(&self, other: &ProcessNodeList) -> bool {
        self.covers_level(&self.roots, &other.roots, other)
    }

    fn covers_level(&self, ours: &[String], theirs: &[String], other: &ProcessNodeList) -> bool {
        theirs.iter().all(|their_id| {
            let Some(their) = other.nodes.get(their_id) else {
                return false;
            };
            ours.iter().filter_map(|id| self.nodes.get(id)).any(|our| {
                our.contains(their) && self.covers_level(&our.children, &their.children, other)
            })
        })
    }
}

fn bump_suffix(id: &str) -> String {
    if let Some((prefix, suffix)) = id.rsplit_once('_') {
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = suffix.parse::<u64>() {
                return format!("{prefix}_{}", n + 1);
            }
        }
    }
    format!("{id}_0")
}

fn lookup<'a>(
    nodes: &'a HashMap<String, ProcessNode>,
    id: &str,
) -> Result<&'a ProcessNode, MergeError> {
    nodes.get(id).ok_or_else(|| missing(id))
}

fn missing(id: &str) -> MergeError {
    MergeError::Invariant(format!("process id '{id}' is not in its tree"))
}
