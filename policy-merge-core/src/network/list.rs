use serde_yaml::Value;

use super::{Direction, NetworkNode};
use crate::error::{BuildError, MergeError};
use crate::process::ProcessNodeList;
use crate::stats::MergeStats;
use crate::value::push_unique;

/// The ingress or egress rules of one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkNodeList {
    pub direction: Direction,
    pub nodes: Vec<NetworkNode>,
}

impl NetworkNodeList {
    /// Parse an `ingress` or `egress` sequence. `null` yields an empty list.
    pub fn from_value(value: &Value, direction: Direction) -> Result<Self, BuildError> {
        let nodes = match value {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items
                .iter()
                .map(|item| NetworkNode::from_value(item, direction))
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(BuildError::InvalidField {
                    context: "network policy",
                    field: direction.field(),
                    detail: "expected a list of rules".to_string(),
                })
            }
        };
        Ok(Self { direction, nodes })
    }

    pub fn to_value(&self) -> Value {
        Value::Sequence(self.nodes.iter().map(NetworkNode::to_value).collect())
    }

    /// Fold `other`'s rules in, merging with any rule related in either direction.
    ///
    /// `base_procs` and `other_procs` are the process trees of the two
    /// documents after their process policies were merged; incoming process
    /// references are rewritten through `other_procs`.
    pub fn symmetric_merge(
        &mut self,
        other: &NetworkNodeList,
        base_procs: Option<&ProcessNodeList>,
        other_procs: Option<&ProcessNodeList>,
    ) -> Result<MergeStats, MergeError> {
        self.merge(other, base_procs, other_procs, true)
    }

    /// Fold in `other`'s rules that this list does not already permit.
    pub fn asymmetric_merge(
        &mut self,
        other: &NetworkNodeList,
        base_procs: Option<&ProcessNodeList>,
        other_procs: Option<&ProcessNodeList>,
    ) -> Result<MergeStats, MergeError> {
        self.merge(other, base_procs, other_procs, false)
    }

    fn merge(
        &mut self,
        other: &NetworkNodeList,
        base_procs: Option<&ProcessNodeList>,
        other_procs: Option<&ProcessNodeList>,
        symmetric: bool,
    ) -> Result<MergeStats, MergeError> {
        let mut stats = MergeStats::default();
        for node in &other.nodes {
            let incoming = convert(node, base_procs, other_procs)?;
            let target = self.nodes.iter_mut().find(|existing| {
                existing.contains(&incoming) || (symmetric && incoming.contains(existing))
            });
            match target {
                Some(existing) if symmetric => {
                    existing.symmetric_merge(&incoming);
                    stats.merged_rules += 1;
                }
                Some(existing) => {
                    existing.asymmetric_merge(&incoming);
                    stats.merged_rules += 1;
                }
                None => {
                    self.nodes.push(incoming);
                    stats.appended_rules += 1;
                }
            }
        }
        Ok(stats)
    }

    /// `true` when every rule of `other` is contained by some rule here.
    pub fn covers(&self, other: &NetworkNodeList) -> bool {
        other
            .nodes
            .iter()
            .all(|theirs| self.nodes.iter().any(|ours| ours.contains(theirs)))
    }
}

/// Copy `node` with its process references rewritten to the ids they were
/// merged into, dropping duplicates.
pub fn convert(
    node: &NetworkNode,
    base_procs: Option<&ProcessNodeList>,
    other_procs: Option<&ProcessNodeList>,
) -> Result<NetworkNode, MergeError> {
    let mut converted = node.clone();
    let Some(other_procs) = other_procs else {
        return Ok(converted);
    };
    let mut processes = Vec::with_capacity(node.processes.len());
    for id in &node.processes {
        let resolved = other_procs.resolve_id(id).ok_or_else(|| {
            MergeError::Invariant(format!(
                "network rule references process '{id}' which is not in its process tree"
            ))
        })?;
        if let Some(base) = base_procs {
            if base.get(resolved).is_none() {
                return Err(MergeError::Invariant(format!(
                    "process '{id}' was merged into '{resolved}' which is missing from the base tree"
                )));
            }
        }
        push_unique(&mut processes, resolved);
    }
    converted.processes = processes;
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::{convert, NetworkNodeList};
    use crate::network::Direction;
    use crate::process::ProcessNodeList;

    fn rules(yaml: &str) -> NetworkNodeList {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("yaml");
        NetworkNodeList::from_value(&value, Direction::Egress).expect("rules")
    }

    fn procs(yaml: &str) -> ProcessNodeList {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("yaml");
        ProcessNodeList::from_value(&value).expect("procs")
    }

    #[test]
    fn convert_rewrites_and_dedupes_process_ids() {
        let mut base = procs("[{name: sh, exe: [/bin/sh], id: sh_0, euser: [root]}]");
        let mut other = procs(
            "[{name: sh, exe: [/bin/sh], id: a_0, euser: [root]}, {name: sh, exe: [/usr/bin/sh], id: b_0, euser: [root]}]",
        );
        base.asymmetric_merge(&mut other).expect("merge");

        let incoming = rules("[{to: [{dnsSelector: [x.io]}], processes: [a_0, b_0], ports: [{port: 53}]}]");
        let converted = convert(&incoming.nodes[0], Some(&base), Some(&other)).expect("convert");
        assert_eq!(converted.processes, vec!["sh_0"]);
    }

    #[test]
    fn convert_flags_dangling_process_references() {
        let other = procs("[{name: sh, exe: [/bin/sh], id: sh_0, euser: [root]}]");
        let incoming = rules("[{to: [{dnsSelector: [x.io]}], processes: [ghost_0], ports: [{port: 53}]}]");
        let err = convert(&incoming.nodes[0], None, Some(&other)).expect_err("dangling");
        assert!(err.is_bug());
    }

    #[test]
    fn asymmetric_merge_appends_uncovered_rules() {
        let mut base = rules("[{to: [{dnsSelector: ['*.example.com']}], processes: [p_0], ports: [{port: 443}]}]");
        let other = rules(
            "[{to: [{dnsSelector: [api.example.com]}], processes: [p_0], ports: [{port: 443}]}, {to: [{dnsSelector: [db.internal]}], processes: [p_0], ports: [{port: 5432}]}]",
        );
        let stats = base.asymmetric_merge(&other, None, None).expect("merge");

        assert_eq!(base.nodes.len(), 2);
        assert_eq!(stats.merged_rules, 1);
        assert_eq!(stats.appended_rules, 1);
        assert!(base.covers(&other));
    }

    #[test]
    fn symmetric_merge_folds_rules_related_either_way() {
        let mut base = rules("[{to: [{dnsSelector: [api.example.com]}], processes: [p_0], ports: [{port: 443}]}]");
        let other = rules(
            "[{to: [{dnsSelector: ['*.example.com']}], processes: [p_0, q_0], ports: [{port: 443}]}]",
        );
        let mut asym = base.clone();

        base.symmetric_merge(&other, None, None).expect("merge");
        assert_eq!(base.nodes.len(), 1);
        assert_eq!(base.nodes[0].processes, vec!["p_0"]);
        assert_eq!(base.nodes[0].dns_patterns().collect::<Vec<_>>(), vec!["*.example.com"]);

        asym.asymmetric_merge(&other, None, None).expect("merge");
        assert_eq!(asym.nodes.len(), 2);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let mut base = rules("[{to: [{ipBlock: {cidr: 10.0.0.0/24}}], processes: [p_0], ports: [{port: 443}]}]");
        let other = rules("[{to: [{ipBlock: {cidr: 10.0.1.0/24}}], processes: [p_1], ports: [{port: 443}]}]");
        base.asymmetric_merge(&other, None, None).expect("first");
        let after_first = base.clone();
        base.asymmetric_merge(&other, None, None).expect("second");
        assert_eq!(base, after_first);
    }
}
