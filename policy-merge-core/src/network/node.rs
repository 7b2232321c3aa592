use serde_yaml::{Mapping, Value};

use super::{Direction, IpBlock, PortRange};
use crate::error::BuildError;
use crate::value::string_list;
use crate::wildcard::{fnmatch, is_wider};

/// One entry of a rule's `to`/`from` list.
///
/// Entries are OR-matched: traffic matches the rule when it matches any
/// block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerBlock {
    Ip(IpBlock),
    Dns(Vec<String>),
}

impl PeerBlock {
    /// Parse one OR-block. Returns `Ok(None)` for entries that are skipped.
    fn from_value(value: &Value) -> Result<Option<Self>, BuildError> {
        let Some(map) = value.as_mapping() else {
            tracing::warn!(entry = ?value, "skipping network peer that is not a mapping");
            return Ok(None);
        };
        match (map.get("ipBlock"), map.get("dnsSelector")) {
            (Some(_), Some(_)) => {
                tracing::warn!(
                    entry = ?value,
                    "skipping network peer combining ipBlock and dnsSelector; anded selectors are unsupported"
                );
                Ok(None)
            }
            (Some(Value::Mapping(block)), None) => Ok(Some(PeerBlock::Ip(IpBlock::from_mapping(block)?))),
            (Some(_), None) => Err(BuildError::InvalidField {
                context: "network peer",
                field: "ipBlock",
                detail: "expected a mapping with a cidr".to_string(),
            }),
            (None, Some(names)) => Ok(Some(PeerBlock::Dns(string_list(
                Some(names),
                "network peer",
                "dnsSelector",
            )?))),
            (None, None) => {
                tracing::warn!(entry = ?value, "skipping network peer without ipBlock or dnsSelector");
                Ok(None)
            }
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        match self {
            PeerBlock::Ip(block) => {
                map.insert("ipBlock".into(), Value::Mapping(block.to_mapping()));
            }
            PeerBlock::Dns(names) => {
                map.insert(
                    "dnsSelector".into(),
                    Value::Sequence(names.iter().cloned().map(Value::from).collect()),
                );
            }
        }
        Value::Mapping(map)
    }
}

/// One ingress or egress rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkNode {
    pub direction: Direction,
    pub peers: Vec<PeerBlock>,
    pub ports: Vec<PortRange>,
    /// Process node ids this rule applies to.
    pub processes: Vec<String>,
}

impl NetworkNode {
    /// Parse a rule mapping for `direction`.
    pub fn from_value(value: &Value, direction: Direction) -> Result<Self, BuildError> {
        const CONTEXT: &str = "network rule";
        let map = value.as_mapping().ok_or(BuildError::InvalidField {
            context: CONTEXT,
            field: direction.field(),
            detail: "rule must be a mapping".to_string(),
        })?;

        let mut peers = Vec::new();
        match map.get(direction.peer_field()) {
            None | Some(Value::Null) => {}
            Some(Value::Sequence(items)) => {
                for item in items {
                    if let Some(block) = PeerBlock::from_value(item)? {
                        peers.push(block);
                    }
                }
            }
            Some(_) => {
                return Err(BuildError::InvalidField {
                    context: CONTEXT,
                    field: direction.peer_field(),
                    detail: "expected a list of peers".to_string(),
                })
            }
        }

        let ports = match map.get("ports") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| {
                    item.as_mapping()
                        .ok_or(BuildError::InvalidField {
                            context: CONTEXT,
                            field: "ports",
                            detail: "port entry must be a mapping".to_string(),
                        })
                        .and_then(PortRange::from_mapping)
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(BuildError::InvalidField {
                    context: CONTEXT,
                    field: "ports",
                    detail: "expected a list of ports".to_string(),
                })
            }
        };

        let processes = string_list(map.get("processes"), CONTEXT, "processes")?;

        Ok(Self {
            direction,
            peers,
            ports,
            processes,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(
            self.direction.peer_field().into(),
            Value::Sequence(self.peers.iter().map(PeerBlock::to_value).collect()),
        );
        map.insert(
            "processes".into(),
            Value::Sequence(self.processes.iter().cloned().map(Value::from).collect()),
        );
        map.insert(
            "ports".into(),
            Value::Sequence(
                self.ports
                    .iter()
                    .map(|p| Value::Mapping(p.to_mapping()))
                    .collect(),
            ),
        );
        Value::Mapping(map)
    }

    pub fn ip_blocks(&self) -> impl Iterator<Item = &IpBlock> {
        self.peers.iter().filter_map(|peer| match peer {
            PeerBlock::Ip(block) => Some(block),
            PeerBlock::Dns(_) => None,
        })
    }

    pub fn dns_patterns(&self) -> impl Iterator<Item = &String> {
        self.peers.iter().flat_map(|peer| match peer {
            PeerBlock::Dns(names) => names.as_slice(),
            PeerBlock::Ip(_) => &[][..],
        })
    }

    /// `true` when this rule already permits everything `other` permits.
    ///
    /// With a single port range on each side, addresses are not compared:
    /// rules for the same service and processes fold together. When either
    /// side lists several ranges, the address sets must be covered as well.
    pub fn contains(&self, other: &NetworkNode) -> bool {
        if self.direction != other.direction || !self.covers_ports(other) {
            return false;
        }
        if (self.ports.len() > 1 || other.ports.len() > 1)
            && !(self.covers_ips(other) && self.covers_dns(other))
        {
            return false;
        }
        self.covers_processes(other)
    }

    /// Containment in both directions on every dimension.
    pub fn equals(&self, other: &NetworkNode) -> bool {
        self.direction == other.direction
            && self.covers_ports(other)
            && other.covers_ports(self)
            && self.covers_ips(other)
            && other.covers_ips(self)
            && self.covers_dns(other)
            && other.covers_dns(self)
            && self.covers_processes(other)
            && other.covers_processes(self)
    }

    /// Widen addresses toward `other`, replacing narrower blocks and patterns.
    ///
    /// Ports and process references are left as they are.
    pub fn symmetric_merge(&mut self, other: &NetworkNode) {
        self.absorb(other, true);
    }

    /// Add `other`'s addresses that this rule does not cover yet.
    pub fn asymmetric_merge(&mut self, other: &NetworkNode) {
        self.absorb(other, false);
    }

    fn absorb(&mut self, other: &NetworkNode, widen: bool) {
        for block in other.ip_blocks() {
            self.add_ip_block(block, widen);
        }
        for pattern in other.dns_patterns() {
            self.add_dns_pattern(pattern, widen);
        }
    }

    fn add_ip_block(&mut self, block: &IpBlock, widen: bool) {
        if widen && self.ip_blocks().any(|existing| block.strictly_contains(existing)) {
            let mut replaced = false;
            self.peers.retain_mut(|peer| match peer {
                PeerBlock::Ip(existing) if block.strictly_contains(existing) => {
                    if replaced {
                        false
                    } else {
                        *existing = block.clone();
                        replaced = true;
                        true
                    }
                }
                _ => true,
            });
            return;
        }
        if !self.ip_blocks().any(|existing| existing.contains(block)) {
            self.peers.push(PeerBlock::Ip(block.clone()));
        }
    }

    fn add_dns_pattern(&mut self, pattern: &str, widen: bool) {
        if widen && self.dns_patterns().any(|existing| is_wider(pattern, existing)) {
            let mut replaced = false;
            for peer in &mut self.peers {
                if let PeerBlock::Dns(names) = peer {
                    for name in names.iter_mut() {
                        if is_wider(pattern, name) {
                            *name = pattern.to_string();
                            replaced = true;
                        }
                    }
                    let mut seen = Vec::new();
                    names.retain(|name| {
                        let fresh = !seen.contains(name);
                        seen.push(name.clone());
                        fresh
                    });
                }
            }
            if replaced {
                return;
            }
        }
        if self.dns_patterns().any(|existing| fnmatch(pattern, existing)) {
            return;
        }
        let last_dns = self.peers.iter_mut().rev().find_map(|peer| match peer {
            PeerBlock::Dns(names) => Some(names),
            PeerBlock::Ip(_) => None,
        });
        match last_dns {
            Some(names) => names.push(pattern.to_string()),
            None => self.peers.push(PeerBlock::Dns(vec![pattern.to_string()])),
        }
    }

    fn covers_ports(&self, other: &NetworkNode) -> bool {
        other
            .ports
            .iter()
            .all(|theirs| self.ports.iter().any(|ours| ours.contains(theirs)))
    }

    fn covers_ips(&self, other: &NetworkNode) -> bool {
        other
            .ip_blocks()
            .all(|theirs| self.ip_blocks().any(|ours| ours.contains(theirs)))
    }

    fn covers_dns(&self, other: &NetworkNode) -> bool {
        other
            .dns_patterns()
            .all(|theirs| self.dns_patterns().any(|ours| fnmatch(theirs, ours)))
    }

    fn covers_processes(&self, other: &NetworkNode) -> bool {
        other
            .processes
            .iter()
            .all(|theirs| self.processes.contains(theirs))
    }
}

#[cfg(test)]
mod tests {
    use super::{NetworkNode, PeerBlock};
    use crate::network::Direction;

    fn egress(yaml: &str) -> NetworkNode {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("yaml");
        NetworkNode::from_value(&value, Direction::Egress).expect("rule")
    }

    #[test]
    fn skips_anded_peers() {
        let rule = egress(
            r#"
to:
- ipBlock: {cidr: 10.0.0.0/8}
  dnsSelector: [example.com]
- dnsSelector: [api.example.com]
processes: [p_0]
ports: [{port: 443, protocol: TCP}]
"#,
        );
        assert_eq!(rule.peers.len(), 1);
        assert!(matches!(&rule.peers[0], PeerBlock::Dns(names) if names == &["api.example.com"]));
    }

    #[test]
    fn single_port_rules_ignore_addresses_for_containment() {
        let a = egress("{to: [{ipBlock: {cidr: 10.0.0.0/24}}], processes: [p_0], ports: [{port: 443}]}");
        let b = egress("{to: [{ipBlock: {cidr: 10.0.1.0/24}}], processes: [p_0], ports: [{port: 443}]}");
        assert!(a.contains(&b));
        assert!(!a.equals(&b));
    }

    #[test]
    fn multi_port_rules_require_address_coverage() {
        let a = egress(
            "{to: [{ipBlock: {cidr: 10.0.0.0/24}}], processes: [p_0], ports: [{port: 80}, {port: 443}]}",
        );
        let b = egress("{to: [{ipBlock: {cidr: 10.0.1.0/24}}], processes: [p_0], ports: [{port: 443}]}");
        let c = egress("{to: [{ipBlock: {cidr: 10.0.0.128/25}}], processes: [p_0], ports: [{port: 80}]}");
        assert!(!a.contains(&b));
        assert!(a.contains(&c));
    }

    #[test]
    fn containment_requires_every_process() {
        let a = egress("{to: [{dnsSelector: ['*.example.com']}], processes: [p_0], ports: [{port: 443}]}");
        let b = egress(
            "{to: [{dnsSelector: [api.example.com]}], processes: [p_0, q_0], ports: [{port: 443}]}",
        );
        assert!(!a.contains(&b));
        assert!(b.contains(&a));
    }

    #[test]
    fn symmetric_merge_unions_cidrs_without_wildcarding() {
        let mut a = egress("{to: [{ipBlock: {cidr: 10.0.0.0/24}}], processes: [p_0], ports: [{port: 443}]}");
        let b = egress("{to: [{ipBlock: {cidr: 10.0.1.0/24}}], processes: [p_0], ports: [{port: 443}]}");
        a.symmetric_merge(&b);

        let cidrs: Vec<String> = a.ip_blocks().map(|b| b.network.to_string()).collect();
        assert_eq!(cidrs, vec!["10.0.0.0/24", "10.0.1.0/24"]);
        assert!(a.contains(&b));
    }

    #[test]
    fn symmetric_merge_widens_to_strict_supersets() {
        let mut a = egress(
            "{to: [{ipBlock: {cidr: 10.0.0.0/24}}, {dnsSelector: [api.example.com]}], processes: [p_0], ports: [{port: 443}]}",
        );
        let b = egress(
            "{to: [{ipBlock: {cidr: 10.0.0.0/16}}, {dnsSelector: ['*.example.com']}], processes: [p_0], ports: [{port: 443}]}",
        );
        let mut c = a.clone();

        a.symmetric_merge(&b);
        let cidrs: Vec<String> = a.ip_blocks().map(|b| b.network.to_string()).collect();
        assert_eq!(cidrs, vec!["10.0.0.0/16"]);
        assert_eq!(a.dns_patterns().collect::<Vec<_>>(), vec!["*.example.com"]);

        c.asymmetric_merge(&b);
        assert_eq!(c.ip_blocks().count(), 2);
        assert_eq!(
            c.dns_patterns().collect::<Vec<_>>(),
            vec!["api.example.com", "*.example.com"]
        );
    }

    #[test]
    fn serializes_peer_layout() {
        let yaml = r#"
to:
- dnsSelector:
  - api.example.com
- ipBlock:
    cidr: 10.0.0.0/8
    except:
    - 10.1.0.0/16
processes:
- p_0
ports:
- port: 443
  protocol: TCP
"#;
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("yaml");
        let rule = NetworkNode::from_value(&value, Direction::Egress).expect("rule");
        assert_eq!(rule.to_value(), value);
    }

    #[test]
    fn single_rule_merges_keep_ports_and_processes() {
        let mut a = egress("{to: [{dnsSelector: [a.example.com]}], processes: [p_0], ports: [{port: 443}]}");
        let b = egress(
            "{to: [{dnsSelector: ['*.example.com']}], processes: [p_0, q_0], ports: [{port: 443}, {port: 8443}]}",
        );
        let mut c = a.clone();

        a.symmetric_merge(&b);
        assert_eq!(a.processes, vec!["p_0"]);
        assert_eq!(a.ports.iter().map(|p| p.port).collect::<Vec<_>>(), vec![443]);
        assert_eq!(a.dns_patterns().collect::<Vec<_>>(), vec!["*.example.com"]);

        c.asymmetric_merge(&b);
        assert_eq!(c.processes, vec!["p_0"]);
        assert_eq!(c.ports.len(), 1);
    }
}
