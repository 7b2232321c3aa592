use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use serde_yaml::{Mapping, Value};

use crate::error::BuildError;
use crate::value::{scalar_string, string_field};

/// A CIDR network with optional excluded sub-networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpBlock {
    pub network: IpNet,
    pub except: Vec<IpNet>,
}

impl IpBlock {
    /// Build a block, checking that every exception lies strictly inside `network`.
    pub fn new(network: IpNet, except: Vec<IpNet>) -> Result<Self, BuildError> {
        for excluded in &except {
            if *excluded == network || !network.contains(excluded) {
                return Err(BuildError::ExceptNotSubnet {
                    network: network.to_string(),
                    except: excluded.to_string(),
                });
            }
        }
        Ok(Self { network, except })
    }

    /// Parse a CIDR string, accepting a bare address as a host network.
    pub fn parse(cidr: &str, except: &[&str]) -> Result<Self, BuildError> {
        let network = parse_net(cidr)?;
        let except = except
            .iter()
            .map(|e| parse_net(e))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(network, except)
    }

    /// Parse an `ipBlock` mapping (`cidr` plus optional `except` list).
    pub fn from_mapping(map: &Mapping) -> Result<Self, BuildError> {
        const CONTEXT: &str = "ipBlock";
        let cidr = string_field(map, "cidr", CONTEXT)?.ok_or(BuildError::MissingField {
            context: CONTEXT,
            field: "cidr",
        })?;
        let except = match map.get("except") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| {
                    scalar_string(item)
                        .ok_or_else(|| BuildError::InvalidCidr(format!("{item:?}")))
                        .and_then(|s| parse_net(&s))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(BuildError::InvalidField {
                    context: CONTEXT,
                    field: "except",
                    detail: "expected a list of CIDRs".to_string(),
                })
            }
        };
        Self::new(parse_net(&cidr)?, except)
    }

    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert("cidr".into(), self.network.to_string().into());
        if !self.except.is_empty() {
            map.insert(
                "except".into(),
                Value::Sequence(self.except.iter().map(|e| e.to_string().into()).collect()),
            );
        }
        map
    }

    /// `true` when `other`'s network is inside this block and not excluded by it.
    pub fn contains(&self, other: &IpBlock) -> bool {
        self.network.contains(&other.network)
            && !self
                .except
                .iter()
                .any(|excluded| excluded.contains(&other.network))
    }

    /// `true` when this block contains `other` and is not equal to it.
    pub fn strictly_contains(&self, other: &IpBlock) -> bool {
        self != other && self.contains(other)
    }
}

fn parse_net(raw: &str) -> Result<IpNet, BuildError> {
    let raw = raw.trim();
    if let Ok(net) = IpNet::from_str(raw) {
        return Ok(net.trunc());
    }
    IpAddr::from_str(raw)
        .map(IpNet::from)
        .map_err(|_| BuildError::InvalidCidr(raw.to_string()))
}

/// An inclusive span of ports for one protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRange {
    pub port: u16,
    pub endport: u16,
    pub protocol: String,
    explicit_end: bool,
}

impl PortRange {
    /// Build a range; `endport` defaults to `port`.
    pub fn new(port: u16, endport: Option<u16>, protocol: &str) -> Result<Self, BuildError> {
        let end = endport.unwrap_or(port);
        if end < port {
            return Err(BuildError::InvalidPortRange { port, endport: end });
        }
        Ok(Self {
            port,
            endport: end,
            protocol: protocol.to_string(),
            explicit_end: endport.is_some(),
        })
    }

    /// Parse a `ports` entry (`port`, optional `endport`, `protocol` defaulting to TCP).
    pub fn from_mapping(map: &Mapping) -> Result<Self, BuildError> {
        const CONTEXT: &str = "port range";
        let port = port_field(map, "port")?.ok_or(BuildError::MissingField {
            context: CONTEXT,
            field: "port",
        })?;
        let endport = port_field(map, "endport")?;
        let protocol = string_field(map, "protocol", CONTEXT)?.unwrap_or_else(|| "TCP".to_string());
        Self::new(port, endport, &protocol)
    }

    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert("port".into(), u64::from(self.port).into());
        map.insert("protocol".into(), self.protocol.clone().into());
        if self.explicit_end {
            map.insert("endport".into(), u64::from(self.endport).into());
        }
        map
    }

    /// `true` when protocols match and `other` lies inside this range.
    pub fn contains(&self, other: &PortRange) -> bool {
        self.protocol.eq_ignore_ascii_case(&other.protocol)
            && self.port <= other.port
            && other.endport <= self.endport
    }
}

fn port_field(map: &Mapping, field: &'static str) -> Result<Option<u16>, BuildError> {
    let invalid = || BuildError::InvalidField {
        context: "port range",
        field,
        detail: "expected a port number between 0 and 65535".to_string(),
    };
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u16>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
