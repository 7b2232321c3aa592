//! Network ingress/egress rules.
//!
//! Rules reference process nodes by id. Before incoming rules are compared,
//! their references are rewritten through the merged process tree (see
//! [`convert`]), so the process policy must always be merged first.

mod list;
mod node;
mod primitives;

pub use list::{convert, NetworkNodeList};
pub use node::{NetworkNode, PeerBlock};
pub use primitives::{IpBlock, PortRange};

/// Rule direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    /// Field holding the rule list inside `networkPolicy`.
    pub fn field(self) -> &'static str {
        match self {
            Direction::Ingress => "ingress",
            Direction::Egress => "egress",
        }
    }

    /// Field holding a rule's peers.
    pub fn peer_field(self) -> &'static str {
        match self {
            Direction::Ingress => "from",
            Direction::Egress => "to",
        }
    }
}
