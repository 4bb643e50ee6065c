//! Ring topology resolution.
//!
//! A node is configured with the full ring in forwarding order plus its own
//! address. Resolution locates the node inside that list once at startup;
//! everything downstream works with indices into it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::RingAddress;
use crate::ProtocolError;

/// What a node does with the token besides augmenting and forwarding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Bootstraps the first token and regenerates on timeout.
    Initiator,
    /// Augments and forwards; regenerates on timeout.
    Relay,
    /// Renders every token it receives; never originates one.
    Observer,
}

impl Role {
    pub fn bootstraps(self) -> bool {
        self == Role::Initiator
    }

    pub fn may_regenerate(self) -> bool {
        self != Role::Observer
    }

    pub fn renders(self) -> bool {
        self == Role::Observer
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initiator" | "start" => Ok(Role::Initiator),
            "relay" | "mid" => Ok(Role::Relay),
            "observer" | "plot" => Ok(Role::Observer),
            _ => Err(ProtocolError::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Initiator => "initiator",
            Role::Relay => "relay",
            Role::Observer => "observer",
        };
        f.write_str(name)
    }
}

/// The ordered ring and this node's position in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingTopology {
    members: Vec<RingAddress>,
    self_index: usize,
}

impl RingTopology {
    /// Locate `me` in `members`. The own address must appear exactly once.
    pub fn resolve(members: Vec<RingAddress>, me: &RingAddress) -> Result<Self, ProtocolError> {
        if members.is_empty() {
            return Err(ProtocolError::EmptyRing);
        }

        let mut positions = members
            .iter()
            .enumerate()
            .filter(|(_, addr)| *addr == me)
            .map(|(i, _)| i);

        let self_index = positions
            .next()
            .ok_or_else(|| ProtocolError::SelfNotInRing(me.clone()))?;

        let extra = positions.count();
        if extra > 0 {
            return Err(ProtocolError::SelfListedTwice {
                addr: me.clone(),
                count: extra + 1,
            });
        }

        Ok(Self {
            members,
            self_index,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[RingAddress] {
        &self.members
    }

    pub fn self_index(&self) -> usize {
        self.self_index
    }

    pub fn self_address(&self) -> &RingAddress {
        &self.members[self.self_index]
    }

    /// `(self_index - 1) mod N`. Only used to identify the node in logs.
    pub fn predecessor_index(&self) -> usize {
        (self.self_index + self.len() - 1) % self.len()
    }

    pub fn predecessor(&self) -> &RingAddress {
        &self.members[self.predecessor_index()]
    }

    /// Candidates for forwarding, as `(offset, address)` for offsets
    /// `1..N`. Offset 0 (this node) is never produced.
    pub fn successors(&self) -> impl Iterator<Item = (usize, &RingAddress)> + '_ {
        let n = self.len();
        (1..n).map(move |offset| (offset, &self.members[(self.self_index + offset) % n]))
    }
}

/// A node's resolved startup configuration: where it sits and what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    pub topology: RingTopology,
    pub role: Role,
}

impl RingConfig {
    /// Resolve from the raw strings a node is started with.
    pub fn parse<S: AsRef<str>>(role: &str, me: &str, ring: &[S]) -> Result<Self, ProtocolError> {
        let role = role.parse::<Role>()?;
        let me = me.parse::<RingAddress>()?;
        let members = ring
            .iter()
            .map(|s| s.as_ref().parse::<RingAddress>())
            .collect::<Result<Vec<_>, _>>()?;
        let topology = RingTopology::resolve(members, &me)?;
        Ok(Self { topology, role })
    }
}
