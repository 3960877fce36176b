//! Per-port state
//!
//! Role and forwarding state are folded into one tagged [`PortStatus`] so
//! that illegal combinations cannot be constructed: only Root, Designated
//! and Edge ports can report Forwarding, and everything else is pinned to
//! Discarding.

use std::fmt;

use rapidtree_core::{BridgeId, MacAddr, SimTime};

use crate::vector::PriorityVector;

/// Forward-delay progression of a Designated port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPhase {
    Discarding,
    Learning,
    Forwarding,
}

/// Combined role and state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Fresh port, not yet contested; promoted to Designated by the
    /// migration timer
    NotAssigned,
    /// Elected path toward the root; forwards immediately
    Root,
    /// Owns its segment; walks Discarding -> Learning -> Forwarding
    Designated(PortPhase),
    /// Spare path toward the root, kept discarding
    Alternate,
    /// Redundant attachment to a segment this bridge already serves
    Backup,
    /// Taken out of service (unresolvable self-loop)
    Disabled,
    /// Configured host-facing port: designated and forwarding, outside the
    /// election
    Edge,
}

/// Classic role view of a [`PortStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Root,
    Designated,
    Alternate,
    Backup,
    Disabled,
    NotAssigned,
}

/// Classic forwarding-state view of a [`PortStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Discarding,
    Learning,
    Forwarding,
}

impl PortStatus {
    pub fn role(&self) -> PortRole {
        match self {
            PortStatus::NotAssigned => PortRole::NotAssigned,
            PortStatus::Root => PortRole::Root,
            PortStatus::Designated(_) | PortStatus::Edge => PortRole::Designated,
            PortStatus::Alternate => PortRole::Alternate,
            PortStatus::Backup => PortRole::Backup,
            PortStatus::Disabled => PortRole::Disabled,
        }
    }

    pub fn state(&self) -> PortState {
        match self {
            PortStatus::Root | PortStatus::Edge => PortState::Forwarding,
            PortStatus::Designated(PortPhase::Learning) => PortState::Learning,
            PortStatus::Designated(PortPhase::Forwarding) => PortState::Forwarding,
            _ => PortState::Discarding,
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Edge => write!(f, "Designated/Forwarding (edge)"),
            _ => write!(f, "{:?}/{:?}", self.role(), self.state()),
        }
    }
}

/// Durable per-port record: status, the port's own identity, and the best
/// priority vector seen (or locally originated) on the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    /// Role/state
    pub status: PortStatus,
    /// Configured edge-ness; edge ports skip aging, election and hello
    /// traffic
    pub edge: bool,
    /// Own port priority, used in tie-breaks and advertised on egress
    pub priority: u8,
    /// Path cost of the attached link, added to incoming root path costs
    pub link_cost: u32,
    /// Best vector stored for this port
    pub vector: PriorityVector,
    /// Hop-incremented age of the stored root information
    pub age: u16,
    /// Hello periods elapsed since the stored information was confirmed
    pub lost_bpdu: u8,
    /// Deadline until which outbound BPDUs on this port carry the TC flag
    pub tc_while: SimTime,
}

impl PortRecord {
    pub fn new(
        edge: bool,
        priority: u8,
        link_cost: u32,
        bridge_priority: u16,
        bridge_mac: MacAddr,
        port_num: u16,
    ) -> Self {
        let own = BridgeId::new(bridge_priority, bridge_mac);
        Self {
            status: if edge {
                PortStatus::Edge
            } else {
                PortStatus::NotAssigned
            },
            edge,
            priority,
            link_cost,
            vector: PriorityVector {
                root: own,
                root_path_cost: 0,
                bridge: own,
                port_priority: priority,
                port_num,
            },
            age: 0,
            lost_bpdu: 0,
            tc_while: SimTime::ZERO,
        }
    }

    pub fn role(&self) -> PortRole {
        self.status.role()
    }

    pub fn state(&self) -> PortState {
        self.status.state()
    }
}
