//! Priority vectors and their ranking
//!
//! A priority vector is the tuple a BPDU advertises: the root the sender
//! believes in, its cost to that root, the sender's own identity and the
//! identity of the sending port. Every field compares "lower wins".
//!
//! [`rank`] is the single comparison primitive. Its return value is a
//! signed case code: the sign says which side wins, the magnitude names
//! the first field that differed. The ingest decision table dispatches on
//! both.

use rapidtree_core::BridgeId;
use rapidtree_packet::Bpdu;

/// The ordered tuple a bridge advertises on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityVector {
    /// Root the advertiser believes in
    pub root: BridgeId,
    /// Advertiser's path cost to that root
    pub root_path_cost: u32,
    /// Identity of the advertising bridge
    pub bridge: BridgeId,
    /// Priority of the advertising port
    pub port_priority: u8,
    /// Number of the advertising port
    pub port_num: u16,
}

impl PriorityVector {
    /// Vector carried by a frame, with the receiving link's cost added to
    /// the advertised root path cost.
    pub fn from_bpdu(bpdu: &Bpdu, link_cost: u32) -> Self {
        Self {
            root: bpdu.root,
            root_path_cost: bpdu.root_path_cost + link_cost,
            bridge: bpdu.bridge,
            port_priority: bpdu.port_priority,
            port_num: bpdu.port_num,
        }
    }
}

/// Field that decided a comparison, by case-code magnitude.
pub const CASE_ROOT_ID: i8 = 1;
pub const CASE_PATH_COST: i8 = 2;
pub const CASE_BRIDGE_ID: i8 = 3;
pub const CASE_PORT_ID: i8 = 4;

/// Rank two priority vectors.
///
/// Returns 0 when the vectors are field-wise equal; otherwise a code whose
/// magnitude names the first differing field (1 root identity, 2 root path
/// cost, 3 bridge identity, 4 port identity) and whose sign is negative
/// when `a` wins (is lower) and positive when `b` wins.
pub fn rank(a: &PriorityVector, b: &PriorityVector) -> i8 {
    fn decide<T: Ord>(a: T, b: T, case: i8) -> Option<i8> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(-case),
            std::cmp::Ordering::Greater => Some(case),
            std::cmp::Ordering::Equal => None,
        }
    }

    decide(a.root.priority, b.root.priority, CASE_ROOT_ID)
        .or_else(|| decide(a.root.mac, b.root.mac, CASE_ROOT_ID))
        .or_else(|| decide(a.root_path_cost, b.root_path_cost, CASE_PATH_COST))
        .or_else(|| decide(a.bridge.priority, b.bridge.priority, CASE_BRIDGE_ID))
        .or_else(|| decide(a.bridge.mac, b.bridge.mac, CASE_BRIDGE_ID))
        .or_else(|| decide(a.port_priority, b.port_priority, CASE_PORT_ID))
        .or_else(|| decide(a.port_num, b.port_num, CASE_PORT_ID))
        .unwrap_or(0)
}
