//! The RSTP election engine
//!
//! One instance per bridge. Three event kinds drive it: BPDU arrival,
//! timer fire and lifecycle operations. Every handler runs to completion
//! and performs all role, state and table mutations before any outbound
//! BPDU is emitted; when a handler floods, frames leave in port-index
//! order.
//!
//! Incoming BPDUs run a three-tier challenge: against the vector stored
//! for the arrival port, against the current root port's vector, and
//! against the vector this bridge itself would originate on the port. The
//! signed case code of each comparison picks the transition.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use rapidtree_core::{
    BridgeConfig, BridgeId, Error, InterfaceTable, MacAddr, MacAddressTable, Result, SimTime,
};
use rapidtree_packet::Bpdu;

use crate::port::{PortPhase, PortRecord, PortRole, PortState, PortStatus};
use crate::vector::{rank, PriorityVector};

/// Outbound seam: the relay layer frames the BPDU and ships it to the STP
/// multicast group on the given port.
pub trait Relay {
    fn send(&mut self, out_port: usize, bpdu: Bpdu);
}

/// Buffering relay; handy for tests and for drivers that frame and
/// transmit after the handler returns.
impl Relay for Vec<(usize, Bpdu)> {
    fn send(&mut self, out_port: usize, bpdu: Bpdu) {
        self.push((out_port, bpdu));
    }
}

/// Collaborators and clock handed to every engine entry point.
pub struct EngineCtx<'a> {
    pub now: SimTime,
    pub mac_table: &'a mut dyn MacAddressTable,
    pub relay: &'a mut dyn Relay,
}

/// The three periodic self-events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    /// Hello emission plus lost-BPDU aging and failover
    Hello,
    /// Designated ports progress Discarding -> Learning -> Forwarding
    ForwardUpgrade,
    /// NotAssigned ports are promoted to Designated to contest
    Migrate,
}

/// Lifecycle operations delivered by the node controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Startup,
    Shutdown,
    Crash,
}

/// Event counters.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub bpdus_received: u64,
    pub bpdus_sent: u64,
    pub expired_dropped: u64,
    pub dropped_not_operational: u64,
    pub tc_events: u64,
    pub floods: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Timers {
    hello: Option<SimTime>,
    upgrade: Option<SimTime>,
    migrate: Option<SimTime>,
}

/// The spanning tree engine for one bridge.
pub struct Engine {
    priority: u16,
    address: MacAddr,
    ports: Vec<PortRecord>,

    max_age: u16,
    hello_time: Duration,
    forward_delay: Duration,
    migrate_time: Duration,
    tc_while_time: Duration,
    hello_secs: u16,
    forward_delay_secs: u16,

    operational: bool,
    timers: Timers,
    stats: EngineStats,
}

impl Engine {
    /// Build an engine from configuration and the interface table.
    ///
    /// The bridge identity comes from interface 0; when the table has no
    /// MAC there, a deterministic fallback address is used. Link costs are
    /// snapshotted per port. Fatal configuration problems surface here.
    pub fn new(config: &BridgeConfig, interfaces: &dyn InterfaceTable) -> Result<Engine> {
        config.validate()?;

        let port_count = interfaces.port_count();
        if port_count == 0 {
            return Err(Error::config("bridge needs at least one port"));
        }

        let address = match interfaces.mac(0) {
            Some(mac) => mac,
            None => {
                info!(
                    fallback = %MacAddr::FALLBACK_BRIDGE,
                    "interface 0 has no MAC address, using fallback bridge address"
                );
                MacAddr::FALLBACK_BRIDGE
            }
        };

        let ports = (0..port_count)
            .map(|i| {
                PortRecord::new(
                    config.is_edge(i),
                    config.port(i).priority,
                    interfaces.link_cost(i),
                    config.priority,
                    address,
                    i as u16,
                )
            })
            .collect();

        Ok(Engine {
            priority: config.priority,
            address,
            ports,
            max_age: config.max_age,
            hello_time: config.hello_time(),
            forward_delay: config.forward_delay(),
            migrate_time: config.migrate_time(),
            tc_while_time: config.tc_while_time(),
            hello_secs: config.hello_time().as_secs() as u16,
            forward_delay_secs: config.forward_delay().as_secs() as u16,
            operational: false,
            timers: Timers::default(),
            stats: EngineStats::default(),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Bring the bridge up: reset all port records and arm the three
    /// timers. Calling `start` on a running engine reschedules rather than
    /// double-arms, since the deadlines are overwritten.
    pub fn start(&mut self, ctx: &mut EngineCtx) {
        self.init_ports(ctx);
        self.timers.hello = Some(ctx.now);
        self.timers.upgrade = Some(ctx.now + self.forward_delay);
        self.timers.migrate = Some(ctx.now + self.migrate_time);
        self.operational = true;
        info!(bridge = %self.address, priority = self.priority, "spanning tree engine started");
    }

    /// Take the bridge down: cancel timers and drop every later event.
    /// Port records stay frozen until the next `start`.
    pub fn stop(&mut self) {
        self.timers = Timers::default();
        self.operational = false;
        info!(bridge = %self.address, "spanning tree engine stopped");
    }

    /// Node-level lifecycle operations at the link-layer stage.
    pub fn handle_lifecycle(&mut self, event: LifecycleEvent, ctx: &mut EngineCtx) {
        match event {
            LifecycleEvent::Startup => self.start(ctx),
            LifecycleEvent::Shutdown | LifecycleEvent::Crash => self.stop(),
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Earliest pending timer, if any. Drivers sleep until this and then
    /// call [`Engine::on_timer`].
    pub fn next_deadline(&self) -> Option<(SimTime, TimerKind)> {
        [
            (self.timers.hello, TimerKind::Hello),
            (self.timers.upgrade, TimerKind::ForwardUpgrade),
            (self.timers.migrate, TimerKind::Migrate),
        ]
        .into_iter()
        .filter_map(|(at, kind)| at.map(|t| (t, kind)))
        .min_by_key(|(t, _)| *t)
    }

    /// Deliver a timer fire. Fires after `stop` are dropped.
    pub fn on_timer(&mut self, kind: TimerKind, ctx: &mut EngineCtx) {
        if !self.operational {
            trace!(?kind, "timer fire while stopped, dropped");
            return;
        }
        match kind {
            TimerKind::Hello => self.handle_hello(ctx),
            TimerKind::ForwardUpgrade => self.handle_upgrade(ctx),
            TimerKind::Migrate => self.handle_migrate(ctx),
        }
    }

    /// NotAssigned ports switch to Designated/Discarding and contest.
    fn handle_migrate(&mut self, ctx: &mut EngineCtx) {
        for port in self.ports.iter_mut() {
            if port.status == PortStatus::NotAssigned {
                port.status = PortStatus::Designated(PortPhase::Discarding);
            }
        }
        self.timers.migrate = Some(ctx.now + self.migrate_time);
    }

    /// Designated ports move one step toward Forwarding per period. The
    /// step into Forwarding flushes every other port and raises tc-while
    /// everywhere.
    fn handle_upgrade(&mut self, ctx: &mut EngineCtx) {
        for i in 0..self.ports.len() {
            if let PortStatus::Designated(phase) = self.ports[i].status {
                match phase {
                    PortPhase::Discarding => {
                        self.ports[i].status = PortStatus::Designated(PortPhase::Learning);
                    }
                    PortPhase::Learning => {
                        self.ports[i].status = PortStatus::Designated(PortPhase::Forwarding);
                        debug!(port = i, "designated port reached forwarding");
                        for j in 0..self.ports.len() {
                            self.ports[j].tc_while = ctx.now + self.tc_while_time;
                            if j != i {
                                ctx.mac_table.flush(j);
                            }
                        }
                    }
                    PortPhase::Forwarding => {}
                }
            }
        }
        self.timers.upgrade = Some(ctx.now + self.forward_delay);
    }

    /// Hello: age non-designated ports, fail over aged-out roots, then
    /// emit the periodic BPDUs.
    fn handle_hello(&mut self, ctx: &mut EngineCtx) {
        for i in 0..self.ports.len() {
            if self.ports[i].edge {
                continue;
            }
            let role = self.ports[i].role();
            if !matches!(role, PortRole::Root | PortRole::Alternate | PortRole::Backup) {
                continue;
            }

            self.ports[i].lost_bpdu += 1;
            if self.ports[i].lost_bpdu <= 3 {
                continue;
            }

            // three hello periods without the best BPDU: start a contest
            match role {
                PortRole::Root => {
                    if let Some(alt) = self.best_alternate() {
                        debug!(old_root = i, new_root = alt, "root port aged out, failing over");
                        self.ports[i].status = PortStatus::Designated(PortPhase::Discarding);
                        self.init_port(i);
                        self.ports[alt].status = PortStatus::Root;
                        self.ports[alt].lost_bpdu = 0;
                        for j in 0..self.ports.len() {
                            self.ports[j].tc_while = ctx.now + self.tc_while_time;
                            if j != alt {
                                ctx.mac_table.flush(j);
                            }
                        }
                        ctx.mac_table.copy_table(i, alt);
                    } else {
                        debug!(port = i, "root port aged out with no alternate, restarting election");
                        self.init_ports(ctx);
                    }
                }
                PortRole::Alternate | PortRole::Backup => {
                    debug!(port = i, ?role, "aged out, taking over the segment as designated");
                    self.ports[i].status = PortStatus::Designated(PortPhase::Discarding);
                    self.init_port(i);
                }
                _ => unreachable!("aging is limited to root, alternate and backup ports"),
            }
            self.ports[i].lost_bpdu = 0;
        }

        self.send_bpdus(ctx);
        self.send_tcn_to_root(ctx, false);
        self.timers.hello = Some(ctx.now + self.hello_time);
    }

    // ------------------------------------------------------------------
    // BPDU ingest
    // ------------------------------------------------------------------

    /// Deliver a received BPDU together with its arrival port and the
    /// Ethernet source address.
    pub fn on_bpdu(
        &mut self,
        bpdu: &Bpdu,
        arrival: usize,
        src: MacAddr,
        ctx: &mut EngineCtx,
    ) -> Result<()> {
        if !self.operational {
            trace!("BPDU while stopped, dropped");
            self.stats.dropped_not_operational += 1;
            return Ok(());
        }
        if arrival >= self.ports.len() {
            return Err(Error::PortOutOfRange {
                port: arrival,
                count: self.ports.len(),
            });
        }
        if bpdu.message_age >= self.max_age {
            debug!(port = arrival, age = bpdu.message_age, "expired BPDU discarded");
            self.stats.expired_dropped += 1;
            return Ok(());
        }

        self.stats.bpdus_received += 1;
        trace!(port = arrival, %bpdu, "BPDU received");

        let tc_seen = self.check_tc(bpdu, arrival, ctx);

        let mut flood = false;
        if src == self.address {
            // more than one of our ports shares this segment
            self.handle_backup(bpdu, arrival, ctx);
        } else {
            flood = self.challenge(bpdu, arrival, src, ctx);
        }

        if flood {
            self.stats.floods += 1;
            self.send_bpdus(ctx);
        }
        if tc_seen {
            // propagate the change toward the root in the same event turn
            self.send_tcn_to_root(ctx, true);
        } else if flood {
            self.send_tcn_to_root(ctx, false);
        }
        Ok(())
    }

    /// Step 1: topology-change propagation. A TC-flagged frame on a
    /// forwarding port flushes every other port and raises its tc-while.
    fn check_tc(&mut self, bpdu: &Bpdu, arrival: usize, ctx: &mut EngineCtx) -> bool {
        if !(bpdu.tc && self.ports[arrival].state() == PortState::Forwarding) {
            return false;
        }
        debug!(port = arrival, "topology change notification received");
        self.stats.tc_events += 1;
        for i in 0..self.ports.len() {
            if i != arrival {
                ctx.mac_table.flush(i);
                self.ports[i].tc_while = ctx.now + self.tc_while_time;
            }
        }
        true
    }

    /// Step 2: a frame carrying our own bridge address looped back, so two
    /// of our ports share a segment. Port identity decides which one backs
    /// off; an exact tie means the port heard itself and is disabled.
    fn handle_backup(&mut self, bpdu: &Bpdu, arrival: usize, ctx: &mut EngineCtx) {
        let own = (self.ports[arrival].priority, arrival as u16);
        let advertised = (bpdu.port_priority, bpdu.port_num);

        match advertised.cmp(&own) {
            std::cmp::Ordering::Less => {
                // sender holds the better identity, arrival backs off
                ctx.mac_table.flush(arrival);
                self.ports[arrival].status = PortStatus::Backup;
                self.ports[arrival].lost_bpdu = 0;
                debug!(port = arrival, "port moved to backup");
            }
            std::cmp::Ordering::Greater => {
                let sender = bpdu.port_num as usize;
                if sender >= self.ports.len() {
                    warn!(sender, "looped BPDU advertises an unknown sender port");
                    return;
                }
                ctx.mac_table.flush(sender);
                self.ports[sender].status = PortStatus::Backup;
                self.ports[sender].lost_bpdu = 0;
                debug!(port = sender, "port moved to backup");
            }
            std::cmp::Ordering::Equal => {
                // received its own frame on the port that sent it
                let sender = bpdu.port_num as usize;
                if sender >= self.ports.len() {
                    warn!(sender, "looped BPDU advertises an unknown sender port");
                    return;
                }
                warn!(port = sender, "unavoidable self-loop, disabling port");
                ctx.mac_table.flush(sender);
                self.ports[sender].status = PortStatus::Disabled;
            }
        }
    }

    /// Step 3: the three-tier challenge. Returns whether the outcome
    /// warrants an expedited flood.
    fn challenge(
        &mut self,
        bpdu: &Bpdu,
        arrival: usize,
        src: MacAddr,
        ctx: &mut EngineCtx,
    ) -> bool {
        let cost = self.ports[arrival].link_cost;
        let case = self.compare_incoming(arrival, bpdu, cost);
        trace!(port = arrival, case, "challenge against stored port vector");

        if case > 0 && bpdu.root.mac != self.address {
            // the root never joins a loop advertising its own address
            self.accept_superior(bpdu, arrival, ctx)
        } else if case <= 0
            && src == self.ports[arrival].vector.bridge.mac
            && bpdu.root.mac != self.address
        {
            self.neighbour_restated(bpdu, arrival, case, ctx)
        } else {
            false
        }
    }

    /// Branch A: the incoming vector beats what the port has stored.
    fn accept_superior(&mut self, bpdu: &Bpdu, arrival: usize, ctx: &mut EngineCtx) -> bool {
        self.update_port_vector(arrival, bpdu);

        let Some(r) = self.root_index() else {
            // no root port yet: arrival takes it
            self.ports[arrival].status = PortStatus::Root;
            self.ports[arrival].lost_bpdu = 0;
            debug!(port = arrival, root = %bpdu.root, "root port elected");
            for j in 0..self.ports.len() {
                self.ports[j].tc_while = ctx.now + self.tc_while_time;
                if j != arrival {
                    ctx.mac_table.flush(j);
                }
            }
            return true;
        };

        let cost = self.ports[arrival].link_cost;
        let case2 = self.compare_incoming(r, bpdu, cost);
        trace!(port = arrival, root_port = r, case2, "challenge against root port vector");

        match case2 {
            0 => {
                // double link to the same sender port: better local port
                // identity keeps (or takes) the root role
                if (self.ports[r].priority, r) < (self.ports[arrival].priority, arrival) {
                    ctx.mac_table.flush(arrival);
                    self.ports[arrival].status = PortStatus::Alternate;
                    self.ports[arrival].lost_bpdu = 0;
                } else {
                    if self.ports[arrival].state() != PortState::Forwarding {
                        for j in 0..self.ports.len() {
                            self.ports[j].tc_while = ctx.now + self.tc_while_time;
                            if j != arrival {
                                ctx.mac_table.flush(j);
                            }
                        }
                    } else {
                        ctx.mac_table.flush(r);
                    }
                    // old root keeps its lost-BPDU count
                    self.ports[r].status = PortStatus::Alternate;
                    self.ports[arrival].status = PortStatus::Root;
                    self.ports[arrival].lost_bpdu = 0;
                    ctx.mac_table.copy_table(r, arrival);
                }
                false
            }
            1 => {
                // better root identity: the topology reroots through arrival
                debug!(port = arrival, root = %bpdu.root, "rerooting");
                let arrival_forwarding = self.ports[arrival].state() == PortState::Forwarding;
                for i in 0..self.ports.len() {
                    if self.ports[i].edge {
                        continue;
                    }
                    if !arrival_forwarding {
                        self.ports[i].tc_while = ctx.now + self.tc_while_time;
                    }
                    ctx.mac_table.flush(i);
                    if i != arrival {
                        self.ports[i].status = PortStatus::NotAssigned;
                        self.init_port(i);
                    }
                }
                self.ports[arrival].status = PortStatus::Root;
                self.ports[arrival].lost_bpdu = 0;
                true
            }
            2..=4 => {
                // same root, but a cheaper or better-ranked path. The
                // arrival port cannot be the root port here: acceptance
                // already stored the frame, so comparing the root port
                // against itself would have ranked 0.
                if self.ports[arrival].state() != PortState::Forwarding {
                    for j in 0..self.ports.len() {
                        self.ports[j].tc_while = ctx.now + self.tc_while_time;
                        if j != arrival {
                            ctx.mac_table.flush(j);
                        }
                    }
                }
                self.ports[arrival].status = PortStatus::Root;
                self.ports[arrival].lost_bpdu = 0;
                // only one port may stay root: demote, then let the old
                // root contest the segment
                self.ports[r].status = PortStatus::Alternate;
                ctx.mac_table.copy_table(r, arrival);
                let case3 = self.contest_local(r, arrival);
                trace!(port = r, case3, "old root contests its segment");
                if case3 >= 0 {
                    self.ports[r].status = PortStatus::Alternate;
                    ctx.mac_table.flush(r);
                } else {
                    self.ports[r].status = PortStatus::Designated(PortPhase::Discarding);
                }
                true
            }
            -1 => {
                // the sender believes in a worse root: show it ours now
                self.send_bpdu(arrival, ctx);
                false
            }
            _ => {
                // same root, worse path than our root port: the port either
                // owns its segment or stands by as alternate
                let case3 = self.contest_against(arrival, bpdu, r);
                trace!(port = arrival, case3, "contest against locally originated vector");
                if case3 < 0 {
                    self.ports[arrival].status = PortStatus::Designated(PortPhase::Discarding);
                    self.send_bpdu(arrival, ctx);
                } else {
                    ctx.mac_table.flush(arrival);
                    self.ports[arrival].status = PortStatus::Alternate;
                    self.ports[arrival].lost_bpdu = 0;
                }
                false
            }
        }
    }

    /// Branch B: the same neighbour restates equal or worse information.
    fn neighbour_restated(
        &mut self,
        bpdu: &Bpdu,
        arrival: usize,
        case: i8,
        ctx: &mut EngineCtx,
    ) -> bool {
        match case {
            0 => {
                // unchanged information confirms the stored vector
                self.ports[arrival].lost_bpdu = 0;
                false
            }
            -1 => {
                // the neighbour lost its root
                match self.ports[arrival].role() {
                    PortRole::Root => {
                        if let Some(alt) = self.best_alternate() {
                            debug!(old_root = arrival, new_root = alt, "root degraded, failing over");
                            self.ports[arrival].status =
                                PortStatus::Designated(PortPhase::Discarding);
                            ctx.mac_table.copy_table(arrival, alt);
                            for j in 0..self.ports.len() {
                                self.ports[j].tc_while = ctx.now + self.tc_while_time;
                                if j != alt {
                                    ctx.mac_table.flush(j);
                                }
                            }
                            // comes from alternate, keeps its lost-BPDU count
                            self.ports[alt].status = PortStatus::Root;
                            self.update_port_vector(arrival, bpdu);
                            self.send_bpdu(arrival, ctx);
                            false
                        } else {
                            debug!(port = arrival, "root degraded with no alternate, restarting election");
                            self.init_ports(ctx);
                            let cost = self.ports[arrival].link_cost;
                            if self.compare_incoming(arrival, bpdu, cost) > 0 {
                                // still the best offer after the reset
                                self.update_port_vector(arrival, bpdu);
                                self.ports[arrival].status = PortStatus::Root;
                            }
                            true
                        }
                    }
                    PortRole::Alternate => {
                        self.ports[arrival].status = PortStatus::Designated(PortPhase::Discarding);
                        self.update_port_vector(arrival, bpdu);
                        self.send_bpdu(arrival, ctx);
                        false
                    }
                    _ => false,
                }
            }
            _ => {
                // -2..-4: same root, the path through this neighbour got worse
                match self.ports[arrival].role() {
                    PortRole::Root => {
                        self.ports[arrival].lost_bpdu = 0;
                        if let Some(alt) = self.best_alternate() {
                            let cost = self.ports[arrival].link_cost;
                            let case2 = self.compare_incoming(alt, bpdu, cost);
                            if case2 < 0 {
                                // the standby path now wins
                                debug!(old_root = arrival, new_root = alt, "worse path, promoting alternate");
                                self.ports[alt].status = PortStatus::Root;
                                self.ports[arrival].status =
                                    PortStatus::Designated(PortPhase::Discarding);
                                let case3 = self.contest_against(arrival, bpdu, alt);
                                self.ports[arrival].status = if case3 < 0 {
                                    PortStatus::Designated(PortPhase::Discarding)
                                } else {
                                    PortStatus::Alternate
                                };
                                for j in 0..self.ports.len() {
                                    self.ports[j].tc_while = ctx.now + self.tc_while_time;
                                    if j != alt {
                                        ctx.mac_table.flush(j);
                                    }
                                }
                                ctx.mac_table.copy_table(arrival, alt);
                            }
                        }
                        self.update_port_vector(arrival, bpdu);
                        true
                    }
                    PortRole::Alternate => {
                        let Some(r) = self.root_index() else {
                            // an alternate without a root port is stale
                            // state; keep the neighbour's latest offer
                            self.update_port_vector(arrival, bpdu);
                            return false;
                        };
                        let case2 = self.contest_against(arrival, bpdu, r);
                        if case2 < 0 {
                            // worse than what we would send: take the segment
                            self.ports[arrival].status =
                                PortStatus::Designated(PortPhase::Discarding);
                            self.send_bpdu(arrival, ctx);
                        } else {
                            self.ports[arrival].lost_bpdu = 0;
                        }
                        self.update_port_vector(arrival, bpdu);
                        false
                    }
                    _ => {
                        self.update_port_vector(arrival, bpdu);
                        false
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Ranking forms
    // ------------------------------------------------------------------

    /// Stored port vector vs the frame vector with the link cost added.
    fn compare_incoming(&self, port: usize, bpdu: &Bpdu, link_cost: u32) -> i8 {
        let frame = PriorityVector::from_bpdu(bpdu, link_cost);
        rank(&self.ports[port].vector, &frame)
    }

    /// What this bridge would originate on `port` (root path cost advanced
    /// by the port's link cost) vs the port's stored vector.
    fn contest_local(&self, port: usize, root: usize) -> i8 {
        let local = PriorityVector {
            root: self.ports[root].vector.root,
            root_path_cost: self.ports[root].vector.root_path_cost + self.ports[port].link_cost,
            bridge: self.bridge_id(),
            port_priority: self.ports[port].priority,
            port_num: port as u16,
        };
        rank(&local, &self.ports[port].vector)
    }

    /// What this bridge would originate on `port` vs an incoming frame,
    /// both without link cost.
    fn contest_against(&self, port: usize, bpdu: &Bpdu, root: usize) -> i8 {
        let local = PriorityVector {
            root: self.ports[root].vector.root,
            root_path_cost: self.ports[root].vector.root_path_cost,
            bridge: self.bridge_id(),
            port_priority: self.ports[port].priority,
            port_num: port as u16,
        };
        rank(&local, &PriorityVector::from_bpdu(bpdu, 0))
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Port currently holding the Root role.
    pub fn root_port(&self) -> Option<usize> {
        self.root_index()
    }

    fn root_index(&self) -> Option<usize> {
        self.ports.iter().position(|p| p.status == PortStatus::Root)
    }

    /// Best alternate port: lowest (cost, bridge id, port id) among the
    /// stored vectors. Root identity is irrelevant between alternates that
    /// all point at the same root.
    fn best_alternate(&self) -> Option<usize> {
        self.ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == PortStatus::Alternate)
            .min_by_key(|(_, p)| {
                (
                    p.vector.root_path_cost,
                    p.vector.bridge.priority,
                    p.vector.bridge.mac,
                    p.vector.port_priority,
                    p.vector.port_num,
                )
            })
            .map(|(i, _)| i)
    }

    // ------------------------------------------------------------------
    // Egress
    // ------------------------------------------------------------------

    fn make_bpdu(&self, port: usize, now: SimTime) -> Bpdu {
        let (root, root_path_cost, message_age) = match self.root_index() {
            Some(r) => (
                self.ports[r].vector.root,
                self.ports[r].vector.root_path_cost,
                self.ports[r].age,
            ),
            // no root port: this bridge is the root
            None => (self.bridge_id(), 0, 0),
        };

        Bpdu {
            root,
            root_path_cost,
            bridge: self.bridge_id(),
            port_priority: self.ports[port].priority,
            port_num: port as u16,
            message_age,
            max_age: self.max_age,
            hello_time: self.hello_secs,
            forward_delay: self.forward_delay_secs,
            tc: now < self.ports[port].tc_while,
            tca: false,
        }
    }

    /// Emit one BPDU on `port` unless the port is disabled.
    fn send_bpdu(&mut self, port: usize, ctx: &mut EngineCtx) {
        if self.ports[port].role() == PortRole::Disabled {
            return;
        }
        let bpdu = self.make_bpdu(port, ctx.now);
        trace!(port, %bpdu, "BPDU sent");
        ctx.relay.send(port, bpdu);
        self.stats.bpdus_sent += 1;
    }

    /// Emit BPDUs on every port eligible to originate: non-edge ports that
    /// are neither Root nor Alternate nor Disabled.
    fn send_bpdus(&mut self, ctx: &mut EngineCtx) {
        for i in 0..self.ports.len() {
            let role = self.ports[i].role();
            if self.ports[i].edge
                || matches!(role, PortRole::Root | PortRole::Alternate | PortRole::Disabled)
            {
                continue;
            }
            self.send_bpdu(i, ctx);
        }
    }

    /// Notify the root of a topology change: one TC-flagged BPDU out the
    /// root port. Without `force`, only while the root port's tc-while
    /// deadline is live.
    fn send_tcn_to_root(&mut self, ctx: &mut EngineCtx, force: bool) {
        let Some(r) = self.root_index() else {
            return;
        };
        if !force && ctx.now >= self.ports[r].tc_while {
            return;
        }
        let mut bpdu = self.make_bpdu(r, ctx.now);
        bpdu.tc = true;
        trace!(port = r, "TC notification sent toward root");
        ctx.relay.send(r, bpdu);
        self.stats.bpdus_sent += 1;
    }

    // ------------------------------------------------------------------
    // Port records
    // ------------------------------------------------------------------

    /// Reset a port's stored vector to "this bridge is root".
    fn init_port(&mut self, port: usize) {
        let own = self.bridge_id();
        let rec = &mut self.ports[port];
        rec.vector = PriorityVector {
            root: own,
            root_path_cost: 0,
            bridge: own,
            port_priority: rec.priority,
            port_num: port as u16,
        };
        rec.age = 0;
        rec.lost_bpdu = 0;
    }

    /// Reset every port to its starting role and vector and flush the
    /// learning table, port by port.
    fn init_ports(&mut self, ctx: &mut EngineCtx) {
        for j in 0..self.ports.len() {
            self.ports[j].status = if self.ports[j].edge {
                PortStatus::Edge
            } else {
                PortStatus::NotAssigned
            };
            self.init_port(j);
            ctx.mac_table.flush(j);
        }
    }

    /// Store an accepted frame vector on the port: link cost added, age
    /// hop-incremented, lost-BPDU counter confirmed.
    fn update_port_vector(&mut self, port: usize, bpdu: &Bpdu) {
        let cost = self.ports[port].link_cost;
        self.ports[port].vector = PriorityVector::from_bpdu(bpdu, cost);
        self.ports[port].age = bpdu.message_age + 1;
        self.ports[port].lost_bpdu = 0;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn bridge_id(&self) -> BridgeId {
        BridgeId::new(self.priority, self.address)
    }

    pub fn address(&self) -> MacAddr {
        self.address
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn port(&self, index: usize) -> &PortRecord {
        &self.ports[index]
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Snapshot of the bridge state for logs and assertions.
    pub fn describe(&self) -> BridgeStateSummary {
        BridgeStateSummary {
            bridge: self.bridge_id(),
            root_port: self.root_index(),
            ports: self
                .ports
                .iter()
                .enumerate()
                .map(|(i, p)| PortSummary {
                    index: i,
                    status: p.status,
                    edge: p.edge,
                    vector: p.vector,
                    age: p.age,
                    lost_bpdu: p.lost_bpdu,
                })
                .collect(),
        }
    }
}

/// Printable state snapshot.
#[derive(Debug, Clone)]
pub struct BridgeStateSummary {
    pub bridge: BridgeId,
    pub root_port: Option<usize>,
    pub ports: Vec<PortSummary>,
}

#[derive(Debug, Clone)]
pub struct PortSummary {
    pub index: usize,
    pub status: PortStatus,
    pub edge: bool,
    pub vector: PriorityVector,
    pub age: u16,
    pub lost_bpdu: u8,
}

impl std::fmt::Display for BridgeStateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.root_port {
            Some(r) => writeln!(f, "bridge {} root via port {r}", self.bridge)?,
            None => writeln!(f, "bridge {} believes it is root", self.bridge)?,
        }
        for p in &self.ports {
            writeln!(
                f,
                "  port {}: {}{} root={} cost={} via={} lost={}",
                p.index,
                p.status,
                if p.edge { " [edge]" } else { "" },
                p.vector.root,
                p.vector.root_path_cost,
                p.vector.bridge,
                p.lost_bpdu,
            )?;
        }
        Ok(())
    }
}
