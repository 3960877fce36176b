//! Virtual bridge network
//!
//! Owns the bridges, the segments between them, and a single event queue.
//! Frames cross links with a small fixed latency and go through the real
//! encode/decode path; timers fire straight from each engine's published
//! deadlines. Ties resolve frames first, then timers by bridge index, so
//! runs are deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tracing::{trace, warn};

use rapidtree_core::{
    BridgeConfig, LearningTable, MacAddr, Result, SimTime, StaticInterfaceTable,
};
use rapidtree_engine::{Engine, EngineCtx, LifecycleEvent, PortState, TimerKind};
use rapidtree_packet::{decode_bpdu_frame, encode_bpdu_frame, Bpdu};

use crate::hub::{Attachment, Segment};

/// One bridge with its engine, learning table and pending transmissions.
pub struct BridgeNode {
    pub engine: Engine,
    pub table: LearningTable,
    outbox: Vec<(usize, Bpdu)>,
}

#[derive(Debug)]
struct FrameDelivery {
    at: SimTime,
    seq: u64,
    to: Attachment,
    data: Vec<u8>,
}

impl PartialEq for FrameDelivery {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for FrameDelivery {}

impl PartialOrd for FrameDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameDelivery {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// A simulated network of bridges.
pub struct Network {
    bridges: Vec<BridgeNode>,
    segments: Vec<Segment>,
    port_segment: HashMap<(usize, usize), usize>,
    queue: BinaryHeap<Reverse<FrameDelivery>>,
    seq: u64,
    now: SimTime,
    latency: Duration,
}

impl Network {
    pub fn new() -> Self {
        Self::with_latency(Duration::from_micros(10))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            bridges: Vec::new(),
            segments: Vec::new(),
            port_segment: HashMap::new(),
            queue: BinaryHeap::new(),
            seq: 0,
            now: SimTime::ZERO,
            latency,
        }
    }

    /// Add a bridge with `port_count` ports. Link costs come from the
    /// per-port configuration.
    pub fn add_bridge(
        &mut self,
        config: BridgeConfig,
        mac: MacAddr,
        port_count: usize,
    ) -> Result<usize> {
        let costs = (0..port_count).map(|i| config.port(i).link_cost).collect();
        let interfaces = StaticInterfaceTable::new(vec![mac; port_count], costs);
        let engine = Engine::new(&config, &interfaces)?;
        self.bridges.push(BridgeNode {
            engine,
            table: LearningTable::new(),
            outbox: Vec::new(),
        });
        Ok(self.bridges.len() - 1)
    }

    /// Point-to-point link between two bridge ports.
    pub fn link(&mut self, a: usize, port_a: usize, b: usize, port_b: usize) {
        self.attach(Segment::new(vec![
            Attachment { bridge: a, port: port_a },
            Attachment { bridge: b, port: port_b },
        ]));
    }

    /// Shared half-duplex segment (hub) joining any number of ports.
    pub fn shared_segment(&mut self, points: &[(usize, usize)]) {
        self.attach(Segment::new(
            points
                .iter()
                .map(|&(bridge, port)| Attachment { bridge, port })
                .collect(),
        ));
    }

    fn attach(&mut self, segment: Segment) {
        let index = self.segments.len();
        for att in segment.attachments() {
            self.port_segment.insert((att.bridge, att.port), index);
        }
        self.segments.push(segment);
    }

    pub fn start(&mut self, bridge: usize) {
        self.lifecycle(bridge, LifecycleEvent::Startup);
    }

    pub fn stop(&mut self, bridge: usize) {
        self.lifecycle(bridge, LifecycleEvent::Shutdown);
    }

    pub fn start_all(&mut self) {
        for b in 0..self.bridges.len() {
            self.start(b);
        }
    }

    /// Deliver a lifecycle operation at the current virtual time.
    pub fn lifecycle(&mut self, bridge: usize, event: LifecycleEvent) {
        let now = self.now;
        {
            let BridgeNode { engine, table, outbox } = &mut self.bridges[bridge];
            let mut ctx = EngineCtx {
                now,
                mac_table: table,
                relay: outbox,
            };
            engine.handle_lifecycle(event, &mut ctx);
        }
        self.flush_outbox(bridge);
    }

    /// Hand a crafted BPDU straight to a bridge port at the current time,
    /// as if it had just arrived there.
    pub fn inject_bpdu(
        &mut self,
        bridge: usize,
        port: usize,
        bpdu: &Bpdu,
        src: MacAddr,
    ) -> Result<()> {
        let now = self.now;
        {
            let BridgeNode { engine, table, outbox } = &mut self.bridges[bridge];
            let mut ctx = EngineCtx {
                now,
                mac_table: table,
                relay: outbox,
            };
            engine.on_bpdu(bpdu, port, src, &mut ctx)?;
        }
        self.flush_outbox(bridge);
        Ok(())
    }

    /// Process events in order until virtual time `t`.
    pub fn run_until(&mut self, t: SimTime) {
        loop {
            let frame_at = self.queue.peek().map(|Reverse(f)| f.at);
            let timer = self
                .bridges
                .iter()
                .enumerate()
                .filter_map(|(i, n)| n.engine.next_deadline().map(|(at, kind)| (at, i, kind)))
                .min();

            let frame_first = match (frame_at, &timer) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(f), Some((at, _, _))) => f <= *at,
            };

            if frame_first {
                let Some(Reverse(frame)) = self.queue.pop() else {
                    break;
                };
                if frame.at > t {
                    self.queue.push(Reverse(frame));
                    break;
                }
                self.now = frame.at;
                self.deliver(frame);
            } else if let Some((at, bridge, kind)) = timer {
                if at > t {
                    break;
                }
                self.now = at;
                self.fire_timer(bridge, kind);
            }
        }
        self.now = t;
    }

    fn deliver(&mut self, frame: FrameDelivery) {
        let now = self.now;
        match decode_bpdu_frame(&frame.data) {
            Ok(Some((src, bpdu))) => {
                let Attachment { bridge, port } = frame.to;
                {
                    let BridgeNode { engine, table, outbox } = &mut self.bridges[bridge];
                    let mut ctx = EngineCtx {
                        now,
                        mac_table: table,
                        relay: outbox,
                    };
                    if let Err(e) = engine.on_bpdu(&bpdu, port, src, &mut ctx) {
                        warn!(bridge, port, error = %e, "BPDU rejected");
                    }
                }
                self.flush_outbox(bridge);
            }
            Ok(None) => trace!("non-BPDU frame ignored"),
            Err(e) => warn!(error = %e, "undecodable frame dropped"),
        }
    }

    fn fire_timer(&mut self, bridge: usize, kind: TimerKind) {
        let now = self.now;
        {
            let BridgeNode { engine, table, outbox } = &mut self.bridges[bridge];
            let mut ctx = EngineCtx {
                now,
                mac_table: table,
                relay: outbox,
            };
            engine.on_timer(kind, &mut ctx);
        }
        self.flush_outbox(bridge);
    }

    /// Frame and schedule everything the engine queued on its relay.
    fn flush_outbox(&mut self, bridge: usize) {
        let pending = std::mem::take(&mut self.bridges[bridge].outbox);
        let src = self.bridges[bridge].engine.address();
        for (port, bpdu) in pending {
            let Some(&segment) = self.port_segment.get(&(bridge, port)) else {
                trace!(bridge, port, "BPDU sent on an unattached port, dropped");
                continue;
            };
            let data = encode_bpdu_frame(src, &bpdu);
            let from = Attachment { bridge, port };
            let at = self.now + self.latency;
            for to in self.segments[segment].fanout(from) {
                self.seq += 1;
                self.queue.push(Reverse(FrameDelivery {
                    at,
                    seq: self.seq,
                    to,
                    data: data.clone(),
                }));
            }
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    pub fn engine(&self, bridge: usize) -> &Engine {
        &self.bridges[bridge].engine
    }

    pub fn node_mut(&mut self, bridge: usize) -> &mut BridgeNode {
        &mut self.bridges[bridge]
    }

    /// Whether the union of forwarding attachments forms a forest: no
    /// segment can be reached from another along two distinct forwarding
    /// paths. Checked over the bipartite bridge/segment graph.
    pub fn forwarding_is_tree(&self) -> bool {
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        let bridges = self.bridges.len();
        let mut parent: Vec<usize> = (0..bridges + self.segments.len()).collect();

        for (si, segment) in self.segments.iter().enumerate() {
            for att in segment.attachments() {
                let engine = &self.bridges[att.bridge].engine;
                if !engine.is_operational() {
                    continue;
                }
                if engine.port(att.port).state() != PortState::Forwarding {
                    continue;
                }
                let a = find(&mut parent, att.bridge);
                let b = find(&mut parent, bridges + si);
                if a == b {
                    return false;
                }
                parent[a] = b;
            }
        }
        true
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}
