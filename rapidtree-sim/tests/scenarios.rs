//! End-to-end convergence scenarios over the simulated network.

use std::time::Duration;

use rapidtree_core::{BridgeConfig, BridgeId, MacAddr, SimTime};
use rapidtree_engine::{PortRole, PortState};
use rapidtree_packet::Bpdu;
use rapidtree_sim::Network;

fn mac(last: u8) -> MacAddr {
    MacAddr([0, 0, 0, 0, 0, last])
}

fn cfg() -> BridgeConfig {
    BridgeConfig::default()
}

/// Reachable-state invariants: at most one root port per bridge, only
/// root and designated ports forward, aging counters only on ports that
/// age, and the global forwarding topology stays loop-free.
fn assert_invariants(net: &Network) {
    for b in 0..net.bridge_count() {
        let engine = net.engine(b);
        let roots = (0..engine.port_count())
            .filter(|&p| engine.port(p).role() == PortRole::Root)
            .count();
        assert!(roots <= 1, "bridge {b} has {roots} root ports");

        for p in 0..engine.port_count() {
            let rec = engine.port(p);
            if rec.state() == PortState::Forwarding {
                assert!(
                    matches!(rec.role(), PortRole::Root | PortRole::Designated),
                    "bridge {b} port {p} forwards as {:?}",
                    rec.role()
                );
            }
            if rec.lost_bpdu > 0 {
                assert!(
                    matches!(
                        rec.role(),
                        PortRole::Root | PortRole::Alternate | PortRole::Backup
                    ),
                    "bridge {b} port {p} ages as {:?}",
                    rec.role()
                );
            }
        }
    }
    assert!(net.forwarding_is_tree(), "forwarding topology has a loop");
}

#[test]
fn two_bridge_convergence() {
    let mut net = Network::new();
    let a = net.add_bridge(cfg(), mac(1), 1).unwrap();
    let b = net.add_bridge(cfg(), mac(2), 1).unwrap();
    net.link(a, 0, b, 0);
    net.start_all();

    // two forward delays bound the climb to forwarding
    net.run_until(SimTime::from_secs(31));

    // lower MAC wins: a believes it is root and owns the segment
    assert_eq!(net.engine(a).root_port(), None);
    assert_eq!(net.engine(a).port(0).role(), PortRole::Designated);
    assert_eq!(net.engine(a).port(0).state(), PortState::Forwarding);

    assert_eq!(net.engine(b).root_port(), Some(0));
    assert_eq!(net.engine(b).port(0).role(), PortRole::Root);
    assert_eq!(net.engine(b).port(0).state(), PortState::Forwarding);

    assert_invariants(&net);
}

#[test]
fn designated_port_walks_through_learning() {
    let mut net = Network::new();
    let a = net.add_bridge(cfg(), mac(1), 1).unwrap();
    let b = net.add_bridge(cfg(), mac(2), 1).unwrap();
    net.link(a, 0, b, 0);
    net.start_all();

    // the migration timer makes the port designated, still discarding
    net.run_until(SimTime::from_secs(14));
    assert_eq!(net.engine(a).port(0).role(), PortRole::Designated);
    assert_eq!(net.engine(a).port(0).state(), PortState::Discarding);

    // one forward-delay tick: learning
    net.run_until(SimTime::from_secs(16));
    assert_eq!(net.engine(a).port(0).state(), PortState::Learning);

    // one more: forwarding
    net.run_until(SimTime::from_secs(31));
    assert_eq!(net.engine(a).port(0).state(), PortState::Forwarding);
}

fn triangle() -> (Network, usize, usize, usize) {
    let mut net = Network::new();
    let a = net.add_bridge(cfg(), mac(1), 2).unwrap();
    let b = net.add_bridge(cfg(), mac(2), 2).unwrap();
    let c = net.add_bridge(cfg(), mac(3), 2).unwrap();
    net.link(a, 0, b, 0);
    net.link(a, 1, c, 0);
    net.link(b, 1, c, 1);
    net.start_all();
    net.run_until(SimTime::from_secs(45));
    (net, a, b, c)
}

#[test]
fn triangle_blocks_exactly_one_port() {
    let (net, a, b, c) = triangle();

    // a is root: no root port, both ports designated and forwarding
    assert_eq!(net.engine(a).root_port(), None);
    for p in 0..2 {
        assert_eq!(net.engine(a).port(p).role(), PortRole::Designated);
        assert_eq!(net.engine(a).port(p).state(), PortState::Forwarding);
    }

    // b reaches a directly and owns the b-c segment
    assert_eq!(net.engine(b).root_port(), Some(0));
    assert_eq!(net.engine(b).port(0).state(), PortState::Forwarding);
    assert_eq!(net.engine(b).port(1).role(), PortRole::Designated);
    assert_eq!(net.engine(b).port(1).state(), PortState::Forwarding);

    // c reaches a directly and keeps the path through b in reserve
    assert_eq!(net.engine(c).root_port(), Some(0));
    assert_eq!(net.engine(c).port(0).state(), PortState::Forwarding);
    assert_eq!(net.engine(c).port(1).role(), PortRole::Alternate);
    assert_eq!(net.engine(c).port(1).state(), PortState::Discarding);

    assert_invariants(&net);
}

#[test]
fn root_failure_reelects_next_lowest_bridge() {
    let (mut net, a, b, c) = triangle();

    net.stop(a);
    let resume = net.now();
    net.run_until(resume + Duration::from_secs(50));

    // b has the lower MAC of the survivors and becomes the new root
    assert!(!net.engine(a).is_operational());
    assert_eq!(net.engine(b).root_port(), None);
    assert_eq!(net.engine(b).port(1).role(), PortRole::Designated);
    assert_eq!(net.engine(b).port(1).state(), PortState::Forwarding);

    // c now roots through the surviving b-c link
    assert_eq!(net.engine(c).root_port(), Some(1));
    assert_eq!(net.engine(c).port(1).state(), PortState::Forwarding);
    assert_eq!(
        net.engine(c).port(1).vector.root,
        BridgeId::new(32768, mac(2))
    );

    assert_invariants(&net);
}

#[test]
fn tc_flag_flushes_and_notifies_root_in_one_turn() {
    let mut net = Network::new();
    let a = net.add_bridge(cfg(), mac(1), 1).unwrap();
    let b = net.add_bridge(cfg(), mac(2), 2).unwrap();
    net.link(a, 0, b, 0);
    net.start_all();
    net.run_until(SimTime::from_secs(35));
    assert_eq!(net.engine(b).root_port(), Some(0));
    assert_eq!(net.engine(b).port(0).state(), PortState::Forwarding);

    // hosts learned on both of b's ports
    let now = net.now();
    net.node_mut(b).table.learn(mac(0x51), 0, now);
    net.node_mut(b).table.learn(mac(0x52), 1, now);

    // the root restates its advertisement with the TC flag raised
    let sent_before = net.engine(b).stats().bpdus_sent;
    let tc_before = net.engine(b).stats().tc_events;
    let tc_frame = Bpdu {
        root: BridgeId::new(32768, mac(1)),
        root_path_cost: 0,
        bridge: BridgeId::new(32768, mac(1)),
        port_priority: 128,
        port_num: 0,
        message_age: 0,
        max_age: 20,
        hello_time: 2,
        forward_delay: 15,
        tc: true,
        tca: false,
    };
    net.inject_bpdu(b, 0, &tc_frame, mac(1)).unwrap();

    // same event turn: the other port was flushed, the arrival port kept
    // its entries, and exactly one TC notification left toward the root
    assert_eq!(net.engine(b).stats().tc_events, tc_before + 1);
    assert_eq!(net.node_mut(b).table.lookup(&mac(0x52)), None);
    assert_eq!(net.node_mut(b).table.lookup(&mac(0x51)), Some(0));
    assert_eq!(net.engine(b).stats().bpdus_sent, sent_before + 1);
    assert!(net.now() < net.engine(b).port(1).tc_while);

    // the notification reaches the root side
    let a_before = net.engine(a).stats().tc_events;
    let later = net.now() + Duration::from_secs(1);
    net.run_until(later);
    assert!(net.engine(a).stats().tc_events > a_before);
}

#[test]
fn shared_segment_backup_detection() {
    // two ports of the same bridge on one medium
    let mut net = Network::new();
    let a = net.add_bridge(cfg(), mac(1), 2).unwrap();
    net.shared_segment(&[(a, 0), (a, 1)]);
    net.start_all();
    net.run_until(SimTime::from_secs(35));

    // the higher-numbered port lost the tie-break
    assert_eq!(net.engine(a).port(1).role(), PortRole::Backup);
    assert_eq!(net.engine(a).port(1).state(), PortState::Discarding);
    assert_eq!(net.engine(a).port(0).role(), PortRole::Designated);
    assert_eq!(net.engine(a).port(0).state(), PortState::Forwarding);

    assert_invariants(&net);
}

#[test]
fn hub_with_second_bridge() {
    // both of a's ports and b's single port share one hub
    let mut net = Network::new();
    let a = net.add_bridge(cfg(), mac(1), 2).unwrap();
    let b = net.add_bridge(cfg(), mac(2), 1).unwrap();
    net.shared_segment(&[(a, 0), (a, 1), (b, 0)]);
    net.start_all();
    net.run_until(SimTime::from_secs(35));

    assert_eq!(net.engine(a).root_port(), None);
    assert_eq!(net.engine(a).port(0).role(), PortRole::Designated);
    assert_eq!(net.engine(a).port(0).state(), PortState::Forwarding);
    assert_eq!(net.engine(a).port(1).role(), PortRole::Backup);

    assert_eq!(net.engine(b).root_port(), Some(0));
    assert_eq!(net.engine(b).port(0).state(), PortState::Forwarding);

    assert_invariants(&net);
}

#[test]
fn square_topology_stays_loop_free() {
    // four bridges in a ring: one port somewhere must block
    let mut net = Network::new();
    let ids: Vec<usize> = (1..=4)
        .map(|i| net.add_bridge(cfg(), mac(i), 2).unwrap())
        .collect();
    for i in 0..4 {
        let next = (i + 1) % 4;
        net.link(ids[i], 1, ids[next], 0);
    }
    net.start_all();
    net.run_until(SimTime::from_secs(60));

    // bridge 1 wins the election
    assert_eq!(net.engine(ids[0]).root_port(), None);
    // everyone else found a root port
    for &b in &ids[1..] {
        assert!(net.engine(b).root_port().is_some());
    }
    // exactly one port in the ring discards traffic
    let discarding: usize = ids
        .iter()
        .map(|&b| {
            (0..2)
                .filter(|&p| net.engine(b).port(p).state() != PortState::Forwarding)
                .count()
        })
        .sum();
    assert_eq!(discarding, 1);

    assert_invariants(&net);
}
