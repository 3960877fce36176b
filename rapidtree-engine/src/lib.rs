//! Rapid Spanning Tree engine
//!
//! One [`Engine`](rstp::Engine) instance runs per bridge. It consumes
//! received BPDUs and timer events, assigns every local port a role and a
//! forwarding state, and emits BPDUs through the [`Relay`](rstp::Relay)
//! seam so that the forwarding ports across a bridged network converge on
//! a loop-free spanning tree rooted at the lowest bridge identifier.
//!
//! The engine is synchronous and deterministic: every entry point receives
//! the current virtual time and runs to completion before the next event.

pub mod port;
pub mod rstp;
pub mod vector;

pub use port::{PortPhase, PortRecord, PortRole, PortState, PortStatus};
pub use rstp::{
    BridgeStateSummary, Engine, EngineCtx, EngineStats, LifecycleEvent, PortSummary, Relay,
    TimerKind,
};
pub use vector::{rank, PriorityVector};
