//! Deterministic simulation harness
//!
//! Wires several bridge engines together over virtual links and shared
//! segments, drives their timers from a single virtual clock, and delivers
//! frames through the real codec. Events are processed one at a time in a
//! fixed order, so every run is reproducible bit for bit.

pub mod hub;
pub mod net;

pub use hub::{Attachment, Segment};
pub use net::{BridgeNode, Network};
