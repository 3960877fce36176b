//! Rapidtree wire formats
//!
//! Construction and parsing of the frames the bridge engine exchanges:
//! 802.3 Ethernet frames carrying LLC-encapsulated BPDUs.

pub mod bpdu;
pub mod ethernet;
pub mod llc;

pub use bpdu::{decode_bpdu_frame, encode_bpdu_frame, Bpdu};
pub use ethernet::{EtherType, EthernetFrame};
pub use llc::LlcHeader;
