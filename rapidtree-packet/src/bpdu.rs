//! BPDU codec
//!
//! Parsing and building of the Bridge Protocol Data Units the engine
//! exchanges. The engine emits Rapid Spanning Tree BPDUs (protocol version
//! 2); classic 802.1D configuration BPDUs are accepted on ingest since the
//! field layout they share is all the engine reads.

use bytes::{BufMut, BytesMut};
use std::fmt;

use rapidtree_core::{BridgeId, Error, MacAddr, Result};

use crate::ethernet::{EtherType, EthernetFrame};
use crate::llc::LlcHeader;

/// Protocol identifier (always 0x0000)
pub const STP_PROTOCOL_ID: u16 = 0x0000;

/// Protocol versions
pub const STP_VERSION_CONFIG: u8 = 0x00;
pub const STP_VERSION_RSTP: u8 = 0x02;

/// BPDU type bytes
pub const BPDU_TYPE_CONFIG: u8 = 0x00;
pub const BPDU_TYPE_TCN: u8 = 0x80;
pub const BPDU_TYPE_RST: u8 = 0x02;

/// Flag bits
const FLAG_TC: u8 = 0x01;
const FLAG_TCA: u8 = 0x80;

/// Config BPDU body size; the RST form appends a version-1 length byte
pub const CONFIG_BPDU_SIZE: usize = 35;
pub const RST_BPDU_SIZE: usize = 36;

/// A configuration / rapid spanning tree BPDU.
///
/// Durations are whole seconds; the wire carries them in 1/256 s units.
/// The message age is hop-incremented by one second per bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bpdu {
    /// Identity of the bridge the sender believes is root
    pub root: BridgeId,
    /// Sender's cost to that root
    pub root_path_cost: u32,
    /// Identity of the sending bridge
    pub bridge: BridgeId,
    /// Priority of the sending port (multiple of 16, default 128)
    pub port_priority: u8,
    /// Number of the sending port
    pub port_num: u16,
    /// Age of the root information, in hop-incremented seconds
    pub message_age: u16,
    /// Age bound after which the information is discarded
    pub max_age: u16,
    /// Sender's hello period in seconds
    pub hello_time: u16,
    /// Sender's forward delay in seconds
    pub forward_delay: u16,
    /// Topology change flag
    pub tc: bool,
    /// Topology change acknowledgment flag
    pub tca: bool,
}

impl Bpdu {
    /// Pack port priority and number into the 802.1t port id: high nibble
    /// is priority/16, low 12 bits are the port number.
    fn port_id(&self) -> u16 {
        ((self.port_priority as u16 & 0x00F0) << 8) | (self.port_num & 0x0FFF)
    }

    fn split_port_id(raw: u16) -> (u8, u16) {
        (((raw >> 8) & 0x00F0) as u8, raw & 0x0FFF)
    }

    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.tc {
            flags |= FLAG_TC;
        }
        if self.tca {
            flags |= FLAG_TCA;
        }
        flags
    }

    /// Parse a BPDU body (the bytes following the LLC header).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::parsing("BPDU too short"));
        }

        let protocol_id = u16::from_be_bytes([data[0], data[1]]);
        if protocol_id != STP_PROTOCOL_ID {
            return Err(Error::parsing(format!(
                "Unknown BPDU protocol id: 0x{protocol_id:04x}"
            )));
        }

        let version = data[2];
        let bpdu_type = data[3];
        match (version, bpdu_type) {
            (STP_VERSION_CONFIG, BPDU_TYPE_CONFIG) | (STP_VERSION_RSTP, BPDU_TYPE_RST) => {}
            (_, BPDU_TYPE_TCN) => {
                return Err(Error::parsing("TCN BPDU carries no priority vector"));
            }
            _ => {
                return Err(Error::parsing(format!(
                    "Unknown BPDU version/type: version={version}, type={bpdu_type}"
                )));
            }
        }

        if data.len() < CONFIG_BPDU_SIZE {
            return Err(Error::parsing(format!(
                "BPDU too short: {} bytes (need {})",
                data.len(),
                CONFIG_BPDU_SIZE
            )));
        }

        let flags = data[4];
        let root = BridgeId::from_bytes(&data[5..13])?;
        let root_path_cost = u32::from_be_bytes([data[13], data[14], data[15], data[16]]);
        let bridge = BridgeId::from_bytes(&data[17..25])?;
        let (port_priority, port_num) =
            Self::split_port_id(u16::from_be_bytes([data[25], data[26]]));

        let wire_secs = |hi: u8, lo: u8| u16::from_be_bytes([hi, lo]) / 256;

        Ok(Bpdu {
            root,
            root_path_cost,
            bridge,
            port_priority,
            port_num,
            message_age: wire_secs(data[27], data[28]),
            max_age: wire_secs(data[29], data[30]),
            hello_time: wire_secs(data[31], data[32]),
            forward_delay: wire_secs(data[33], data[34]),
            tc: flags & FLAG_TC != 0,
            tca: flags & FLAG_TCA != 0,
        })
    }

    /// Build the RST BPDU body.
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(RST_BPDU_SIZE);

        bytes.put_u16(STP_PROTOCOL_ID);
        bytes.put_u8(STP_VERSION_RSTP);
        bytes.put_u8(BPDU_TYPE_RST);
        bytes.put_u8(self.flags());
        bytes.put_slice(&self.root.to_bytes());
        bytes.put_u32(self.root_path_cost);
        bytes.put_slice(&self.bridge.to_bytes());
        bytes.put_u16(self.port_id());
        bytes.put_u16(self.message_age * 256);
        bytes.put_u16(self.max_age * 256);
        bytes.put_u16(self.hello_time * 256);
        bytes.put_u16(self.forward_delay * 256);
        // version-1 length, always zero
        bytes.put_u8(0);

        bytes.to_vec()
    }
}

impl fmt::Display for Bpdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "root={} cost={} bridge={} port={}/{} age={}{}",
            self.root,
            self.root_path_cost,
            self.bridge,
            self.port_priority,
            self.port_num,
            self.message_age,
            if self.tc { " TC" } else { "" }
        )
    }
}

/// Wrap a BPDU in LLC and an 802.3 frame addressed to the STP multicast
/// group, padded to the Ethernet minimum.
pub fn encode_bpdu_frame(src: MacAddr, bpdu: &Bpdu) -> Vec<u8> {
    let mut payload = Vec::with_capacity(LlcHeader::SIZE + RST_BPDU_SIZE);
    payload.extend_from_slice(&LlcHeader::bpdu().to_bytes());
    payload.extend_from_slice(&bpdu.build());

    EthernetFrame::new(MacAddr::STP_MULTICAST, src, EtherType::Llc, payload).to_bytes()
}

/// Classify a raw frame. Returns the source MAC and BPDU for frames on the
/// STP multicast group, `None` for unrelated traffic, and an error for
/// frames that claim to be BPDUs but do not parse.
pub fn decode_bpdu_frame(data: &[u8]) -> Result<Option<(MacAddr, Bpdu)>> {
    let Some(frame) = EthernetFrame::from_bytes(data) else {
        return Ok(None);
    };
    if frame.destination != MacAddr::STP_MULTICAST || frame.ethertype != EtherType::Llc {
        return Ok(None);
    }
    let Some(llc) = LlcHeader::from_bytes(&frame.payload) else {
        return Ok(None);
    };
    if !llc.is_bpdu() {
        return Ok(None);
    }

    let bpdu = Bpdu::parse(&frame.payload[LlcHeader::SIZE..])?;
    Ok(Some((frame.source, bpdu)))
}
