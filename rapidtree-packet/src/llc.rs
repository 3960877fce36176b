//! LLC (Logical Link Control) header
//!
//! BPDUs are carried in plain LLC frames with DSAP/SSAP 0x42 and an
//! Unnumbered Information control byte. No SNAP extension is involved.

/// LLC header (3 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlcHeader {
    /// Destination Service Access Point
    pub dsap: u8,
    /// Source Service Access Point
    pub ssap: u8,
    /// Control field
    pub control: u8,
}

impl LlcHeader {
    /// LLC header size in bytes
    pub const SIZE: usize = 3;

    /// DSAP/SSAP assigned to the spanning tree protocol
    pub const SAP_BPDU: u8 = 0x42;

    /// Unnumbered Information control byte
    pub const CONTROL_UI: u8 = 0x03;

    /// Create the BPDU LLC header (0x42, 0x42, 0x03)
    pub fn bpdu() -> Self {
        LlcHeader {
            dsap: Self::SAP_BPDU,
            ssap: Self::SAP_BPDU,
            control: Self::CONTROL_UI,
        }
    }

    /// True when this header announces a BPDU payload
    pub fn is_bpdu(&self) -> bool {
        self.dsap == Self::SAP_BPDU
            && self.ssap == Self::SAP_BPDU
            && self.control == Self::CONTROL_UI
    }

    /// Convert to bytes
    pub fn to_bytes(&self) -> [u8; 3] {
        [self.dsap, self.ssap, self.control]
    }

    /// Parse from bytes
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(LlcHeader {
            dsap: data[0],
            ssap: data[1],
            control: data[2],
        })
    }
}
