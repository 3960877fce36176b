//! Bridge configuration
//!
//! Strongly-typed configuration for one bridge instance. The daemon
//! deserialises this from a TOML file; the simulator builds it in code.
//! Timer periods are expressed in seconds (fractional values allowed).

use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Configuration for one spanning tree bridge instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge priority; lower wins the root election
    pub priority: u16,

    /// Maximum accepted message age, in hop-incremented seconds.
    /// Frames at or above this age are discarded on ingest.
    pub max_age: u16,

    /// Hello period in seconds
    pub hello_time: f64,

    /// Forward delay in seconds (Discarding -> Learning -> Forwarding pace)
    pub forward_delay: f64,

    /// Period after which NotAssigned ports are promoted to Designated
    pub migrate_time: f64,

    /// How long outbound BPDUs keep the topology-change flag after an event
    pub tc_while_time: f64,

    /// Edge-ness assumed for ports without an explicit `edge` entry
    pub auto_edge: bool,

    /// Per-port settings; ports beyond this list take defaults
    #[serde(rename = "port")]
    pub ports: Vec<PortConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            priority: 32768,
            max_age: 20,
            hello_time: 2.0,
            forward_delay: 15.0,
            migrate_time: 3.0,
            tc_while_time: 15.0,
            auto_edge: false,
            ports: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Validate timer periods; fatal at startup when violated.
    pub fn validate(&self) -> Result<()> {
        if self.max_age == 0 {
            return Err(Error::config("max_age must be positive"));
        }
        for (name, value) in [
            ("hello_time", self.hello_time),
            ("forward_delay", self.forward_delay),
            ("migrate_time", self.migrate_time),
        ] {
            if !(value > 0.0) {
                return Err(Error::config(format!("{name} must be positive")));
            }
        }
        if self.tc_while_time < 0.0 {
            return Err(Error::config("tc_while_time must not be negative"));
        }
        Ok(())
    }

    pub fn hello_time(&self) -> Duration {
        Duration::from_secs_f64(self.hello_time)
    }

    pub fn forward_delay(&self) -> Duration {
        Duration::from_secs_f64(self.forward_delay)
    }

    pub fn migrate_time(&self) -> Duration {
        Duration::from_secs_f64(self.migrate_time)
    }

    pub fn tc_while_time(&self) -> Duration {
        Duration::from_secs_f64(self.tc_while_time)
    }

    /// Effective settings for port `index`, falling back to defaults for
    /// ports the file does not mention.
    pub fn port(&self, index: usize) -> PortConfig {
        self.ports.get(index).cloned().unwrap_or_default()
    }

    /// Whether port `index` is an edge port (explicit flag, else `auto_edge`)
    pub fn is_edge(&self, index: usize) -> bool {
        self.ports
            .get(index)
            .and_then(|p| p.edge)
            .unwrap_or(self.auto_edge)
    }
}

/// Per-port configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Edge ports face end hosts and never take part in the election
    pub edge: Option<bool>,

    /// Path cost of the attached link
    pub link_cost: u32,

    /// Port priority, tie-break before the port number
    pub priority: u8,

    /// Name of the backing OS interface (daemon only)
    pub interface: Option<String>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            edge: None,
            link_cost: 19,
            priority: 128,
            interface: None,
        }
    }
}
