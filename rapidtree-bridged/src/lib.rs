//! Bridge daemon library
//!
//! Runs one spanning tree engine over real network interfaces: clap CLI,
//! TOML configuration, and a tokio event loop that maps the engine's timer
//! deadlines onto real time and its relay onto raw Ethernet sockets.

pub mod args;
pub mod driver;
pub mod runtime;

use std::path::Path;

use rapidtree_core::{BridgeConfig, Error, Result};

/// Load and validate a bridge configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BridgeConfig> {
    let data = std::fs::read_to_string(&path)?;
    let config: BridgeConfig =
        toml::from_str(&data).map_err(|e| Error::config(format!("{e}")))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use rapidtree_core::BridgeConfig;

    #[test]
    fn test_config_parses_from_toml() {
        let config: BridgeConfig = toml::from_str(
            r#"
            priority = 4096
            hello_time = 1.0
            tc_while_time = 10.0

            [[port]]
            interface = "eth0"
            edge = false
            link_cost = 4

            [[port]]
            interface = "eth1"

            [[port]]
            interface = "eth2"
            edge = true
            "#,
        )
        .unwrap();

        assert_eq!(config.priority, 4096);
        assert_eq!(config.hello_time, 1.0);
        assert_eq!(config.ports.len(), 3);
        assert_eq!(config.ports[0].interface.as_deref(), Some("eth0"));
        assert_eq!(config.ports[0].link_cost, 4);
        assert_eq!(config.ports[1].link_cost, 19);
        assert!(!config.is_edge(0));
        assert!(config.is_edge(2));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_defaults_when_empty() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.priority, 32768);
        assert_eq!(config.max_age, 20);
        assert!(config.ports.is_empty());
    }
}
