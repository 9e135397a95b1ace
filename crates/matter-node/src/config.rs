//! Node configuration file.
//!
//! Recognizes exactly the options the core itself consults
//! (`network.interface`, `mdns.networkinterface`) and passes everything
//! under `behaviors.*` through opaquely for the benefit of whatever
//! data-model/cluster layer a real node would plug in above this core.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    /// Opaque per-cluster behavior knobs, forwarded verbatim to
    /// whatever owns the data model; this crate never interprets them.
    #[serde(default)]
    pub behaviors: HashMap<String, toml::Value>,
}

/// Network-layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network interface to bind the UDP transport to. Empty means "let
    /// the OS pick" (all interfaces, ephemeral port).
    #[serde(default)]
    pub interface: String,
    /// UDP port to listen on. 0 = OS-assigned ephemeral port.
    #[serde(default)]
    pub listen_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            listen_port: 0,
        }
    }
}

/// mDNS discovery settings (the discovery implementation itself is out
/// of scope for this core; only the config surface is carried so a
/// real discovery module can read it from the same file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdnsConfig {
    /// Network interface mDNS should advertise/browse on.
    #[serde(default)]
    pub networkinterface: String,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            networkinterface: String::new(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from the default config file location,
    /// falling back to defaults if no file exists there.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: NodeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The data directory this node stores its config (and, for a real
    /// backend, persisted state) under.
    pub fn data_dir(&self) -> PathBuf {
        Self::default_data_dir()
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("MATTER_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".matter-node"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/matter-node"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_wide_open() {
        let config = NodeConfig::default();
        assert_eq!(config.network.listen_port, 0);
        assert!(config.network.interface.is_empty());
        assert!(config.behaviors.is_empty());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = NodeConfig::default();
        config.network.listen_port = 5540;
        config
            .behaviors
            .insert("on_off".to_string(), toml::Value::Boolean(true));

        let text = toml::to_string(&config).expect("serialize");
        let parsed: NodeConfig = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.network.listen_port, 5540);
        assert_eq!(parsed.behaviors.get("on_off"), Some(&toml::Value::Boolean(true)));
    }
}
