use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use seeder_node::NodeConfig;
use seeder_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Arweave nodes refuse inline payloads above this size.
const DEFAULT_MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Complete configuration file. Every section has defaults, so an empty
/// file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    pub store: StoreConfig,
    pub node: NodeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 1984)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            store: StoreConfig::default(),
            node: NodeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}
