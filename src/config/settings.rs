use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DATA_DIR: &str = "data";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_ID_KEY: &str = "NODE_ID";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const MINER_IDENTITY_KEY: &str = "MINER_IDENTITY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Address the TCP server listens on and advertises
    pub listen_addr: String,
    pub data_dir: PathBuf,
    /// Identity credited with local mining rewards; a random node id when unset
    pub miner_identity: Option<String>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings {
            listen_addr: DEFAULT_NODE_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            miner_identity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    /// Run the continuous background miner
    pub background: bool,
    /// Start each nonce search at a random point
    pub randomize_start: bool,
    pub local_reward: u64,
    pub external_reward: u64,
}

impl Default for MiningSettings {
    fn default() -> Self {
        MiningSettings {
            background: false,
            randomize_start: false,
            local_reward: 1,
            external_reward: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    pub peer_timeout_ms: u64,
    pub max_parallel_fetches: usize,
    /// Resolve against peers every N seconds; on demand only when unset
    pub resolve_interval_secs: Option<u64>,
    pub seed_peers: Vec<String>,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        ConsensusSettings {
            peer_timeout_ms: 3000,
            max_parallel_fetches: 4,
            resolve_interval_secs: None,
            seed_peers: vec![],
        }
    }
}

impl ConsensusSettings {
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeSettings,
    pub mining: MiningSettings,
    pub consensus: ConsensusSettings,
}

impl Settings {
    /// Defaults, then the TOML file at `path` if given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var(NODE_ADDRESS_KEY) {
            self.node.listen_addr = addr;
        }
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.node.data_dir = PathBuf::from(dir);
        }
        // Several nodes on one machine each get their own directory
        if let Ok(node_id) = env::var(NODE_ID_KEY) {
            self.node.data_dir = self.node.data_dir.join(format!("node_{node_id}"));
        }
        if let Ok(identity) = env::var(MINER_IDENTITY_KEY) {
            self.node.miner_identity = Some(identity);
        }
    }
}
