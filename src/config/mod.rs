//! Configuration management
//!
//! Node settings loaded from defaults, an optional TOML file and environment variables.

pub mod settings;

pub use settings::{ConsensusSettings, MiningSettings, NodeSettings, Settings};
