//! Error handling for the ledger node
//!
//! Every fallible operation in the crate returns [`LedgerError`]. The variants mirror the
//! operation boundaries: user input errors, registry misses, chain linkage failures and
//! transient peer failures are all reported as values, never as panics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error types for ledger, wallet and network operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerError {
    /// A block does not extend the current tip (bad previous hash or index)
    ChainLinkage(String),
    /// Sender's confirmed balance is lower than the requested amount
    InsufficientBalance { required: u64, available: i128 },
    /// Recipient (or sender) is not a registered identity
    InvalidIdentity(String),
    /// No private key is bound to the identity
    KeyNotFound(String),
    /// No registry record for the pid
    NotFound(String),
    /// A keypair was already issued for the pid
    DuplicatePid(String),
    /// A peer could not be reached or timed out during resolution
    PeerUnreachable { peer: String, reason: String },
    /// A peer answered with a chain that does not validate
    MalformedChain(String),
    /// A submitted block failed verification
    InvalidBlock(String),
    /// Signature did not verify against the sender identity
    InvalidSignature,
    /// A long-running operation was stopped because the node is shutting down
    Cancelled(String),
    /// Database-related errors
    Database(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// A shared lock was poisoned by a panicking thread
    Lock(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::ChainLinkage(msg) => write!(f, "Chain linkage error: {msg}"),
            LedgerError::InsufficientBalance {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient balance: required {required}, available {available}"
                )
            }
            LedgerError::InvalidIdentity(id) => write!(f, "Invalid identity: {id}"),
            LedgerError::KeyNotFound(id) => write!(f, "No key bound to identity: {id}"),
            LedgerError::NotFound(pid) => write!(f, "Not found: {pid}"),
            LedgerError::DuplicatePid(pid) => write!(f, "Wallet already issued for pid: {pid}"),
            LedgerError::PeerUnreachable { peer, reason } => {
                write!(f, "Peer {peer} unreachable: {reason}")
            }
            LedgerError::MalformedChain(msg) => write!(f, "Malformed chain: {msg}"),
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::InvalidSignature => write!(f, "Signature verification failed"),
            LedgerError::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Network(msg) => write!(f, "Network error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Lock(msg) => write!(f, "Lock poisoned: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
