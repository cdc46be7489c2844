//! # Ledger Node
//!
//! A single node of an account-based proof-of-work ledger.
//!
//! ## What It Does
//! - **Chain Store**: append-only blocks linked by SHA-256 over a canonical JSON encoding
//! - **Proof of Work**: fixed `"0000"` prefix puzzle, cancellable when the tip moves
//! - **Consensus**: longest valid chain among registered peers wins
//! - **Wallets**: ECDSA P-256 keypairs bound to participant ids, canonical transaction signing
//! - **Multi-Node**: isolated sled databases so several nodes can share one machine
//!
//! ## Layout
//! - `core/`: blocks, transactions, chain store, proof-of-work, consensus
//! - `wallet/`: keypair registry, signing and verification
//! - `ledger/`: the node service tying everything together, plus background workers
//! - `network/`: TCP request/response protocol, peer registry, chain fetching
//! - `storage/`: pending pool and the key-value store under the registry
//! - `config/`: settings from TOML and environment
//! - `events`: fire-and-forget notifications
//! - `utils/`: hashing, keys, encodings
//! - `cli/`: command-line interface

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod ledger;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::Settings;
pub use core::{
    validate_chain, Balance, Block, Blockchain, CancellationToken, ChainSource,
    ConsensusResolver, PeerChain, ProofOfWork, Transaction, DIFFICULTY_PREFIX, MINT_ADDRESS,
};
pub use error::{LedgerError, Result};
pub use events::{EventBus, LedgerEvent};
pub use ledger::{
    spawn_miner, spawn_resolver, BlockVerdict, LedgerNode, MiningWork, ResolveOutcome,
    TransferReceipt, WalletSummary,
};
pub use network::{send_request, Node, Nodes, Request, Response, Server, TcpChainSource};
pub use storage::{KeyValueStore, MemoryStore, SledStore, TransactionPool};
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
pub use wallet::{
    canonicalize, sign_transaction, sign_with_private_key, verify_transaction, IssuedWallet,
    WalletRegistry,
};
