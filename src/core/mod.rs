//! Core ledger functionality
//!
//! Blocks and transactions, the chain store with its pending pool,
//! proof-of-work and peer consensus.

pub mod block;
pub mod blockchain;
pub mod consensus;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_HASH, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
pub use blockchain::{validate_chain, Balance, Blockchain};
pub use consensus::{select_longest, ChainSource, ConsensusResolver, PeerChain};
pub use proof_of_work::{CancellationToken, ProofOfWork, DIFFICULTY_PREFIX};
pub use transaction::{Transaction, MINT_ADDRESS};
