//! Data storage and persistence
//!
//! The pending-transaction pool and the key-value interface under the wallet
//! registry. Block persistence lives with the chain store in `core::blockchain`.

pub mod kv;
pub mod memory_pool;

pub use kv::{KeyValueStore, MemoryStore, SledStore};
pub use memory_pool::TransactionPool;
