use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{canonical_json, current_timestamp, deserialize, serialize, sha256_hex};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sled::IVec;

pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_FORGER: &str = "genesis";
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| Block {
    index: 0,
    timestamp: 0.0,
    transactions: vec![],
    proof: GENESIS_PROOF,
    hash_of_block: GENESIS_HASH.to_string(),
    previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
    forger: GENESIS_FORGER.to_string(),
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    timestamp: f64,
    transactions: Vec<Transaction>,
    proof: u64,
    hash_of_block: String, // PoW digest that satisfied the difficulty prefix
    previous_hash: String,
    forger: String,
}

// Every block field except `hash_of_block`, which is what `Block::hash` covers
#[derive(Serialize)]
struct HashedFields<'a> {
    index: u64,
    timestamp: f64,
    transactions: &'a [Transaction],
    proof: u64,
    previous_hash: &'a str,
    forger: &'a str,
}

impl Block {
    /// Builds the block that follows `last_block`, stamped with the current time
    pub fn forge(
        last_block: &Block,
        transactions: Vec<Transaction>,
        proof: u64,
        hash_of_block: String,
        forger: &str,
    ) -> Result<Block> {
        Ok(Block {
            index: last_block.index + 1,
            timestamp: current_timestamp()?,
            transactions,
            proof,
            hash_of_block,
            previous_hash: last_block.hash()?,
            forger: forger.to_string(),
        })
    }

    /// The agreed-upon first block. Identical on every node.
    pub fn genesis() -> Block {
        GENESIS_BLOCK.clone()
    }

    pub fn is_genesis(&self) -> bool {
        self == &*GENESIS_BLOCK
    }

    /// SHA-256 hex over the canonical encoding of the block without `hash_of_block`
    pub fn hash(&self) -> Result<String> {
        let fields = HashedFields {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            proof: self.proof,
            previous_hash: &self.previous_hash,
            forger: &self.forger,
        };
        Ok(sha256_hex(canonical_json(&fields)?.as_bytes()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_proof(&self) -> u64 {
        self.proof
    }

    pub fn get_hash_of_block(&self) -> &str {
        self.hash_of_block.as_str()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_forger(&self) -> &str {
        self.forger.as_str()
    }

    /// Create a block with arbitrary fields (for testing only)
    #[cfg(test)]
    pub fn new_test_block(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        hash_of_block: &str,
        previous_hash: &str,
    ) -> Block {
        Block {
            index,
            timestamp: 1.5,
            transactions,
            proof,
            hash_of_block: hash_of_block.to_string(),
            previous_hash: previous_hash.to_string(),
            forger: "tester".to_string(),
        }
    }
}

impl TryFrom<&Block> for IVec {
    type Error = crate::error::LedgerError;

    fn try_from(b: &Block) -> Result<Self> {
        Ok(Self::from(b.serialize()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_fixed() {
        let genesis = Block::genesis();
        assert_eq!(genesis.get_index(), 0);
        assert_eq!(genesis.get_proof(), GENESIS_PROOF);
        assert_eq!(genesis.get_previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(genesis.is_genesis());
        assert_eq!(genesis.hash().unwrap(), Block::genesis().hash().unwrap());
    }

    #[test]
    fn test_hash_ignores_hash_of_block() {
        let a = Block::new_test_block(1, vec![], 7, "aaaa", "prev");
        let b = Block::new_test_block(1, vec![], 7, "bbbb", "prev");
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn test_hash_covers_transactions() {
        let a = Block::new_test_block(1, vec![Transaction::new("x", "y", 1)], 7, "h", "prev");
        let b = Block::new_test_block(1, vec![Transaction::new("x", "y", 2)], 7, "h", "prev");
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
        assert_eq!(a.hash().unwrap().len(), 64);
    }

    #[test]
    fn test_forge_links_to_last_block() {
        let genesis = Block::genesis();
        let block = Block::forge(&genesis, vec![], 42, "0000ab".to_string(), "miner").unwrap();
        assert_eq!(block.get_index(), 1);
        assert_eq!(block.get_previous_hash(), genesis.hash().unwrap());
        assert_eq!(block.get_forger(), "miner");
        assert!(!block.is_genesis());
    }

    #[test]
    fn test_json_keeps_timestamp_and_hash() {
        let mut block = Block::new_test_block(1, vec![], 7, "h", "prev");
        for i in 0..20_000u32 {
            block.timestamp = 1_760_000_000.0 + f64::from(i) * 0.000_137_312_9;
            let json = serde_json::to_string(&block).unwrap();
            let restored: Block = serde_json::from_str(&json).unwrap();
            assert_eq!(restored.timestamp.to_bits(), block.timestamp.to_bits());
            assert_eq!(restored.hash().unwrap(), block.hash().unwrap());
        }
    }

    #[test]
    fn test_storage_roundtrip() {
        let block = Block::new_test_block(3, vec![Transaction::new("a", "b", 9)], 1, "h", "p");
        let restored = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(block, restored);
    }
}
