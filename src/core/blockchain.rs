// The chain store: the canonical block sequence plus the pending pool, guarded together.
// Blocks are persisted in a sled tree keyed by big-endian index so iteration order is chain order.

use crate::core::{Block, CancellationToken, ProofOfWork, Transaction, MINT_ADDRESS};
use crate::error::{LedgerError, Result};
use crate::storage::TransactionPool;
use log::{info, warn};
use sled::{Batch, Db, IVec, Tree};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

const BLOCKS_TREE: &str = "blocks";

/// Signed so the mint address can go negative without overflow concerns
pub type Balance = i128;

// Chain tail and pool share one lock: a block is never appended against a pool
// that changed underneath it.
struct LedgerState {
    chain: Vec<Block>,
    pool: TransactionPool,
    balances: HashMap<String, Balance>,
}

impl LedgerState {
    fn tail(&self) -> Result<&Block> {
        self.chain
            .last()
            .ok_or_else(|| LedgerError::Database("Chain is empty".to_string()))
    }

    fn balance_of(&self, identity: &str) -> Balance {
        self.balances.get(identity).copied().unwrap_or(0)
    }
}

pub struct Blockchain {
    state: RwLock<LedgerState>,
    blocks: Tree,
    tip_watchers: Mutex<Vec<CancellationToken>>,
}

impl Blockchain {
    /// Opens the chain stored in `db`, writing the genesis block on first start
    pub fn open(db: &Db) -> Result<Blockchain> {
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open blocks tree: {e}")))?;

        let mut chain = Vec::new();
        for entry in blocks.iter() {
            let (_, bytes) = entry?;
            chain.push(Block::deserialize(bytes.as_ref())?);
        }

        if chain.is_empty() {
            info!("Creating genesis block");
            let genesis = Block::genesis();
            blocks.insert(index_key(0), IVec::try_from(&genesis)?)?;
            blocks.flush()?;
            chain.push(genesis);
        } else {
            validate_chain(&chain)?;
            info!("Loaded chain of {} blocks", chain.len());
        }

        let balances = compute_balances(&chain);
        Ok(Blockchain {
            state: RwLock::new(LedgerState {
                chain,
                pool: TransactionPool::new(),
                balances,
            }),
            blocks,
            tip_watchers: Mutex::new(vec![]),
        })
    }

    /// Chain store on a throwaway sled database
    pub fn open_temporary() -> Result<Blockchain> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::open(&db)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|e| LedgerError::Lock(format!("ledger state: {e}")))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|e| LedgerError::Lock(format!("ledger state: {e}")))
    }

    pub fn last_block(&self) -> Result<Block> {
        Ok(self.read_state()?.tail()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_state()?.chain.len())
    }

    pub fn get_chain(&self) -> Result<Vec<Block>> {
        Ok(self.read_state()?.chain.clone())
    }

    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read_state()?.pool.get_all())
    }

    /// Confirmed balance: credits minus debits over the whole chain
    pub fn balance(&self, identity: &str) -> Result<Balance> {
        Ok(self.read_state()?.balance_of(identity))
    }

    /// Confirmed transactions where `identity` is sender or recipient, oldest first
    pub fn history(&self, identity: &str) -> Result<Vec<Transaction>> {
        let state = self.read_state()?;
        Ok(state
            .chain
            .iter()
            .flat_map(|block| block.get_transactions())
            .filter(|tx| tx.touches(identity))
            .cloned()
            .collect())
    }

    /// Adds `tx` to the pool after the balance check.
    ///
    /// Returns the index of the block that will include it. Callers verify the signature
    /// first. Rewards never enter the pool; only `commit_mined` mints.
    pub(crate) fn stage(&self, tx: Transaction) -> Result<u64> {
        if tx.is_reward() {
            return Err(LedgerError::InvalidIdentity(format!(
                "{MINT_ADDRESS} cannot send transfers"
            )));
        }

        let mut state = self.write_state()?;
        let available = state.balance_of(tx.get_sender());
        if Balance::from(tx.get_amount()) > available {
            return Err(LedgerError::InsufficientBalance {
                required: tx.get_amount(),
                available,
            });
        }
        state.pool.add(tx);
        Ok(state.chain.len() as u64)
    }

    /// Returns and clears the pending pool
    pub fn drain(&self) -> Result<Vec<Transaction>> {
        Ok(self.write_state()?.pool.drain())
    }

    /// Appends a block that links to the current tip
    pub fn append(&self, block: Block) -> Result<()> {
        let mut state = self.write_state()?;
        self.append_locked(&mut state, block)
    }

    /// Publishes a mined block carrying the whole pool plus `reward`.
    ///
    /// `expected_tip` is the hash of the block the proof was searched against; if the tip
    /// moved in the meantime the result is stale and `ChainLinkage` is returned.
    pub fn commit_mined(
        &self,
        expected_tip: &str,
        proof: u64,
        hash_of_block: String,
        forger: &str,
        reward: Transaction,
    ) -> Result<Block> {
        let mut state = self.write_state()?;
        let tail = state.tail()?;
        if tail.hash()? != expected_tip {
            return Err(LedgerError::ChainLinkage(format!(
                "Tip moved past {expected_tip} while mining"
            )));
        }

        let mut transactions = state.pool.get_all();
        transactions.push(reward);
        let block = Block::forge(tail, transactions, proof, hash_of_block, forger)?;
        self.append_locked(&mut state, block.clone())?;
        Ok(block)
    }

    fn append_locked(&self, state: &mut LedgerState, block: Block) -> Result<()> {
        let tail = state.tail()?;
        if block.get_index() != tail.get_index() + 1 {
            return Err(LedgerError::ChainLinkage(format!(
                "Expected index {}, got {}",
                tail.get_index() + 1,
                block.get_index()
            )));
        }
        let tail_hash = tail.hash()?;
        if block.get_previous_hash() != tail_hash {
            return Err(LedgerError::ChainLinkage(format!(
                "Previous hash {} does not match tip {tail_hash}",
                block.get_previous_hash()
            )));
        }

        self.blocks
            .insert(index_key(block.get_index()), IVec::try_from(&block)?)?;
        self.blocks.flush()?;

        let consumed = block.get_transactions();
        let mut remaining = Vec::new();
        let mut used = vec![false; consumed.len()];
        for tx in state.pool.drain() {
            match consumed
                .iter()
                .enumerate()
                .position(|(i, c)| !used[i] && c == &tx)
            {
                Some(i) => used[i] = true,
                None => remaining.push(tx),
            }
        }
        for tx in remaining {
            state.pool.add(tx);
        }

        apply_block(&mut state.balances, &block);
        info!(
            "Appended block {} with {} transactions",
            block.get_index(),
            block.get_transactions().len()
        );
        state.chain.push(block);
        self.notify_tip_changed();
        Ok(())
    }

    /// Swaps in `new_chain` if it is valid and strictly longer than the local chain.
    ///
    /// Returns whether the swap happened. The balance cache is rebuilt; the pool is kept.
    pub fn replace(&self, new_chain: Vec<Block>) -> Result<bool> {
        validate_chain(&new_chain)?;

        let mut state = self.write_state()?;
        if new_chain.len() <= state.chain.len() {
            warn!(
                "Ignoring replacement of length {}: local chain has {}",
                new_chain.len(),
                state.chain.len()
            );
            return Ok(false);
        }

        let mut batch = Batch::default();
        for block in &new_chain {
            batch.insert(index_key(block.get_index()).to_vec(), IVec::try_from(block)?);
        }
        self.blocks.apply_batch(batch)?;
        self.blocks.flush()?;

        state.balances = compute_balances(&new_chain);
        info!(
            "Replaced chain of {} blocks with {} blocks",
            state.chain.len(),
            new_chain.len()
        );
        state.chain = new_chain;
        self.notify_tip_changed();
        Ok(true)
    }

    /// Token cancelled the next time the tip changes
    pub fn watch_tip(&self) -> Result<CancellationToken> {
        let token = CancellationToken::new();
        self.tip_watchers
            .lock()
            .map_err(|e| LedgerError::Lock(format!("tip watchers: {e}")))?
            .push(token.clone());
        Ok(token)
    }

    /// Cancels every outstanding tip watcher, e.g. on shutdown
    pub fn cancel_watchers(&self) {
        self.notify_tip_changed();
    }

    fn notify_tip_changed(&self) {
        match self.tip_watchers.lock() {
            Ok(mut watchers) => {
                for token in watchers.drain(..) {
                    token.cancel();
                }
            }
            Err(e) => warn!("Could not notify tip watchers: {e}"),
        }
    }
}

/// Checks a full chain: shared genesis, gapless indices, hash linkage and PoW per pair
pub fn validate_chain(chain: &[Block]) -> Result<()> {
    let genesis = chain
        .first()
        .ok_or_else(|| LedgerError::MalformedChain("Chain is empty".to_string()))?;
    if !genesis.is_genesis() {
        return Err(LedgerError::MalformedChain(
            "Chain does not start from the agreed genesis block".to_string(),
        ));
    }

    for pair in chain.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.get_index() != prev.get_index() + 1 {
            return Err(LedgerError::ChainLinkage(format!(
                "Index gap between {} and {}",
                prev.get_index(),
                block.get_index()
            )));
        }
        let prev_hash = prev.hash()?;
        if block.get_previous_hash() != prev_hash {
            return Err(LedgerError::ChainLinkage(format!(
                "Block {} does not link to its predecessor",
                block.get_index()
            )));
        }
        let digest = ProofOfWork::digest(prev.get_proof(), block.get_proof(), &prev_hash);
        if !ProofOfWork::meets_difficulty(&digest) || digest != block.get_hash_of_block() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} carries an invalid proof",
                block.get_index()
            )));
        }
    }
    Ok(())
}

fn index_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

fn apply_block(balances: &mut HashMap<String, Balance>, block: &Block) {
    for tx in block.get_transactions() {
        let amount = Balance::from(tx.get_amount());
        *balances.entry(tx.get_recipient().to_string()).or_insert(0) += amount;
        *balances.entry(tx.get_sender().to_string()).or_insert(0) -= amount;
    }
}

fn compute_balances(chain: &[Block]) -> HashMap<String, Balance> {
    let mut balances = HashMap::new();
    for block in chain {
        apply_block(&mut balances, block);
    }
    balances
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mine_next(blockchain: &Blockchain, forger: &str) -> Block {
        let last = blockchain.last_block().unwrap();
        let pow = ProofOfWork::new_proof_of_work(&last).unwrap();
        let (proof, hash) = pow.run(0, &CancellationToken::new()).unwrap();
        blockchain
            .commit_mined(
                &last.hash().unwrap(),
                proof,
                hash,
                forger,
                Transaction::new_reward(forger, 1),
            )
            .unwrap()
    }

    #[test]
    fn test_open_creates_genesis() {
        let blockchain = Blockchain::open_temporary().unwrap();
        assert_eq!(blockchain.len().unwrap(), 1);
        assert!(blockchain.last_block().unwrap().is_genesis());
    }

    #[test]
    fn test_reopen_loads_persisted_blocks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("chain");
        {
            let db = sled::open(&path).unwrap();
            let blockchain = Blockchain::open(&db).unwrap();
            mine_next(&blockchain, "miner");
        }
        let db = sled::open(&path).unwrap();
        let blockchain = Blockchain::open(&db).unwrap();
        assert_eq!(blockchain.len().unwrap(), 2);
        assert_eq!(blockchain.balance("miner").unwrap(), 1);
    }

    #[test]
    fn test_mine_links_to_genesis_and_drains_pool() {
        let blockchain = Blockchain::open_temporary().unwrap();
        let first = mine_next(&blockchain, "alice");
        assert_eq!(
            first.get_previous_hash(),
            Block::genesis().hash().unwrap()
        );

        blockchain
            .stage(Transaction::new("alice", "bob", 1))
            .unwrap();
        let block = mine_next(&blockchain, "miner");

        assert_eq!(blockchain.len().unwrap(), 3);
        assert_eq!(block.get_previous_hash(), first.hash().unwrap());
        assert_eq!(block.get_transactions().len(), 2);
        assert!(blockchain.pending_transactions().unwrap().is_empty());
        validate_chain(&blockchain.get_chain().unwrap()).unwrap();
    }

    #[test]
    fn test_append_rejects_bad_linkage() {
        let blockchain = Blockchain::open_temporary().unwrap();
        let wrong_prev = Block::new_test_block(1, vec![], 1, "0000", "not-the-tip");
        assert!(matches!(
            blockchain.append(wrong_prev),
            Err(LedgerError::ChainLinkage(_))
        ));

        let genesis_hash = Block::genesis().hash().unwrap();
        let wrong_index = Block::new_test_block(5, vec![], 1, "0000", &genesis_hash);
        assert!(matches!(
            blockchain.append(wrong_index),
            Err(LedgerError::ChainLinkage(_))
        ));
        assert_eq!(blockchain.len().unwrap(), 1);
    }

    #[test]
    fn test_append_removes_consumed_transactions_only() {
        let blockchain = Blockchain::open_temporary().unwrap();
        mine_next(&blockchain, "alice");
        mine_next(&blockchain, "alice");
        let consumed = Transaction::new("alice", "bob", 1);
        let kept = Transaction::new("alice", "carol", 1);
        blockchain.stage(consumed.clone()).unwrap();
        blockchain.stage(kept.clone()).unwrap();

        let tip_hash = blockchain.last_block().unwrap().hash().unwrap();
        let block = Block::new_test_block(3, vec![consumed], 1, "0000", &tip_hash);
        blockchain.append(block).unwrap();

        assert_eq!(blockchain.pending_transactions().unwrap(), vec![kept]);
    }

    #[test]
    fn test_stage_checks_confirmed_balance() {
        let blockchain = Blockchain::open_temporary().unwrap();
        mine_next(&blockchain, "alice");
        assert_eq!(blockchain.balance("alice").unwrap(), 1);

        let err = blockchain
            .stage(Transaction::new("alice", "bob", 2))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                required: 2,
                available: 1
            }
        );
        assert!(blockchain.pending_transactions().unwrap().is_empty());

        let index = blockchain
            .stage(Transaction::new("alice", "bob", 1))
            .unwrap();
        assert_eq!(index, 2);
        assert_eq!(blockchain.pending_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_stage_refuses_mint_sender() {
        let blockchain = Blockchain::open_temporary().unwrap();
        assert!(matches!(
            blockchain.stage(Transaction::new_reward("alice", 3)),
            Err(LedgerError::InvalidIdentity(_))
        ));
        assert!(blockchain.pending_transactions().unwrap().is_empty());
        assert_eq!(blockchain.balance("alice").unwrap(), 0);
    }

    #[test]
    fn test_balance_and_history() {
        let blockchain = Blockchain::open_temporary().unwrap();
        mine_next(&blockchain, "alice");
        blockchain
            .stage(Transaction::new("alice", "bob", 1))
            .unwrap();
        mine_next(&blockchain, "carol");

        assert_eq!(blockchain.balance("alice").unwrap(), 0);
        assert_eq!(blockchain.balance("bob").unwrap(), 1);
        assert_eq!(blockchain.balance(MINT_ADDRESS).unwrap(), -2);
        assert_eq!(blockchain.history("alice").unwrap().len(), 2);
        assert_eq!(blockchain.history("nobody").unwrap().len(), 0);
    }

    #[test]
    fn test_commit_mined_rejects_stale_tip() {
        let blockchain = Blockchain::open_temporary().unwrap();
        let genesis = blockchain.last_block().unwrap();
        let pow = ProofOfWork::new_proof_of_work(&genesis).unwrap();
        let (proof, hash) = pow.run(0, &CancellationToken::new()).unwrap();

        mine_next(&blockchain, "winner");
        let stale = blockchain.commit_mined(
            &genesis.hash().unwrap(),
            proof,
            hash,
            "loser",
            Transaction::new_reward("loser", 1),
        );
        assert!(matches!(stale, Err(LedgerError::ChainLinkage(_))));
        assert_eq!(blockchain.len().unwrap(), 2);
    }

    #[test]
    fn test_tip_change_cancels_watchers() {
        let blockchain = Blockchain::open_temporary().unwrap();
        let token = blockchain.watch_tip().unwrap();
        assert!(!token.is_cancelled());
        mine_next(&blockchain, "miner");
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_replace_requires_longer_valid_chain() {
        let source = Blockchain::open_temporary().unwrap();
        mine_next(&source, "a");
        mine_next(&source, "a");
        let longer = source.get_chain().unwrap();

        let local = Blockchain::open_temporary().unwrap();
        mine_next(&local, "b");
        assert!(local.replace(longer.clone()).unwrap());
        assert_eq!(local.len().unwrap(), 3);
        assert_eq!(local.balance("b").unwrap(), 0);
        assert_eq!(local.balance("a").unwrap(), 2);

        // Same length is not an improvement
        assert!(!local.replace(longer).unwrap());
    }

    #[test]
    fn test_replace_rejects_tampered_chain() {
        let source = Blockchain::open_temporary().unwrap();
        mine_next(&source, "a");
        let mut chain = source.get_chain().unwrap();
        let genesis_hash = chain[0].hash().unwrap();
        chain[1] = Block::new_test_block(1, vec![], 1, "0000", &genesis_hash);

        let local = Blockchain::open_temporary().unwrap();
        assert!(local.replace(chain).is_err());
        assert_eq!(local.len().unwrap(), 1);
    }

    #[test]
    fn test_validate_chain_rejects_foreign_genesis() {
        let foreign = Block::new_test_block(0, vec![], 100, "x", "1");
        assert!(matches!(
            validate_chain(&[foreign]),
            Err(LedgerError::MalformedChain(_))
        ));
        assert!(validate_chain(&[]).is_err());
    }

    #[test]
    fn test_valid_chain_links_every_pair() {
        let blockchain = Blockchain::open_temporary().unwrap();
        for _ in 0..3 {
            mine_next(&blockchain, "miner");
        }
        let chain = blockchain.get_chain().unwrap();
        for pair in chain.windows(2) {
            assert_eq!(pair[0].hash().unwrap(), pair[1].get_previous_hash());
        }
    }
}
