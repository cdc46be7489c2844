//! The node service
//!
//! [`LedgerNode`] owns the chain store, wallet registry, peer set and event bus and exposes
//! every operation a calling layer needs (the TCP server, the CLI). State is injected, not
//! global: several nodes can live in one process, which the tests rely on.

pub mod workers;

use crate::config::Settings;
use crate::core::{
    Balance, Block, Blockchain, ChainSource, ConsensusResolver, PeerChain, ProofOfWork,
    Transaction,
};
use crate::error::{LedgerError, Result};
use crate::events::{EventBus, LedgerEvent};
use crate::network::{Nodes, TcpChainSource};
use crate::storage::{KeyValueStore, SledStore};
use crate::wallet::{sign_transaction, verify_transaction, IssuedWallet, WalletRegistry};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use uuid::Uuid;

pub use workers::{spawn_miner, spawn_resolver};

const WALLETS_TREE: &str = "wallets";

/// Parameters an external miner needs to search for the next proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningWork {
    pub last_proof: u64,
    pub last_hash: String,
}

/// Outcome of a submitted external block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockVerdict {
    pub verified: bool,
    pub award: u64,
    pub block: Option<Block>,
}

impl BlockVerdict {
    fn rejected() -> BlockVerdict {
        BlockVerdict {
            verified: false,
            award: 0,
            block: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub replaced: bool,
    pub chain: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub block_index: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub identity: String,
    pub balance: Balance,
    pub transactions: Vec<Transaction>,
}

pub struct LedgerNode {
    settings: Settings,
    blockchain: Arc<Blockchain>,
    registry: WalletRegistry,
    peers: Nodes,
    resolver: ConsensusResolver,
    events: EventBus,
    identity: String,
    shutdown: AtomicBool,
}

impl LedgerNode {
    pub fn new(
        settings: Settings,
        blockchain: Arc<Blockchain>,
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn ChainSource>,
    ) -> LedgerNode {
        let identity = settings
            .node
            .miner_identity
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let resolver = ConsensusResolver::new(
            source,
            settings.consensus.peer_timeout(),
            settings.consensus.max_parallel_fetches,
        );

        let peers = Nodes::new();
        if let Err(e) = peers.register(&settings.consensus.seed_peers) {
            warn!("Ignoring seed peers: {e}");
        }

        LedgerNode {
            settings,
            blockchain,
            registry: WalletRegistry::new(store),
            peers,
            resolver,
            events: EventBus::new(),
            identity,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Opens (or creates) the node's sled database under the configured data directory
    pub fn open(settings: Settings) -> Result<LedgerNode> {
        let data_dir = settings.node.data_dir.clone();
        fs::create_dir_all(&data_dir)?;
        let db = sled::open(&data_dir).map_err(|e| {
            LedgerError::Database(format!("Failed to open {}: {e}", data_dir.display()))
        })?;

        let blockchain = Arc::new(Blockchain::open(&db)?);
        let store = Arc::new(SledStore::open(&db, WALLETS_TREE)?);
        let source = Arc::new(TcpChainSource::new(settings.node.listen_addr.clone()));
        info!("Opened ledger at {}", data_dir.display());
        Ok(Self::new(settings, blockchain, store, source))
    }

    /// Identity credited with local mining rewards
    pub fn identity(&self) -> &str {
        self.identity.as_str()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stops background workers and aborts in-flight nonce searches
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.blockchain.cancel_watchers();
    }

    /// Mines until a block of ours is appended. A lost race is retried, not reported.
    pub fn mine(&self) -> Result<Block> {
        while !self.is_shutting_down() {
            if let Some(block) = self.mine_once()? {
                return Ok(block);
            }
        }
        Err(LedgerError::Cancelled("node is shutting down".to_string()))
    }

    /// One nonce search against the current tip.
    ///
    /// `Ok(None)` means the tip moved (or shutdown began) before our block could be published.
    pub fn mine_once(&self) -> Result<Option<Block>> {
        // Watch before reading the tip so no change can slip in between
        let token = self.blockchain.watch_tip()?;
        let last_block = self.blockchain.last_block()?;
        let last_hash = last_block.hash()?;

        let pow = ProofOfWork::new_proof_of_work(&last_block)?;
        let start = ProofOfWork::start_nonce(self.settings.mining.randomize_start);
        let Some((proof, hash)) = pow.run(start, &token) else {
            info!("Tip changed during search on block {}", last_block.get_index());
            return Ok(None);
        };

        let reward = Transaction::new_reward(&self.identity, self.settings.mining.local_reward);
        match self
            .blockchain
            .commit_mined(&last_hash, proof, hash, &self.identity, reward)
        {
            Ok(block) => {
                info!("New block {} forged", block.get_index());
                self.publish_block(&block);
                Ok(Some(block))
            }
            Err(LedgerError::ChainLinkage(reason)) => {
                info!("Discarding stale proof: {reason}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Verifies `signature` over the transaction by its sender, then stages it
    pub fn new_transaction(&self, tx: Transaction, signature: &str) -> Result<u64> {
        if !verify_transaction(tx.get_sender(), &tx, signature)? {
            return Err(LedgerError::InvalidSignature);
        }
        self.stage(tx)
    }

    // Pool admission after the signature was checked: recipient must be registered,
    // sender must cover the amount
    fn stage(&self, tx: Transaction) -> Result<u64> {
        if !self.registry.is_registered(tx.get_recipient())? {
            return Err(LedgerError::InvalidIdentity(tx.get_recipient().to_string()));
        }
        let block_index = self.blockchain.stage(tx.clone())?;
        self.events.publish(LedgerEvent::NewTransaction {
            sender: tx.get_sender().to_string(),
            recipient: tx.get_recipient().to_string(),
            amount: tx.get_amount(),
            block_index,
        });
        Ok(block_index)
    }

    /// Resolves the recipient pid, checks balance, signs, verifies and stages.
    ///
    /// With `signature` the caller's own signature is checked and no private key is touched;
    /// without it the registry signs for the sender.
    pub fn transfer(
        &self,
        recipient_pid: &str,
        amount: u64,
        sender: &str,
        signature: Option<&str>,
    ) -> Result<TransferReceipt> {
        let recipient = self.registry.lookup(recipient_pid).map_err(|e| match e {
            LedgerError::NotFound(pid) => LedgerError::InvalidIdentity(pid),
            other => other,
        })?;

        let available = self.blockchain.balance(sender)?;
        if Balance::from(amount) > available {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let tx = Transaction::new(sender, &recipient, amount);
        let signature = match signature {
            Some(signature) => signature.to_string(),
            None => sign_transaction(&self.registry, sender, &tx)?,
        };
        if !verify_transaction(sender, &tx, &signature)? {
            return Err(LedgerError::InvalidSignature);
        }

        let block_index = self.stage(tx)?;
        Ok(TransferReceipt {
            block_index,
            signature,
        })
    }

    pub fn get_chain(&self) -> Result<PeerChain> {
        Ok(PeerChain::new(self.blockchain.get_chain()?))
    }

    /// Adds peers (deduplicated) and returns the full peer set
    pub fn register_peers(&self, addrs: &[String]) -> Result<Vec<String>> {
        let added = self.peers.register(addrs)?;
        info!("Registered {added} new peers");
        self.peers.get_addrs()
    }

    pub fn peers(&self) -> Result<Vec<String>> {
        self.peers.get_addrs()
    }

    pub fn resolve(&self) -> Result<ResolveOutcome> {
        let peers = self.peers.get_addrs()?;
        let replaced = self.resolver.resolve(&self.blockchain, &peers)?;
        if replaced {
            let tip = self.blockchain.last_block()?;
            self.publish_block(&tip);
        }
        Ok(ResolveOutcome {
            replaced,
            chain: self.blockchain.get_chain()?,
        })
    }

    pub fn mining_work(&self) -> Result<MiningWork> {
        let last_block = self.blockchain.last_block()?;
        Ok(MiningWork {
            last_proof: last_block.get_proof(),
            last_hash: last_block.hash()?,
        })
    }

    /// Accepts a proof found elsewhere if it solves the puzzle on the current tip.
    ///
    /// A rejected submission leaves the chain untouched.
    pub fn verify_external_block(
        &self,
        proof: u64,
        hash: &str,
        forger: &str,
    ) -> Result<BlockVerdict> {
        if !ProofOfWork::meets_difficulty(hash) {
            info!("Rejecting external block from {forger}: {hash} misses difficulty");
            return Ok(BlockVerdict::rejected());
        }

        let last_block = self.blockchain.last_block()?;
        let last_hash = last_block.hash()?;
        if ProofOfWork::digest(last_block.get_proof(), proof, &last_hash) != hash {
            info!("Rejecting external block from {forger}: proof does not match the tip");
            return Ok(BlockVerdict::rejected());
        }

        let award = self.settings.mining.external_reward;
        let reward = Transaction::new_reward(forger, award);
        match self
            .blockchain
            .commit_mined(&last_hash, proof, hash.to_string(), forger, reward)
        {
            Ok(block) => {
                info!("Accepted external block {} from {forger}", block.get_index());
                self.publish_block(&block);
                Ok(BlockVerdict {
                    verified: true,
                    award,
                    block: Some(block),
                })
            }
            Err(LedgerError::ChainLinkage(reason)) => {
                info!("Rejecting external block from {forger}: {reason}");
                Ok(BlockVerdict::rejected())
            }
            Err(e) => Err(e),
        }
    }

    pub fn issue_wallet(&self, pid: &str) -> Result<IssuedWallet> {
        self.registry.issue(pid)
    }

    pub fn lookup(&self, pid: &str) -> Result<String> {
        self.registry.lookup(pid)
    }

    /// Signs `tx` with the key bound to `pid`
    pub fn sign(&self, pid: &str, tx: &Transaction) -> Result<String> {
        let identity = self.registry.lookup(pid)?;
        sign_transaction(&self.registry, &identity, tx)
    }

    pub fn verify(&self, identity: &str, tx: &Transaction, signature: &str) -> Result<bool> {
        verify_transaction(identity, tx, signature)
    }

    pub fn query_wallet(&self, identity: &str) -> Result<WalletSummary> {
        Ok(WalletSummary {
            identity: identity.to_string(),
            balance: self.blockchain.balance(identity)?,
            transactions: self.blockchain.history(identity)?,
        })
    }

    fn publish_block(&self, block: &Block) {
        self.events.publish(LedgerEvent::MiningRaceLost {
            index: block.get_index(),
            forger: block.get_forger().to_string(),
        });
    }
}
