//! Test utilities for ledger testing

use crate::config::Settings;
use crate::core::{
    Blockchain, CancellationToken, ChainSource, PeerChain, ProofOfWork, Transaction,
};
use crate::error::{LedgerError, Result};
use crate::ledger::LedgerNode;
use crate::storage::MemoryStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Mines one block on top of the current tip, rewarding `forger`
pub fn mine_block(blockchain: &Blockchain, forger: &str) -> Result<()> {
    let last = blockchain.last_block()?;
    let pow = ProofOfWork::new_proof_of_work(&last)?;
    let (proof, hash) = pow
        .run(0, &CancellationToken::new())
        .ok_or_else(|| LedgerError::InvalidBlock("search cancelled".to_string()))?;
    blockchain.commit_mined(
        &last.hash()?,
        proof,
        hash,
        forger,
        Transaction::new_reward(forger, 1),
    )?;
    Ok(())
}

/// Temporary chain store holding exactly `length` valid blocks (genesis included)
pub fn build_chain(length: usize) -> Blockchain {
    let blockchain = Blockchain::open_temporary().expect("temporary chain store");
    while blockchain.len().expect("chain length") < length {
        mine_block(&blockchain, "test-miner").expect("mined block");
    }
    blockchain
}

/// Ledger node on temporary storage with an in-memory wallet registry
pub fn create_test_node(peers: StaticPeers) -> LedgerNode {
    let settings = Settings::default();
    let blockchain = Arc::new(Blockchain::open_temporary().expect("temporary chain store"));
    LedgerNode::new(
        settings,
        blockchain,
        Arc::new(MemoryStore::new()),
        Arc::new(peers),
    )
}

/// In-memory peers answering chain requests, optionally after a delay
#[derive(Default)]
pub struct StaticPeers {
    chains: HashMap<String, PeerChain>,
    delays: HashMap<String, Duration>,
}

impl StaticPeers {
    pub fn new() -> StaticPeers {
        StaticPeers::default()
    }

    pub fn with_chain(mut self, peer: &str, chain: Vec<crate::core::Block>) -> StaticPeers {
        self.chains.insert(peer.to_string(), PeerChain::new(chain));
        self
    }

    /// A peer that stalls for `delay` and then answers with an empty chain
    pub fn with_delay(mut self, peer: &str, delay: Duration) -> StaticPeers {
        self.delays.insert(peer.to_string(), delay);
        self
    }
}

impl ChainSource for StaticPeers {
    fn fetch_chain(&self, peer: &str, _timeout: Duration) -> Result<PeerChain> {
        if let Some(delay) = self.delays.get(peer) {
            thread::sleep(*delay);
            return Ok(PeerChain::new(vec![]));
        }
        self.chains
            .get(peer)
            .cloned()
            .ok_or_else(|| LedgerError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}
