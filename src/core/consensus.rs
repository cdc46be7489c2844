// Longest-valid-chain resolution against registered peers.
// Fetches fan out over a small worker pool; results are folded in peer order so the
// first peer reporting the longest valid chain wins a tie.

use crate::core::{validate_chain, Block, Blockchain};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// Slack on top of the per-peer timeouts before the collector gives up on stragglers
const COLLECT_GRACE: Duration = Duration::from_millis(250);

/// A peer's answer to a chain request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerChain {
    pub length: usize,
    pub chain: Vec<Block>,
}

impl PeerChain {
    pub fn new(chain: Vec<Block>) -> PeerChain {
        PeerChain {
            length: chain.len(),
            chain,
        }
    }
}

/// Where peer chains come from. The TCP client implements it; tests use in-memory peers.
pub trait ChainSource: Send + Sync {
    fn fetch_chain(&self, peer: &str, timeout: Duration) -> Result<PeerChain>;
}

pub struct ConsensusResolver {
    source: Arc<dyn ChainSource>,
    peer_timeout: Duration,
    max_parallel: usize,
}

impl ConsensusResolver {
    pub fn new(
        source: Arc<dyn ChainSource>,
        peer_timeout: Duration,
        max_parallel: usize,
    ) -> ConsensusResolver {
        ConsensusResolver {
            source,
            peer_timeout,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Replaces the local chain with the longest valid peer chain, if any is longer.
    ///
    /// Unreachable peers and malformed chains are logged and skipped.
    pub fn resolve(&self, blockchain: &Blockchain, peers: &[String]) -> Result<bool> {
        let local_len = blockchain.len()?;
        let results = self.fetch_all(peers);

        match select_longest(local_len, results) {
            Some(chain) => {
                let replaced = blockchain.replace(chain)?;
                if replaced {
                    info!("Local chain replaced by a longer peer chain");
                }
                Ok(replaced)
            }
            None => {
                info!("Local chain of {local_len} blocks is authoritative");
                Ok(false)
            }
        }
    }

    /// Fetches every peer's chain with bounded parallelism. Output follows `peers` order.
    pub fn fetch_all(&self, peers: &[String]) -> Vec<(String, Result<PeerChain>)> {
        if peers.is_empty() {
            return vec![];
        }

        let queue: Arc<Mutex<VecDeque<(usize, String)>>> = Arc::new(Mutex::new(
            peers.iter().cloned().enumerate().collect(),
        ));
        let (sender, receiver) = mpsc::channel();
        let workers = self.max_parallel.min(peers.len());

        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let sender = sender.clone();
            let source = Arc::clone(&self.source);
            let timeout = self.peer_timeout;
            thread::spawn(move || loop {
                let next = match queue.lock() {
                    Ok(mut queue) => queue.pop_front(),
                    Err(_) => None,
                };
                let Some((idx, peer)) = next else {
                    break;
                };
                let result = source.fetch_chain(&peer, timeout);
                if sender.send((idx, result)).is_err() {
                    break;
                }
            });
        }
        drop(sender);

        let waves = peers.len().div_ceil(workers) as u32;
        let deadline = Instant::now() + self.peer_timeout * waves + COLLECT_GRACE;
        let mut slots: Vec<Option<Result<PeerChain>>> = peers.iter().map(|_| None).collect();
        let mut received = 0;
        while received < peers.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok((idx, result)) => {
                    slots[idx] = Some(result);
                    received += 1;
                }
                Err(_) => break,
            }
        }

        peers
            .iter()
            .cloned()
            .zip(slots)
            .map(|(peer, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(LedgerError::PeerUnreachable {
                        peer: peer.clone(),
                        reason: "no answer before deadline".to_string(),
                    })
                });
                (peer, result)
            })
            .collect()
    }
}

/// Picks the longest fully valid chain strictly longer than `local_len`.
///
/// Strict `>` against the running maximum: on equal lengths the earlier peer wins.
pub fn select_longest(
    local_len: usize,
    results: Vec<(String, Result<PeerChain>)>,
) -> Option<Vec<Block>> {
    let mut max_len = local_len;
    let mut best = None;

    for (peer, result) in results {
        let peer_chain = match result {
            Ok(peer_chain) => peer_chain,
            Err(e) => {
                warn!("Skipping peer {peer}: {e}");
                continue;
            }
        };
        if peer_chain.length != peer_chain.chain.len() {
            warn!(
                "Skipping peer {peer}: reported length {} but sent {} blocks",
                peer_chain.length,
                peer_chain.chain.len()
            );
            continue;
        }
        if peer_chain.length <= max_len {
            continue;
        }
        if let Err(e) = validate_chain(&peer_chain.chain) {
            warn!("Skipping peer {peer}: {e}");
            continue;
        }
        max_len = peer_chain.length;
        best = Some(peer_chain.chain);
    }
    best
}
