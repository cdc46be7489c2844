use crate::core::Block;
use crate::error::Result;
use crate::utils::sha256_hex;
use log::{debug, info};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fixed difficulty: the PoW digest must start with this many hex zeros
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Shared flag that stops an in-progress nonce search.
///
/// Clones observe the same flag; the chain store cancels every token it handed out
/// whenever its tip changes.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct ProofOfWork {
    last_proof: u64,
    last_hash: String,
}

impl ProofOfWork {
    pub fn new_proof_of_work(last_block: &Block) -> Result<ProofOfWork> {
        Ok(ProofOfWork {
            last_proof: last_block.get_proof(),
            last_hash: last_block.hash()?,
        })
    }

    /// Hex digest of the decimal concatenation `{last_proof}{proof}{last_hash}`
    pub fn digest(last_proof: u64, proof: u64, last_hash: &str) -> String {
        let guess = format!("{last_proof}{proof}{last_hash}");
        sha256_hex(guess.as_bytes())
    }

    pub fn meets_difficulty(hash: &str) -> bool {
        hash.starts_with(DIFFICULTY_PREFIX)
    }

    pub fn valid(last_proof: u64, proof: u64, last_hash: &str) -> bool {
        Self::meets_difficulty(&Self::digest(last_proof, proof, last_hash))
    }

    /// First nonce to try: zero, or a random point to avoid retracing competing miners
    pub fn start_nonce(randomize: bool) -> u64 {
        if randomize {
            rand::thread_rng().gen_range(0..u64::from(u32::MAX))
        } else {
            0
        }
    }

    /// Searches nonces upward from `start` until one is valid.
    ///
    /// Returns `None` if `cancel` fires first.
    pub fn run(&self, start: u64, cancel: &CancellationToken) -> Option<(u64, String)> {
        info!(
            "Mining on top of proof {} from nonce {start}",
            self.last_proof
        );
        let mut proof = start;
        loop {
            if cancel.is_cancelled() {
                debug!("Nonce search cancelled at {proof}");
                return None;
            }
            let hash = Self::digest(self.last_proof, proof, &self.last_hash);
            if Self::meets_difficulty(&hash) {
                info!("Found proof {proof}: {hash}");
                return Some((proof, hash));
            }
            proof = proof.wrapping_add(1);
        }
    }
}
