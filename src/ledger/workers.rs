// Background threads driving the node: a continuous miner and a periodic resolver.
// Both poll the node's shutdown flag and exit on their own once it is set.

use crate::error::LedgerError;
use crate::ledger::LedgerNode;
use log::{error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Mines back to back until shutdown
pub fn spawn_miner(node: Arc<LedgerNode>) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("Background miner started for {}", node.identity());
        while !node.is_shutting_down() {
            match node.mine() {
                Ok(_) | Err(LedgerError::Cancelled(_)) => {}
                Err(e) => {
                    error!("Mining failed: {e}");
                    thread::sleep(SHUTDOWN_POLL);
                }
            }
        }
        info!("Background miner stopped");
    })
}

/// Resolves against registered peers every `interval` until shutdown
pub fn spawn_resolver(node: Arc<LedgerNode>, interval: Duration) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("Resolving against peers every {}s", interval.as_secs());
        let mut next = Instant::now() + interval;
        while !node.is_shutting_down() {
            if Instant::now() < next {
                thread::sleep(SHUTDOWN_POLL);
                continue;
            }
            match node.resolve() {
                Ok(outcome) if outcome.replaced => {
                    info!("Adopted peer chain of {} blocks", outcome.chain.len())
                }
                Ok(_) => {}
                Err(e) => error!("Resolve failed: {e}"),
            }
            next = Instant::now() + interval;
        }
        info!("Resolver stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{create_test_node, StaticPeers};

    #[test]
    fn test_miner_stops_on_shutdown() {
        let node = Arc::new(create_test_node(StaticPeers::new()));
        let handle = spawn_miner(Arc::clone(&node));

        let deadline = Instant::now() + Duration::from_secs(30);
        while node.blockchain().len().unwrap() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        node.shutdown();
        handle.join().unwrap();
        assert!(node.blockchain().len().unwrap() >= 2);
    }

    #[test]
    fn test_resolver_stops_on_shutdown() {
        let node = Arc::new(create_test_node(StaticPeers::new()));
        let handle = spawn_resolver(Arc::clone(&node), Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        node.shutdown();
        handle.join().unwrap();
        assert_eq!(node.blockchain().len().unwrap(), 1);
    }
}
