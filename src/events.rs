//! Fire-and-forget ledger notifications for connected observers.
//!
//! Delivery is best effort: a subscriber that has gone away is dropped silently and
//! publishing never fails.

use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A block was accepted; anyone still mining on the old tip lost the race
    MiningRaceLost { index: u64, forger: String },
    /// A transaction entered the pending pool
    NewTransaction {
        sender: String,
        recipient: String,
        amount: u64,
        block_index: u64,
    },
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<LedgerEvent>>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        let (sender, receiver) = mpsc::channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }

    pub fn publish(&self, event: LedgerEvent) {
        debug!("Broadcasting {event:?}");
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        let event = LedgerEvent::MiningRaceLost {
            index: 1,
            forger: "miner".to_string(),
        };

        bus.publish(event.clone());
        assert_eq!(first.try_recv().unwrap(), event);
        assert_eq!(second.try_recv().unwrap(), event);
    }

    #[test]
    fn test_dropped_subscriber_is_ignored() {
        let bus = EventBus::new();
        drop(bus.subscribe());
        let live = bus.subscribe();

        bus.publish(LedgerEvent::MiningRaceLost {
            index: 2,
            forger: "x".to_string(),
        });
        assert!(live.try_recv().is_ok());
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBus::new().publish(LedgerEvent::MiningRaceLost {
            index: 0,
            forger: String::new(),
        });
    }
}
