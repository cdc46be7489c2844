use crate::core::Transaction;

/// Pending transactions in admission order.
///
/// Not synchronised on its own: the chain store keeps it under the same lock as the
/// chain tail so that append and drain happen together.
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    pending: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool { pending: vec![] }
    }

    pub fn add(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    /// Returns every pending transaction and leaves the pool empty
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.pending)
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
