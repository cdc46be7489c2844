use crate::error::{LedgerError, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Tree;
use std::collections::HashMap;
use std::sync::RwLock;

/// Minimal key-value interface the wallet registry is written against.
///
/// Append-only: entries are written once and never replaced or removed.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores every entry, or none of them if any key is already present.
    /// Returns whether the entries were stored.
    fn insert_all_if_absent(&self, entries: &[(&[u8], &[u8])]) -> Result<bool>;

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Sled tree backed store
pub struct SledStore {
    tree: Tree,
}

impl SledStore {
    pub fn open(db: &sled::Db, tree_name: &str) -> Result<SledStore> {
        let tree = db
            .open_tree(tree_name)
            .map_err(|e| LedgerError::Database(format!("Failed to open {tree_name} tree: {e}")))?;
        Ok(SledStore { tree })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn insert_all_if_absent(&self, entries: &[(&[u8], &[u8])]) -> Result<bool> {
        let result = self.tree.transaction(|tx| {
            for (key, _) in entries {
                if tx.get(*key)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(()));
                }
            }
            for (key, value) in entries {
                tx.insert(*key, *value)?;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                self.tree.flush()?;
                Ok(true)
            }
            Err(TransactionError::Abort(())) => Ok(false),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }
}

/// In-process store, contents are lost when dropped
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| LedgerError::Lock(format!("memory store: {e}")))?;
        Ok(inner.get(key).cloned())
    }

    fn insert_all_if_absent(&self, entries: &[(&[u8], &[u8])]) -> Result<bool> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Lock(format!("memory store: {e}")))?;
        if entries.iter().any(|(key, _)| inner.contains_key(*key)) {
            return Ok(false);
        }
        for (key, value) in entries {
            inner.insert(key.to_vec(), value.to_vec());
        }
        Ok(true)
    }
}
