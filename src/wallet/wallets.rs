use crate::error::{LedgerError, Result};
use crate::storage::KeyValueStore;
use crate::utils::{deserialize, hex_decode, serialize};
use crate::wallet::{IssuedWallet, KeypairRecord};
use log::info;
use std::sync::Arc;
use zeroize::Zeroizing;

const PID_PREFIX: &str = "pid:";
const IDENTITY_PREFIX: &str = "identity:";

/// Binds pids to keypairs and is the only holder of private keys.
///
/// Records live under `pid:<pid>`; `identity:<public key>` indexes them back to the pid.
#[derive(Clone)]
pub struct WalletRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl WalletRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> WalletRegistry {
        WalletRegistry { store }
    }

    /// Issues a keypair for `pid`. A pid that already has one is rejected, never overwritten.
    pub fn issue(&self, pid: &str) -> Result<IssuedWallet> {
        if pid.trim().is_empty() {
            return Err(LedgerError::InvalidIdentity("pid must not be empty".to_string()));
        }

        let record = KeypairRecord::generate(pid)?;
        let bytes = Zeroizing::new(serialize(&record)?);
        // Record and identity index land together or not at all
        let record_key = pid_key(pid);
        let index_key = identity_key(record.get_public_key());
        let entries = [
            (record_key.as_slice(), bytes.as_slice()),
            (index_key.as_slice(), pid.as_bytes()),
        ];
        if !self.store.insert_all_if_absent(&entries)? {
            return Err(LedgerError::DuplicatePid(pid.to_string()));
        }

        info!("Issued wallet for pid {pid}");
        Ok(IssuedWallet::from(&record))
    }

    /// Public key (identity) bound to `pid`
    pub fn lookup(&self, pid: &str) -> Result<String> {
        let record = self
            .record(pid)?
            .ok_or_else(|| LedgerError::NotFound(pid.to_string()))?;
        Ok(record.get_public_key().to_string())
    }

    pub fn is_registered(&self, identity: &str) -> Result<bool> {
        self.store.contains(&identity_key(identity))
    }

    /// PKCS#8 bytes of the key bound to `identity`, for internal signing only
    pub(crate) fn signing_key(&self, identity: &str) -> Result<Zeroizing<Vec<u8>>> {
        let not_found = || LedgerError::KeyNotFound(identity.to_string());

        let pid_bytes = self
            .store
            .get(&identity_key(identity))?
            .ok_or_else(not_found)?;
        let pid = String::from_utf8(pid_bytes)
            .map_err(|e| LedgerError::Database(format!("Corrupt identity index: {e}")))?;
        let record = self.record(&pid)?.ok_or_else(not_found)?;
        Ok(Zeroizing::new(hex_decode(record.get_private_key())?))
    }

    fn record(&self, pid: &str) -> Result<Option<KeypairRecord>> {
        match self.store.get(&pid_key(pid))? {
            Some(bytes) => {
                let bytes = Zeroizing::new(bytes);
                Ok(Some(deserialize::<KeypairRecord>(&bytes)?))
            }
            None => Ok(None),
        }
    }
}

fn pid_key(pid: &str) -> Vec<u8> {
    format!("{PID_PREFIX}{pid}").into_bytes()
}

fn identity_key(identity: &str) -> Vec<u8> {
    format!("{IDENTITY_PREFIX}{identity}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SledStore};

    fn registry() -> WalletRegistry {
        WalletRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_issue_and_lookup() {
        let registry = registry();
        let issued = registry.issue("A123456789").unwrap();

        assert_eq!(registry.lookup("A123456789").unwrap(), issued.public_key);
        assert!(registry.is_registered(&issued.public_key).unwrap());
    }

    #[test]
    fn test_duplicate_pid_is_rejected() {
        let registry = registry();
        let first = registry.issue("dup").unwrap();
        assert_eq!(
            registry.issue("dup").unwrap_err(),
            LedgerError::DuplicatePid("dup".to_string())
        );
        // Original binding is untouched
        assert_eq!(registry.lookup("dup").unwrap(), first.public_key);
    }

    #[test]
    fn test_lookup_unknown_pid() {
        assert_eq!(
            registry().lookup("ghost").unwrap_err(),
            LedgerError::NotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_empty_pid_is_rejected() {
        assert!(matches!(
            registry().issue("  "),
            Err(LedgerError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_signing_key_for_unknown_identity() {
        assert!(matches!(
            registry().signing_key("abcd"),
            Err(LedgerError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_registry_persists_in_sled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = sled::open(temp_dir.path().join("registry")).unwrap();
        let registry = WalletRegistry::new(Arc::new(SledStore::open(&db, "wallets").unwrap()));
        let issued = registry.issue("pid-1").unwrap();

        let reopened = WalletRegistry::new(Arc::new(SledStore::open(&db, "wallets").unwrap()));
        assert_eq!(reopened.lookup("pid-1").unwrap(), issued.public_key);
        let pkcs8 = reopened.signing_key(&issued.public_key).unwrap();
        assert_eq!(
            crate::utils::hex_encode(&pkcs8),
            issued.private_key
        );
    }
}
