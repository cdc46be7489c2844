use crate::error::Result;
use crate::utils::{hex_encode, new_key_pair, public_key_from_pkcs8};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// What the registry stores per pid. Never mutated after issuance.
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, Zeroize, ZeroizeOnDrop)]
pub struct KeypairRecord {
    pid: String,
    public_key: String,  // hex of the uncompressed P-256 point; this is the identity
    private_key: String, // hex of the PKCS#8 document
}

impl KeypairRecord {
    /// Generates a fresh P-256 keypair for `pid`
    pub fn generate(pid: &str) -> Result<KeypairRecord> {
        let pkcs8 = new_key_pair()?;
        let public_key = public_key_from_pkcs8(&pkcs8)?;
        Ok(KeypairRecord {
            pid: pid.to_string(),
            public_key: hex_encode(&public_key),
            private_key: hex_encode(&pkcs8),
        })
    }

    pub fn get_pid(&self) -> &str {
        self.pid.as_str()
    }

    pub fn get_public_key(&self) -> &str {
        self.public_key.as_str()
    }

    pub(crate) fn get_private_key(&self) -> &str {
        self.private_key.as_str()
    }
}

/// Returned exactly once, when a wallet is issued
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IssuedWallet {
    pub public_key: String,
    pub private_key: String,
}

impl From<&KeypairRecord> for IssuedWallet {
    fn from(record: &KeypairRecord) -> Self {
        IssuedWallet {
            public_key: record.public_key.clone(),
            private_key: record.private_key.clone(),
        }
    }
}

impl std::fmt::Debug for IssuedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedWallet")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
