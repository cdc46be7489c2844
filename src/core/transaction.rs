use crate::error::Result;
use crate::utils::{canonical_json, deserialize, serialize};
use serde::{Deserialize, Serialize};

/// Sender used for synthetic mining rewards; it never has to hold a balance.
pub const MINT_ADDRESS: &str = "0";

/// A transfer of `amount` from `sender` to `recipient`.
///
/// Both parties are identities (hex-encoded public keys), except the sender of a
/// reward which is [`MINT_ADDRESS`].
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    sender: String,
    recipient: String,
    amount: u64,
}

impl Transaction {
    pub fn new(sender: &str, recipient: &str, amount: u64) -> Transaction {
        Transaction {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
        }
    }

    /// Synthetic transaction paying a block reward to `recipient`
    pub fn new_reward(recipient: &str, amount: u64) -> Transaction {
        Transaction::new(MINT_ADDRESS, recipient, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == MINT_ADDRESS
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn touches(&self, identity: &str) -> bool {
        self.sender == identity || self.recipient == identity
    }

    /// Byte form signed and verified for this transaction: `{"amount":..,"recipient":..,"sender":..}`
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(canonical_json(self)?.into_bytes())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize::<Transaction>(bytes)
    }
}
