//! Wallet registry and transaction authentication
//!
//! Keypair issuance, pid-to-identity binding and canonical signing/verification.

pub mod signing;
#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use signing::{canonicalize, sign_transaction, sign_with_private_key, verify_transaction};
pub use wallet::{IssuedWallet, KeypairRecord};
pub use wallets::WalletRegistry;
