//! Transaction signatures.
//!
//! Both sides work on [`canonicalize`] output, so signer and verifier agree on the bytes
//! no matter how the transaction was assembled.

use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode, hex_encode,
};
use crate::wallet::WalletRegistry;
use zeroize::Zeroizing;

pub fn canonicalize(tx: &Transaction) -> Result<Vec<u8>> {
    tx.canonical_bytes()
}

/// Signs with the key the registry holds for `identity`. Fails with `KeyNotFound`.
pub fn sign_transaction(
    registry: &WalletRegistry,
    identity: &str,
    tx: &Transaction,
) -> Result<String> {
    let pkcs8 = registry.signing_key(identity)?;
    let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, &canonicalize(tx)?)?;
    Ok(hex_encode(&signature))
}

/// Signs with a caller-held private key (hex PKCS#8)
pub fn sign_with_private_key(private_key: &str, tx: &Transaction) -> Result<String> {
    let pkcs8 = Zeroizing::new(hex_decode(private_key)?);
    let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, &canonicalize(tx)?)?;
    Ok(hex_encode(&signature))
}

/// `Ok(false)` for a wrong signature; `Err` only when the inputs are not valid hex
pub fn verify_transaction(identity: &str, tx: &Transaction, signature: &str) -> Result<bool> {
    let public_key = hex_decode(identity)?;
    let signature = hex_decode(signature)?;
    Ok(ecdsa_p256_sha256_sign_verify(
        &public_key,
        &signature,
        &canonicalize(tx)?,
    ))
}
