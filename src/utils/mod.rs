//! Utility functions and helpers
//!
//! Hashing, key handling, hex encoding and the two serialization formats
//! (bincode on disk, canonical JSON for hashing and signing).

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode,
    hex_encode, new_key_pair, public_key_from_pkcs8, sha256_digest, sha256_hex,
};

pub use serialization::{canonical_json, deserialize, serialize};
