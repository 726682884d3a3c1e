//! Signed registry entries
//!
//! Builds the canonical signing payload for a registry write and the
//! detached signature the service verifies.

use serde::Deserialize;

use crate::crypto::{encode_num, encode_string, hash_all, hash_data_key_bytes, Identity};
use crate::error::{Result, TabulaError};

/// Max size of an entry's data, in bytes. Enforced locally before any
/// network call; the service enforces the same limit.
pub const MAX_DATA_SIZE: usize = 113;

/// Size of a detached Ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

/// A registry entry ready to be submitted: hashed key, raw data,
/// revision and the detached signature binding the three together
#[derive(Debug, Clone)]
pub struct SignedEntry {
    /// Hex BLAKE2b-256 of the canonical-encoded data key
    pub data_key_hash: String,

    /// Raw entry data
    pub data: Vec<u8>,

    /// Revision this entry claims. Must strictly exceed the currently
    /// stored revision or the service rejects the write.
    pub revision: u64,

    /// Detached signature over the signing digest
    pub signature: [u8; SIGNATURE_LEN],
}

impl SignedEntry {
    /// Build and sign an entry for a registry write
    ///
    /// Fails with `PayloadTooLarge` before anything touches the network.
    pub fn create(
        identity: &Identity,
        data_key: &str,
        data: &str,
        revision: u64,
    ) -> Result<Self> {
        if data.len() > MAX_DATA_SIZE {
            return Err(TabulaError::PayloadTooLarge {
                size: data.len(),
                max: MAX_DATA_SIZE,
            });
        }

        let hash_bytes = hash_data_key_bytes(data_key);
        let digest = Self::signing_digest(&hash_bytes, data, revision);
        let signature = identity.sign(&digest);

        Ok(Self {
            data_key_hash: hex::encode(hash_bytes),
            data: data.as_bytes().to_vec(),
            revision,
            signature,
        })
    }

    /// The 32-byte digest a registry signature covers
    ///
    /// Strict field order: raw hashed-key bytes, then the encoded data,
    /// then the encoded revision, hashed together. Signing the raw triple
    /// instead of this digest, or reordering the fields, produces
    /// signatures the service rejects.
    pub fn signing_digest(data_key_hash: &[u8], data: &str, revision: u64) -> [u8; 32] {
        hash_all(&[data_key_hash, &encode_string(data), &encode_num(revision)])
    }

    /// Check this entry's signature against an identity's public key
    pub fn verify(&self, identity: &Identity) -> bool {
        let hash_bytes = match hex::decode(&self.data_key_hash) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let data = match std::str::from_utf8(&self.data) {
            Ok(data) => data,
            Err(_) => return false,
        };
        let digest = Self::signing_digest(&hash_bytes, data, self.revision);
        identity.verify(&digest, &self.signature)
    }
}

/// Body of a successful registry read
#[derive(Debug, Deserialize)]
pub(crate) struct ReadResponse {
    /// Entry data, hex encoded
    pub data: String,

    /// Stored revision
    pub revision: u64,
}
