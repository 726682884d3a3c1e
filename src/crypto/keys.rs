//! Identity derivation
//!
//! A seed string fully determines an Ed25519 identity, which in turn
//! determines which registry entries are writable. Losing the seed means
//! losing write access to everything stored under it; re-entering the
//! seed on another machine reproduces the identity bit for bit.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::error::{Result, TabulaError};

/// PBKDF2 iteration count used for seed stretching
const PBKDF2_ROUNDS: u32 = 1000;

/// A deterministic Ed25519 identity derived from a seed string
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Derive an identity from a seed string
    ///
    /// The seed is stretched through PBKDF2-HMAC-SHA256 (1000 rounds,
    /// empty salt) into the 32-byte Ed25519 expansion seed. No randomness
    /// is involved: the same seed yields the same keypair on every
    /// machine.
    pub fn from_seed(seed: &str) -> Result<Self> {
        if seed.is_empty() {
            return Err(TabulaError::InvalidArgument(
                "the seed must be a non-empty string".to_string(),
            ));
        }

        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(seed.as_bytes(), b"", PBKDF2_ROUNDS, &mut key);

        Ok(Self {
            signing_key: SigningKey::from_bytes(&key),
        })
    }

    /// The 32-byte public key
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The 64-byte private key (expansion seed followed by public key)
    pub fn private_key(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    /// Hex form of the public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Public key in the `ed25519:<hex>` query form the registry expects
    pub fn query_key(&self) -> String {
        format!("ed25519:{}", self.public_key_hex())
    }

    /// Produce a detached 64-byte signature over a message
    ///
    /// Equal to the signature prefix of the NaCl signed-message format;
    /// only this prefix goes on the wire.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a detached signature against this identity's public key
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let signature = Signature::from_bytes(signature);
        self.signing_key
            .verifying_key()
            .verify(message, &signature)
            .is_ok()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the private half
        f.debug_struct("Identity")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}
