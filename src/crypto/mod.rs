//! Cryptographic primitives
//!
//! Everything here is deterministic: the same inputs always produce the
//! same bytes, on every machine. Registry addressing and signature
//! validity both depend on byte-exact agreement with the reference
//! implementation, so the encodings below must never drift.
//!
//! ## Responsibilities
//! - Canonical byte encodings of integers and strings (signing input)
//! - Seed → Ed25519 identity derivation
//! - BLAKE2b-256 data-key hashing and multi-part digests

mod codec;
mod hash;
mod keys;

pub use codec::{encode_num, encode_string};
pub use hash::{hash_all, hash_data_key, hash_data_key_bytes};
pub use keys::Identity;
