//! Registry Module
//!
//! Client for the remote Registry Service: a versioned key-value store
//! where every entry is a signed `(datakey, data, revision)` triple and
//! every write must strictly advance the revision counter.
//!
//! ## Wire Contract (HTTP + JSON)
//!
//! ### Read
//! ```text
//! GET <portal>/skynet/registry?publickey=ed25519:<hex>&datakey=<hex>
//! 200 → {"data": "<hex>", "revision": <u64>}
//! ```
//! An absent entry does not answer; absence surfaces as a read timeout.
//!
//! ### Write
//! ```text
//! POST <portal>/skynet/registry
//! {"publickey": {"algorithm": "ed25519", "key": [32 ints]},
//!  "datakey": "<hex>", "revision": <u64>,
//!  "data": [ints], "signature": [64 ints]}
//! 204 → stored; anything else → rejected
//! ```

mod client;
mod entry;

pub use client::RegistryClient;
pub use entry::{SignedEntry, MAX_DATA_SIZE, SIGNATURE_LEN};
