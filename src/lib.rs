//! # tabula
//!
//! Relational-like tables over a remote, append-only, revision-versioned
//! key-value registry:
//! - Deterministic seed → Ed25519 identity derivation
//! - Canonical encoding and BLAKE2b-256 signing protocol for registry
//!   entries
//! - Optimistic-concurrency revision bookkeeping
//! - Multi-worker conditional scan over the append log
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Table                                │
//! │     (index lifecycle, rows, concurrent conditional scan)     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    RegistryClient                            │
//! │          (get/set entry, size + revision contract)           │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!     ┌─────────────┐               ┌──────────────┐
//!     │ SignedEntry │               │   Identity   │
//!     │ (canonical  │◄──────────────│ (seed-derived│
//!     │  digest +   │               │   Ed25519)   │
//!     │  signature) │               └──────────────┘
//!     └─────────────┘
//! ```
//!
//! The registry itself is a black box reached over HTTP: one signed
//! value per key, one monotonically increasing revision counter per key,
//! no server-side queries. Everything table-shaped is client-side.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod crypto;
pub mod error;
pub mod registry;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::RegistryConfig;
pub use crypto::Identity;
pub use error::{Result, TabulaError};
pub use registry::{RegistryClient, SignedEntry, MAX_DATA_SIZE};
pub use table::{Condition, FetchOptions, MatchStrategy, Row, Table};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tabula
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
