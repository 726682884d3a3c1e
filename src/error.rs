//! Error types for tabula
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TabulaError
pub type Result<T> = std::result::Result<T, TabulaError>;

/// Unified error type for tabula operations
#[derive(Debug, Error)]
pub enum TabulaError {
    // -------------------------------------------------------------------------
    // Validation Errors (raised immediately, never retried)
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Column {0} is empty")]
    MissingColumn(String),

    #[error("Row index {index} is out of range [0, {count})")]
    IndexOutOfRange { index: u64, count: u64 },

    #[error("Entry data is {size} bytes, exceeding the {max}-byte registry limit")]
    PayloadTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    /// The registry did not answer a read within the timeout. For index
    /// keys this doubles as the "entry absent" signal.
    #[error("Registry lookup timed out")]
    LookupTimeout,

    /// A cell that should exist could not be read (a row truncated by a
    /// crash between the cell writes and the index bump).
    #[error("Cell not found: {key}")]
    CellNotFound { key: String },

    /// The registry refused a write. Typically a stale or duplicate
    /// revision, or a signature produced under a different seed.
    #[error("Registry rejected the entry: {0}")]
    RegistryRejected(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Undecodable registry response: {0}")]
    BadResponse(String),
}
