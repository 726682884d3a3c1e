//! Table Module
//!
//! A relational-like veneer over the registry: named columns, an
//! auto-incrementing row index, single-row fetch and a concurrent
//! conditional scan.
//!
//! ## Registry Layout
//!
//! One entry per cell plus one index entry per table:
//! ```text
//! ┌────────────────────────────┬───────────────────────────┐
//! │ logical key                │ data                      │
//! ├────────────────────────────┼───────────────────────────┤
//! │ INDEX:<table>              │ row count, decimal        │
//! │ <table>:<column>:<row>     │ cell value                │
//! └────────────────────────────┴───────────────────────────┘
//! ```
//! Logical keys are hashed before they reach the wire; the service only
//! ever sees digests.
//!
//! ## Consistency Model
//!
//! `add_row` writes all cells, then bumps the index entry. There is no
//! transaction across those writes: a crash after the cells land but
//! before the index bump leaves a row that exists in storage yet is
//! invisible to readers, because readers trust the index. This window is
//! part of the observable contract and is NOT papered over here.

mod condition;
mod scan;

pub use condition::{Condition, MatchStrategy, SPLIT_DELIMITER};

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use crate::config::RegistryConfig;
use crate::crypto::Identity;
use crate::error::{Result, TabulaError};
use crate::registry::RegistryClient;

use scan::ScanContext;

/// A materialized row: column name → cell value
pub type Row = HashMap<String, String>;

/// Logical key of a table's index entry
pub(crate) fn index_key(table: &str) -> String {
    format!("INDEX:{table}")
}

/// Logical key of one cell
pub(crate) fn cell_key(table: &str, column: &str, index: u64) -> String {
    format!("{table}:{column}:{index}")
}

// =============================================================================
// Fetch Options
// =============================================================================

/// Tuning knobs for a conditional scan
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Max rows to collect
    pub n_rows: usize,

    /// Worker threads scanning disjoint residue classes
    pub num_workers: usize,

    /// How condition entries are evaluated
    pub strategy: MatchStrategy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            n_rows: 2,
            num_workers: 1,
            strategy: MatchStrategy::Equality,
        }
    }
}

impl FetchOptions {
    /// Set the max rows to collect
    pub fn n_rows(mut self, n_rows: usize) -> Self {
        self.n_rows = n_rows;
        self
    }

    /// Set the number of scan workers
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the match strategy
    pub fn strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

// =============================================================================
// Table Builder
// =============================================================================

/// Builder for [`Table`]
pub struct TableBuilder {
    name: String,
    columns: Vec<String>,
    column_split: Vec<String>,
    seed: String,
    config: RegistryConfig,
}

impl TableBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            column_split: Vec::new(),
            seed: String::new(),
            config: RegistryConfig::from_env(),
        }
    }

    /// Declare the table's columns
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Declare the sub-fields of a delimiter-joined composite column,
    /// for use with [`MatchStrategy::ColumnSplit`]
    pub fn column_split<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_split = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the seed the table's identity is derived from
    ///
    /// The seed is the only credential: anyone re-entering it regains
    /// write access to the table, and losing it loses the table.
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    /// Override the registry configuration
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Derive the identity, probe the index entry and return a ready
    /// table handle
    ///
    /// An index probe that times out is taken to mean the table was
    /// never created, and a fresh index entry is written at revision 1.
    /// A merely-slow registry is indistinguishable from an absent one
    /// here; that ambiguity is inherited from the service contract.
    pub fn open(self) -> Result<Table> {
        if self.columns.is_empty() {
            return Err(TabulaError::InvalidArgument(
                "a table needs at least one column".to_string(),
            ));
        }

        let identity = Identity::from_seed(&self.seed)?;
        let registry = RegistryClient::new(identity, self.config);

        let mut table = Table {
            name: self.name,
            columns: self.columns,
            column_split: self.column_split,
            registry,
            index: 0,
            index_revision: 0,
        };

        let (index, revision) = table.load_or_init_index()?;
        table.index = index;
        table.index_revision = revision;

        tracing::debug!(table = %table.name, index, "table ready");
        Ok(table)
    }
}

// =============================================================================
// Table
// =============================================================================

/// Handle to one logical table stored in the registry
///
/// Holds the table's identity-bound registry client and the in-memory
/// copy of the index entry `(row count, revision)`.
pub struct Table {
    /// Table name; prefixes every logical key
    name: String,

    /// Declared columns
    columns: Vec<String>,

    /// Sub-field names of the composite column, if any
    column_split: Vec<String>,

    /// Identity-bound registry client
    registry: RegistryClient,

    /// Cached row count (the next index to assign)
    index: u64,

    /// Revision of the index entry backing `index`
    index_revision: u64,
}

impl Table {
    /// Start building a table handle
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Probe whether a table exists under the given name and seed
    ///
    /// Returns `Some((row_count, index_revision))` if the index entry
    /// answered, `None` if the probe timed out (no such table, under the
    /// same absence-equals-timeout assumption the builder makes).
    pub fn check_table(
        table_name: &str,
        seed: &str,
        config: RegistryConfig,
    ) -> Result<Option<(u64, u64)>> {
        let identity = Identity::from_seed(seed)?;
        let registry = RegistryClient::new(identity, config);
        let timeout = registry.config().index_timeout;

        match registry.get_entry_with_timeout(&index_key(table_name), timeout) {
            Ok((data, revision)) => Ok(Some((parse_index(&data)?, revision))),
            Err(TabulaError::LookupTimeout) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Row Operations
    // =========================================================================

    /// Append a row and return its assigned index
    ///
    /// Every declared column must be present (`MissingColumn`) and no
    /// undeclared column may appear (`InvalidColumn`). Cells are created
    /// at revision 1 and never overwritten by this method.
    ///
    /// Not atomic: cells are written one entry at a time, then the index
    /// entry. A crash between the last cell write and the index write
    /// leaves the row invisible until something probes past the stale
    /// index.
    pub fn add_row(&mut self, row: &Row) -> Result<u64> {
        for column in row.keys() {
            if !self.columns.contains(column) {
                return Err(TabulaError::InvalidColumn(column.clone()));
            }
        }
        for column in &self.columns {
            if !row.contains_key(column) {
                return Err(TabulaError::MissingColumn(column.clone()));
            }
        }

        let (attempts, delay) = self.retry_params();
        retry_on_timeout(attempts, delay, || self.add_row_once(row))
    }

    fn add_row_once(&mut self, row: &Row) -> Result<u64> {
        let assigned = self.index;
        tracing::debug!(table = %self.name, index = assigned, "adding row");

        for (column, value) in row {
            self.registry
                .set_entry(&cell_key(&self.name, column, assigned), value, 1)?;
        }

        // Crash window: the cells for `assigned` exist from here until
        // the index write below lands
        self.registry.set_entry(
            &index_key(&self.name),
            &(assigned + 1).to_string(),
            self.index_revision + 1,
        )?;

        self.index = assigned + 1;
        self.index_revision += 1;
        Ok(assigned)
    }

    /// Append several rows, returning the assigned indices in order
    pub fn add_rows(&mut self, rows: &[Row]) -> Result<Vec<u64>> {
        let mut indices = Vec::with_capacity(rows.len());
        for row in rows {
            indices.push(self.add_row(row)?);
        }
        Ok(indices)
    }

    /// Overwrite the given columns of an existing row
    ///
    /// Each touched cell is read for its current revision and rewritten
    /// one revision higher. Two concurrent updaters race on that
    /// read-then-write; the loser's write comes back `RegistryRejected`
    /// (never silently lost) and the caller is expected to re-read and
    /// retry.
    pub fn update_row(&mut self, index: u64, data: &Row) -> Result<()> {
        for column in data.keys() {
            if !self.columns.contains(column) {
                return Err(TabulaError::InvalidColumn(column.clone()));
            }
        }

        let (attempts, delay) = self.retry_params();
        retry_on_timeout(attempts, delay, || self.update_row_once(index, data))
    }

    fn update_row_once(&mut self, index: u64, data: &Row) -> Result<()> {
        // Refresh the index first so rows added by other handles are in
        // range
        self.recalibrate()?;
        self.check_range(index)?;

        tracing::debug!(table = %self.name, index, "updating row");

        for (column, value) in data {
            let key = cell_key(&self.name, column, index);
            let (_current, revision) = self.cell_entry(&key)?;
            self.registry.set_entry(&key, value, revision + 1)?;
        }
        Ok(())
    }

    /// Read the row at `index`, assembling every declared column
    ///
    /// A cell read that times out fails with `CellNotFound`: within the
    /// index range every cell should exist, so a silent gap means the
    /// row was truncated by a crash.
    pub fn fetch_row(&mut self, index: u64) -> Result<Row> {
        let (attempts, delay) = self.retry_params();
        retry_on_timeout(attempts, delay, || {
            self.recalibrate()?;
            self.check_range(index)?;
            self.read_row_cells(index)
        })
    }

    /// Read several rows by index, returning index → row
    pub fn fetch_rows(&mut self, indices: &[u64]) -> Result<BTreeMap<u64, Row>> {
        self.calibrate_index()?;

        let mut rows = BTreeMap::new();
        for &index in indices {
            self.check_range(index)?;
            rows.insert(index, self.read_row_cells(index)?);
        }
        Ok(rows)
    }

    /// Scan for rows matching a condition, newest first
    ///
    /// Walks indices in descending order from `start_index`, spread
    /// across `options.num_workers` workers, and collects at most
    /// `options.n_rows` matching rows as an index → row map.
    ///
    /// When more rows match than `options.n_rows`, which of them are
    /// returned depends on worker interleaving and is intentionally
    /// non-deterministic; every returned row individually satisfies the
    /// condition. Workers that hit a read failure log it and stop their
    /// residue class; the scan stays best-effort rather than failing the
    /// whole call.
    pub fn fetch(
        &mut self,
        condition: &Condition,
        start_index: u64,
        options: FetchOptions,
    ) -> Result<BTreeMap<u64, Row>> {
        if condition.is_empty() {
            return Err(TabulaError::InvalidArgument(
                "the condition must not be empty".to_string(),
            ));
        }
        for key in condition.keys() {
            match &options.strategy {
                MatchStrategy::Equality => {
                    if !self.columns.contains(key) {
                        return Err(TabulaError::InvalidColumn(key.clone()));
                    }
                }
                MatchStrategy::ColumnSplit { column } => {
                    if !self.columns.contains(column) {
                        return Err(TabulaError::InvalidColumn(column.clone()));
                    }
                    if !self.column_split.contains(key) {
                        return Err(TabulaError::InvalidColumn(key.clone()));
                    }
                }
            }
        }

        let (attempts, delay) = self.retry_params();
        retry_on_timeout(attempts, delay, || self.recalibrate())?;
        self.check_range(start_index)?;

        if options.n_rows == 0 {
            return Ok(BTreeMap::new());
        }
        let num_workers = options.num_workers.max(1);

        tracing::debug!(
            table = %self.name,
            start_index,
            n_rows = options.n_rows,
            num_workers,
            "scanning for matching rows"
        );

        let ctx = ScanContext {
            table_name: &self.name,
            columns: &self.columns,
            column_split: &self.column_split,
            registry: &self.registry,
            condition,
            strategy: &options.strategy,
            n_rows: options.n_rows,
        };
        Ok(scan::run(&ctx, start_index, num_workers))
    }

    // =========================================================================
    // Index Management
    // =========================================================================

    /// Re-read the index entry from the registry, with the configured
    /// retry policy, and adopt its `(row count, revision)`
    pub fn calibrate_index(&mut self) -> Result<()> {
        let (attempts, delay) = self.retry_params();
        retry_on_timeout(attempts, delay, || self.recalibrate())
    }

    /// The cached row count (also the next index to assign)
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Revision of the index entry backing [`Table::index`]
    pub fn index_revision(&self) -> u64 {
        self.index_revision
    }

    /// The table's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Read the index entry or, when the probe times out, initialize it
    /// to zero at revision 1
    fn load_or_init_index(&mut self) -> Result<(u64, u64)> {
        match self.read_index() {
            Ok(pair) => Ok(pair),
            Err(TabulaError::LookupTimeout) => {
                tracing::debug!(table = %self.name, "no index entry answered, initializing table");
                self.registry.set_entry(&index_key(&self.name), "0", 1)?;
                Ok((0, 1))
            }
            Err(err) => Err(err),
        }
    }

    /// One read of the index entry, parsed
    fn read_index(&self) -> Result<(u64, u64)> {
        let timeout = self.registry.config().index_timeout;
        let (data, revision) = self
            .registry
            .get_entry_with_timeout(&index_key(&self.name), timeout)?;
        Ok((parse_index(&data)?, revision))
    }

    /// Refresh the cached index fields from the registry
    fn recalibrate(&mut self) -> Result<()> {
        let (index, revision) = self.read_index()?;
        self.index = index;
        self.index_revision = revision;
        tracing::trace!(table = %self.name, index, revision, "index calibrated");
        Ok(())
    }

    fn check_range(&self, index: u64) -> Result<()> {
        if index >= self.index {
            return Err(TabulaError::IndexOutOfRange {
                index,
                count: self.index,
            });
        }
        Ok(())
    }

    /// Read one cell that must exist, mapping a timeout onto
    /// `CellNotFound`
    fn cell_entry(&self, key: &str) -> Result<(String, u64)> {
        self.registry.get_entry(key).map_err(|err| match err {
            TabulaError::LookupTimeout => TabulaError::CellNotFound {
                key: key.to_string(),
            },
            other => other,
        })
    }

    /// Read every declared column of the row at `index` (range already
    /// validated)
    fn read_row_cells(&self, index: u64) -> Result<Row> {
        let mut row = Row::new();
        for column in &self.columns {
            let key = cell_key(&self.name, column, index);
            let (value, _revision) = self.cell_entry(&key)?;
            row.insert(column.clone(), value);
        }
        Ok(row)
    }

    fn retry_params(&self) -> (u32, Duration) {
        let config = self.registry.config();
        (config.retry_attempts, config.retry_delay)
    }
}

/// Retry an operation on `LookupTimeout`, with a fixed delay between
/// attempts
///
/// Validation errors and registry rejections pass straight through;
/// only read timeouts are considered transient here.
fn retry_on_timeout<T>(
    attempts: u32,
    delay: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut remaining = attempts;
    loop {
        match op() {
            Err(TabulaError::LookupTimeout) if remaining > 0 => {
                remaining -= 1;
                tracing::debug!(remaining, "read timed out, retrying after fixed delay");
                thread::sleep(delay);
            }
            other => return other,
        }
    }
}

/// Parse the decimal row count stored in an index entry
fn parse_index(data: &str) -> Result<u64> {
    data.trim().parse::<u64>().map_err(|err| {
        TabulaError::BadResponse(format!("index entry is not a row count: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(index_key("MyTable"), "INDEX:MyTable");
        assert_eq!(cell_key("MyTable", "c2", 7), "MyTable:c2:7");
    }

    #[test]
    fn parse_index_accepts_decimal_counts() {
        assert_eq!(parse_index("0").unwrap(), 0);
        assert_eq!(parse_index("42").unwrap(), 42);
        assert!(parse_index("not a number").is_err());
    }

    #[test]
    fn retry_gives_up_after_the_configured_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry_on_timeout(2, Duration::from_millis(1), || {
            calls += 1;
            Err(TabulaError::LookupTimeout)
        });
        assert!(matches!(result, Err(TabulaError::LookupTimeout)));
        assert_eq!(calls, 3); // first try + two retries
    }

    #[test]
    fn retry_does_not_touch_other_errors() {
        let mut calls = 0;
        let result: Result<()> = retry_on_timeout(5, Duration::from_millis(1), || {
            calls += 1;
            Err(TabulaError::RegistryRejected("stale revision".to_string()))
        });
        assert!(matches!(result, Err(TabulaError::RegistryRejected(_))));
        assert_eq!(calls, 1);
    }
}
