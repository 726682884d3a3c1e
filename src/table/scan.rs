//! Concurrent conditional scan
//!
//! Scans a table's rows in descending index order across a pool of
//! worker threads. Worker *w* of *n* owns the residue class
//! `start - w, start - w - n, start - w - 2n, …` down to zero, so the
//! workers partition the range without coordination.
//!
//! Shared state is deliberately minimal: an atomic budget counter that
//! reserves result slots and a channel the workers push finished rows
//! into. All of it lives in a per-call context; nothing is stored on the
//! table handle, so two scans on one table cannot interfere.
//!
//! There is no cross-worker cancellation broadcast. A worker observes a
//! saturated budget only between visits, so workers already mid-lookup
//! may perform wasted reads past the target size. When more rows match
//! than were asked for, which rows win the budget race is
//! non-deterministic; callers get *some* `n_rows` valid matches.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam::channel::{self, Sender};

use crate::error::{Result, TabulaError};
use crate::registry::RegistryClient;

use super::condition::{Condition, MatchStrategy};
use super::{cell_key, Row};

/// Per-call scan state, shared read-only across the worker pool
pub(crate) struct ScanContext<'a> {
    pub table_name: &'a str,
    pub columns: &'a [String],
    pub column_split: &'a [String],
    pub registry: &'a RegistryClient,
    pub condition: &'a Condition,
    pub strategy: &'a MatchStrategy,
    /// Max rows to collect across all workers
    pub n_rows: usize,
}

/// Run the scan and collect at most `n_rows` matching rows
pub(crate) fn run(
    ctx: &ScanContext<'_>,
    start_index: u64,
    num_workers: usize,
) -> BTreeMap<u64, Row> {
    let budget = AtomicUsize::new(0);
    let (results, collected) = channel::unbounded();

    thread::scope(|scope| {
        for worker in 0..num_workers {
            let results = results.clone();
            let budget = &budget;
            scope.spawn(move || {
                scan_residue_class(
                    ctx,
                    start_index as i64 - worker as i64,
                    num_workers as i64,
                    budget,
                    results,
                );
            });
        }
    });
    drop(results);

    collected.into_iter().collect()
}

/// Walk one descending residue class until it is exhausted or the shared
/// budget is spent
fn scan_residue_class(
    ctx: &ScanContext<'_>,
    mut work_index: i64,
    stride: i64,
    budget: &AtomicUsize,
    results: Sender<(u64, Row)>,
) {
    while work_index >= 0 && budget.load(Ordering::SeqCst) < ctx.n_rows {
        let index = work_index as u64;

        match row_matches(ctx, index) {
            Ok(true) => {
                // Reserve a result slot; losing this race means another
                // worker filled the budget first
                let reserved = budget
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |claimed| {
                        if claimed < ctx.n_rows {
                            Some(claimed + 1)
                        } else {
                            None
                        }
                    })
                    .is_ok();

                if reserved {
                    match read_row(ctx, index) {
                        Ok(row) => {
                            // The collector outlives every worker, so a
                            // send cannot fail
                            let _ = results.send((index, row));
                        }
                        Err(err) => {
                            // Give the slot back so another match can
                            // still fill it
                            budget.fetch_sub(1, Ordering::SeqCst);
                            tracing::warn!(index, %err, "matched row could not be read, skipping");
                        }
                    }
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(index, %err, "scan worker stopping early on read failure");
                return;
            }
        }

        work_index -= stride;
    }
}

/// Evaluate every condition entry against the row at `index`,
/// short-circuiting on the first mismatch
fn row_matches(ctx: &ScanContext<'_>, index: u64) -> Result<bool> {
    for (key, expected) in ctx.condition {
        let column = ctx.strategy.cell_column(key);
        let data_key = cell_key(ctx.table_name, column, index);
        let (value, _revision) = ctx.registry.get_entry(&data_key)?;
        if !ctx.strategy.matches(key, expected, &value, ctx.column_split) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Read every declared column of the row at `index`
fn read_row(ctx: &ScanContext<'_>, index: u64) -> Result<Row> {
    let mut row = Row::new();
    for column in ctx.columns {
        let data_key = cell_key(ctx.table_name, column, index);
        let (value, _revision) =
            ctx.registry.get_entry(&data_key).map_err(|err| match err {
                TabulaError::LookupTimeout => TabulaError::CellNotFound {
                    key: data_key.clone(),
                },
                other => other,
            })?;
        row.insert(column.clone(), value);
    }
    Ok(row)
}
