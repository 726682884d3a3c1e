//! Row-matching conditions
//!
//! A condition maps column names (or column-split sub-fields) to expected
//! values. How a condition entry is evaluated against a cell is decided
//! by a match strategy; the strategies form a small closed set rather
//! than an open predicate-injection surface.

use std::collections::HashMap;

/// Column values a scanned row must match
pub type Condition = HashMap<String, String>;

/// Delimiter between the sub-fields of a composite cell
pub const SPLIT_DELIMITER: char = ';';

/// How condition entries are evaluated against cell values
#[derive(Debug, Clone, Default)]
pub enum MatchStrategy {
    /// Condition keys are column names; a cell matches when its value
    /// equals the expected value exactly
    #[default]
    Equality,

    /// One physical column stores several logical sub-fields joined by
    /// [`SPLIT_DELIMITER`]. Condition keys name sub-fields from the
    /// table's column-split list; a cell matches when the sub-field's
    /// segment equals the expected value.
    ColumnSplit { column: String },
}

impl MatchStrategy {
    /// The physical column whose cell must be read to evaluate a
    /// condition entry keyed `key`
    pub(crate) fn cell_column<'a>(&'a self, key: &'a str) -> &'a str {
        match self {
            MatchStrategy::Equality => key,
            MatchStrategy::ColumnSplit { column } => column,
        }
    }

    /// Whether a cell value satisfies the condition entry `key = expected`
    pub(crate) fn matches(
        &self,
        key: &str,
        expected: &str,
        cell_value: &str,
        column_split: &[String],
    ) -> bool {
        match self {
            MatchStrategy::Equality => cell_value == expected,
            MatchStrategy::ColumnSplit { .. } => {
                let Some(position) = column_split.iter().position(|field| field == key) else {
                    return false;
                };
                cell_value
                    .split(SPLIT_DELIMITER)
                    .nth(position)
                    .is_some_and(|segment| segment == expected)
            }
        }
    }
}
