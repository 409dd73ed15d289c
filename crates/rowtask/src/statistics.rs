//! Run statistics: what happened to each row.

use crate::error::{ApplyError, RowProcessError};
use serde::Serialize;
use std::fmt;

/// Why a row was not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// The operation read a field the row does not have.
    MissingField { column: String },
    /// The operation declined the row.
    Rejected,
    /// The operation failed in a way that aborted the run.
    Fault,
    /// The operation panicked.
    Panic,
}

/// A recorded row failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Zero-based index of the row in the run's input.
    pub row: usize,
    pub kind: FailureKind,
    pub message: String,
}

impl RowFailure {
    pub fn from_error(row: usize, error: &ApplyError) -> Self {
        let kind = match error {
            ApplyError::Row(RowProcessError::MissingField { column }) => {
                FailureKind::MissingField {
                    column: column.clone(),
                }
            }
            ApplyError::Lookup(column) => FailureKind::MissingField {
                column: column.clone(),
            },
            ApplyError::Row(RowProcessError::Rejected(_)) => FailureKind::Rejected,
            ApplyError::Fault(_) => FailureKind::Fault,
        };
        Self {
            row,
            kind,
            message: error.to_string(),
        }
    }
}

/// Counters for one engine invocation (or several, when supplied by the caller).
///
/// Only the engine and [`Task`](crate::Task) mutate these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<RowFailure>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows accounted for so far.
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    /// Count a failed row and keep its error.
    pub fn record_failure(&mut self, row: usize, error: &ApplyError) {
        self.failed += 1;
        self.errors.push(RowFailure::from_error(row, error));
    }

    pub(crate) fn record_panic(&mut self, row: usize, message: String) {
        self.failed += 1;
        self.errors.push(RowFailure {
            row,
            kind: FailureKind::Panic,
            message,
        });
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows total, {} completed, {} skipped, {} failed",
            self.total(),
            self.completed,
            self.skipped,
            self.failed
        )
    }
}
