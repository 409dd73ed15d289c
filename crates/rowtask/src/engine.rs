//! Engine: drives an operation over every row.
//!
//! The engine emits exactly one output row per input row, in input order.
//! Per row:
//! 1. skip if the operation already has a result there (when allowed),
//! 2. otherwise `apply_safe` and merge the delta into a new row,
//! 3. on a row-level error either emit the original row (when skipping
//!    failing rows) or stop.
//!
//! Faults that are not row-level always stop the sequence.

use crate::error::ApplyError;
use crate::operation::{Operation, OperationExt};
use crate::row::{Row, RowExt};
use crate::statistics::RunStatistics;
use crate::table::Table;
use tracing::debug;

/// How the engine treats skippable rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Emit rows unchanged on `RowProcessError` instead of stopping.
    pub skip_failing_rows: bool,
    /// Emit rows unchanged when `has_previous_result` is true, without applying.
    pub skip_previous_results: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            skip_failing_rows: true,
            skip_previous_results: true,
        }
    }
}

impl EngineOptions {
    /// Stop at the first failing row.
    pub fn strict() -> Self {
        Self {
            skip_failing_rows: false,
            ..Self::default()
        }
    }

    pub fn skip_failing_rows(mut self, skip: bool) -> Self {
        self.skip_failing_rows = skip;
        self
    }

    pub fn skip_previous_results(mut self, skip: bool) -> Self {
        self.skip_previous_results = skip;
        self
    }
}

/// Lazy, forward-only sequence of processed rows. See [`apply_to_each`].
///
/// Yields `Ok(row)` per input row. After yielding an `Err` it is exhausted,
/// leaving the rest of the input unconsumed.
pub struct ApplyToEach<'a, I, O: ?Sized> {
    rows: I,
    operation: &'a O,
    options: EngineOptions,
    statistics: &'a mut RunStatistics,
    index: usize,
    finished: bool,
}

/// Apply `operation` to each row, lazily.
///
/// Nothing happens until the returned iterator is consumed. Callers that need
/// the unconsumed remainder after an error must keep their own handle on the
/// input (see [`RowCursor`](crate::RowCursor)).
pub fn apply_to_each<'a, I, O>(
    rows: I,
    operation: &'a O,
    options: EngineOptions,
    statistics: &'a mut RunStatistics,
) -> ApplyToEach<'a, I::IntoIter, O>
where
    I: IntoIterator<Item = Row>,
    O: Operation + ?Sized,
{
    ApplyToEach {
        rows: rows.into_iter(),
        operation,
        options,
        statistics,
        index: 0,
        finished: false,
    }
}

impl<I, O: ?Sized> ApplyToEach<'_, I, O> {
    /// Statistics so far.
    pub fn statistics(&self) -> &RunStatistics {
        &*self.statistics
    }

    /// Index of the next row to be processed.
    pub fn position(&self) -> usize {
        self.index
    }
}

impl<I, O> Iterator for ApplyToEach<'_, I, O>
where
    I: Iterator<Item = Row>,
    O: Operation + ?Sized,
{
    type Item = Result<Row, ApplyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let Some(row) = self.rows.next() else {
            self.finished = true;
            return None;
        };
        let index = self.index;
        self.index += 1;

        if self.options.skip_previous_results && self.operation.has_previous_result(&row) {
            debug!(row = index, operation = self.operation.name(), "skipping row with previous result");
            self.statistics.skipped += 1;
            return Some(Ok(row));
        }

        match self.operation.apply_safe(&row) {
            Ok(delta) => {
                self.statistics.completed += 1;
                Some(Ok(row.merged(delta)))
            }
            Err(error) if error.is_row_level() && self.options.skip_failing_rows => {
                debug!(row = index, operation = self.operation.name(), %error, "error processing row");
                self.statistics.record_failure(index, &error);
                Some(Ok(row))
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (0, self.rows.size_hint().1)
        }
    }
}

/// Run `operation` on every row of `table` into a new table.
///
/// The result shares the input's column order; new columns appear through
/// [`Table::fieldnames`].
pub fn process<O>(table: &Table, operation: &O, options: EngineOptions) -> Result<Table, ApplyError>
where
    O: Operation + ?Sized,
{
    let mut statistics = RunStatistics::new();
    process_with(table, operation, options, &mut statistics)
}

/// Like [`process`], accumulating into caller-supplied statistics.
pub fn process_with<O>(
    table: &Table,
    operation: &O,
    options: EngineOptions,
    statistics: &mut RunStatistics,
) -> Result<Table, ApplyError>
where
    O: Operation + ?Sized,
{
    let rows = apply_to_each(table.iter().cloned(), operation, options, statistics)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(rows, table.column_order().to_vec()))
}
