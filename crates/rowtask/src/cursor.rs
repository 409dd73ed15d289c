//! Input cursor that remembers what it has handed out.

use crate::row::Row;
use std::collections::VecDeque;

/// An iterator over rows that keeps every row it has returned.
///
/// If processing stops part way, [`recover`](RowCursor::recover) rebuilds the
/// full row set from the rows already emitted downstream plus everything the
/// cursor still knows about.
#[derive(Debug, Clone, Default)]
pub struct RowCursor {
    returned: Vec<Row>,
    remaining: VecDeque<Row>,
}

impl RowCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            returned: Vec::with_capacity(rows.len()),
            remaining: rows.into(),
        }
    }

    /// Rows handed out so far, in their original form.
    pub fn returned(&self) -> &[Row] {
        &self.returned
    }

    /// Rows not yet handed out.
    pub fn remaining(&self) -> impl ExactSizeIterator<Item = &Row> {
        self.remaining.iter()
    }

    /// The full row set, given the `emitted` results for a prefix of it.
    ///
    /// `emitted[i]` replaces the i-th returned row. Returned rows with no
    /// emitted counterpart (the row in flight when processing stopped) keep
    /// their original form, followed by all rows never returned.
    pub fn recover(self, emitted: Vec<Row>) -> Vec<Row> {
        let done = emitted.len().min(self.returned.len());
        let mut rows = emitted;
        rows.extend(self.returned.into_iter().skip(done));
        rows.extend(self.remaining);
        rows
    }
}

impl Iterator for RowCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let row = self.remaining.pop_front()?;
        self.returned.push(row.clone());
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.len(), Some(self.remaining.len()))
    }
}

impl ExactSizeIterator for RowCursor {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowExt;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| Row::new().with("n", i.to_string())).collect()
    }

    #[test]
    fn test_iterates_in_order() {
        let cursor = RowCursor::new(rows(3));
        let seen: Vec<_> = cursor.map(|r| r["n"].clone()).collect();
        assert_eq!(seen, ["0", "1", "2"]);
    }

    #[test]
    fn test_recover_after_partial_consumption() {
        let mut cursor = RowCursor::new(rows(4));

        let first = cursor.next().unwrap();
        let _in_flight = cursor.next().unwrap();
        assert_eq!(cursor.returned().len(), 2);
        assert_eq!(cursor.remaining().len(), 2);

        let emitted = vec![first.with("done", "yes")];
        let recovered = cursor.recover(emitted);

        assert_eq!(recovered.len(), 4);
        assert_eq!(recovered[0]["done"], "yes");
        assert_eq!(recovered[1], Row::new().with("n", "1"));
        assert_eq!(recovered[3], Row::new().with("n", "3"));
    }

    #[test]
    fn test_recover_untouched() {
        let cursor = RowCursor::new(rows(2));
        assert_eq!(cursor.recover(Vec::new()), rows(2));
    }
}
