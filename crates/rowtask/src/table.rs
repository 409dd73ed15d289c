//! In-memory tables: rows plus a remembered column order.

use crate::row::Row;
use indexmap::IndexSet;
use std::ops::{Bound, RangeBounds};

/// An ordered collection of rows with a remembered column order.
///
/// Tables may be sparse: rows can carry different subsets of fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
    column_order: Vec<String>,
}

impl Table {
    /// Create a table from rows and a column order.
    pub fn new(rows: Vec<Row>, column_order: Vec<String>) -> Self {
        Self { rows, column_order }
    }

    /// Create a table with no remembered column order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(rows, Vec::new())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The remembered column order (not including columns only found in rows).
    pub fn column_order(&self) -> &[String] {
        &self.column_order
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Append a row.
    pub fn append(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// A new table with the rows in `range` and the same column order.
    ///
    /// The range is clamped to the table, like slicing a sequence.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Table {
        let len = self.rows.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);

        Table::new(self.rows[start..end].to_vec(), self.column_order.clone())
    }

    /// Append all rows of `other`.
    ///
    /// The column order becomes the order-preserving union of both tables'
    /// fieldnames: ours first, then new ones from `other`.
    pub fn concat(self, other: Table) -> Table {
        let mut columns: IndexSet<String> = self.fieldnames().into_iter().collect();
        columns.extend(other.fieldnames());

        let mut rows = self.rows;
        rows.extend(other.rows);
        Table::new(rows, columns.into_iter().collect())
    }

    /// All column names: the remembered order first, then any column found
    /// in some row, in first-encountered order.
    pub fn fieldnames(&self) -> Vec<String> {
        let mut names: IndexSet<&str> = self.column_order.iter().map(String::as_str).collect();
        for row in &self.rows {
            names.extend(row.keys().map(String::as_str));
        }
        names.into_iter().map(str::to_string).collect()
    }

    /// Split into rows and column order.
    pub fn into_parts(self) -> (Vec<Row>, Vec<String>) {
        (self.rows, self.column_order)
    }
}

impl IntoIterator for Table {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl FromIterator<Row> for Table {
    fn from_iter<T: IntoIterator<Item = Row>>(iter: T) -> Self {
        Table::from_rows(iter.into_iter().collect())
    }
}
