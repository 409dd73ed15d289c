//! Rows: the unit of data flowing through an operation.
//!
//! A row is an ordered mapping from column name to text. Values are never
//! interpreted: `"007"` stays `"007"`.

use crate::error::ApplyError;
use indexmap::IndexMap;

/// A single record of named text fields.
///
/// Insertion order is preserved, which keeps column discovery deterministic.
pub type Row = IndexMap<String, String>;

/// Extension trait for building and reading rows ergonomically.
pub trait RowExt {
    /// Builder-style insert.
    fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self;

    /// Read a field an operation depends on.
    ///
    /// Absence is reported as [`ApplyError::Lookup`], which the engine turns
    /// into a `MissingField` row error.
    fn require(&self, column: &str) -> Result<&str, ApplyError>;

    /// A new row with `delta` laid over this one. Fields in `delta` win.
    fn merged(&self, delta: Row) -> Row;
}

impl RowExt for Row {
    fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    fn require(&self, column: &str) -> Result<&str, ApplyError> {
        self.get(column)
            .map(String::as_str)
            .ok_or_else(|| ApplyError::Lookup(column.to_string()))
    }

    fn merged(&self, delta: Row) -> Row {
        let mut out = self.clone();
        out.extend(delta);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_builder_keeps_order() {
        let row = Row::new().with("b", "2").with("a", "1");
        let keys: Vec<_> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_require() {
        let row = Row::new().with("patient", "p1");
        assert_eq!(row.require("patient").unwrap(), "p1");

        match row.require("date") {
            Err(ApplyError::Lookup(column)) => assert_eq!(column, "date"),
            other => panic!("expected lookup failure, got {other:?}"),
        }
    }

    #[test]
    fn test_merged_delta_wins_and_keeps_fields() {
        let row = Row::new().with("a", "1").with("b", "2");
        let merged = row.merged(Row::new().with("b", "two").with("c", "3"));

        assert_eq!(merged, Row::new().with("a", "1").with("b", "two").with("c", "3"));
        // original untouched
        assert_eq!(row.get("b").map(String::as_str), Some("2"));
    }
}
