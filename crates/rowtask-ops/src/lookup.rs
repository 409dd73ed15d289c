use crate::columns::has_value;
use rowtask::{
    ApplyError, Error, Operation, OperationDecl, OperationFactory, Options, Result, Row,
    RowExt, RowProcessError, Table, parse_options,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct LookupConfig {
    table: PathBuf,
    key: String,
    #[serde(default)]
    key_column: Option<String>,
    value_column: String,
    #[serde(default)]
    output: Option<String>,
}

/// Map a column's value through a second table.
///
/// The table is read once, when the operation is built. A row whose key has
/// no entry is rejected, so a later run can retry it against an updated table.
#[derive(Debug, Clone)]
pub struct LookupOperation {
    key: String,
    output: String,
    entries: HashMap<String, String>,
}

impl LookupOperation {
    /// Build from an in-memory table.
    pub fn from_table(
        table: &Table,
        key: impl Into<String>,
        key_column: &str,
        value_column: &str,
        output: impl Into<String>,
    ) -> Result<Self> {
        let fieldnames = table.fieldnames();
        for column in [key_column, value_column] {
            if !fieldnames.iter().any(|f| f == column) {
                return Err(Error::config(format!(
                    "lookup table has no column '{column}' (columns: {})",
                    fieldnames.join(", ")
                )));
            }
        }

        let mut entries = HashMap::with_capacity(table.len());
        for row in table.iter() {
            let (Some(k), Some(v)) = (row.get(key_column), row.get(value_column)) else {
                continue;
            };
            if entries.contains_key(k) {
                warn!(key = %k, "duplicate lookup key, keeping the first entry");
                continue;
            }
            entries.insert(k.clone(), v.clone());
        }
        debug!(entries = entries.len(), "lookup table ready");

        Ok(Self {
            key: key.into(),
            output: output.into(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Operation for LookupOperation {
    fn apply(&self, row: &Row) -> std::result::Result<Row, ApplyError> {
        let key = row.require(&self.key)?;
        match self.entries.get(key) {
            Some(value) => Ok(Row::new().with(&self.output, value)),
            None => Err(RowProcessError::rejected(format!("no lookup entry for '{key}'")).into()),
        }
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        has_value(row, &self.output)
    }

    fn name(&self) -> &str {
        "lookup"
    }
}

pub(crate) struct LookupFactory {
    decl: OperationDecl,
}

impl LookupFactory {
    pub fn new() -> Self {
        Self {
            decl: OperationDecl::new("lookup")
                .description("Map a column's value through a second CSV table")
                .required("table", "Path of the lookup table (CSV with header)")
                .required("key", "Column of the row holding the key")
                .option("key_column", "Column of the lookup table to match (default: key)")
                .required("value_column", "Column of the lookup table to copy")
                .option("output", "Column to write (default: value_column)"),
        }
    }
}

impl OperationFactory for LookupFactory {
    fn decl(&self) -> &OperationDecl {
        &self.decl
    }

    fn build(&self, options: &Options) -> Result<Box<dyn Operation>> {
        let config: LookupConfig = parse_options("lookup", options)?;
        let table = Table::load(&config.table)?;
        let key_column = config.key_column.as_deref().unwrap_or(&config.key);
        let output = config.output.as_deref().unwrap_or(&config.value_column);

        let op = LookupOperation::from_table(
            &table,
            &config.key,
            key_column,
            &config.value_column,
            output,
        )?;
        Ok(Box::new(op))
    }
}
