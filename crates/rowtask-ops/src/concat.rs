use crate::columns::{ColumnList, has_value};
use rowtask::{
    ApplyError, Error, Operation, OperationDecl, OperationFactory, Options, Result, Row, RowExt,
    parse_options,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ConcatConfig {
    columns: ColumnList,
    #[serde(default = "default_output")]
    output: String,
    #[serde(default)]
    separator: String,
}

fn default_output() -> String {
    "concatenated".into()
}

/// Join the values of several columns into one.
#[derive(Debug, Clone)]
pub struct ConcatOperation {
    columns: Vec<String>,
    output: String,
    separator: String,
}

impl ConcatOperation {
    pub fn new(columns: Vec<String>, output: impl Into<String>) -> Self {
        Self {
            columns,
            output: output.into(),
            separator: String::new(),
        }
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Operation for ConcatOperation {
    fn apply(&self, row: &Row) -> std::result::Result<Row, ApplyError> {
        let values = self
            .columns
            .iter()
            .map(|c| row.require(c))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Row::new().with(&self.output, values.join(self.separator.as_str())))
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        has_value(row, &self.output)
    }

    fn name(&self) -> &str {
        "concat"
    }
}

pub(crate) struct ConcatFactory {
    decl: OperationDecl,
}

impl ConcatFactory {
    pub fn new() -> Self {
        Self {
            decl: OperationDecl::new("concat")
                .description("Join the values of several columns into one column")
                .required("columns", "Columns to join, as a list or comma-separated")
                .option("output", "Column to write (default: concatenated)")
                .option("separator", "Text between values (default: none)"),
        }
    }
}

impl OperationFactory for ConcatFactory {
    fn decl(&self) -> &OperationDecl {
        &self.decl
    }

    fn build(&self, options: &Options) -> Result<Box<dyn Operation>> {
        let config: ConcatConfig = parse_options("concat", options)?;
        if config.columns.0.is_empty() {
            return Err(Error::config("concat needs at least one column"));
        }
        Ok(Box::new(
            ConcatOperation::new(config.columns.0, config.output).separator(config.separator),
        ))
    }
}
