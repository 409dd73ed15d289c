use crate::columns::{deserialize_flag, has_value};
use crate::template::Template;
use rowtask::{
    ApplyError, Error, Operation, OperationDecl, OperationFactory, Options, Result, Row, RowExt,
    RowProcessError, parse_options,
};
use serde::{Deserialize, Deserializer};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CommandConfig {
    program: String,
    #[serde(default, deserialize_with = "deserialize_args")]
    args: Vec<String>,
    output: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    reject_on_failure: bool,
}

/// Arguments as a list, or as one whitespace-separated string.
fn deserialize_args<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Joined(s) => s.split_whitespace().map(str::to_string).collect(),
    })
}

/// Run a program per row and store its standard output.
///
/// Arguments are templates filled from the row. Trailing newlines are
/// stripped from the output. A program that cannot be started is a fault.
/// A non-zero exit is a fault too, unless `reject_on_failure` is set, in
/// which case the row is rejected and retried on the next run.
#[derive(Debug, Clone)]
pub struct CommandOperation {
    program: String,
    args: Vec<Template>,
    output: String,
    reject_on_failure: bool,
}

impl CommandOperation {
    pub fn new(program: impl Into<String>, args: Vec<Template>, output: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output: output.into(),
            reject_on_failure: false,
        }
    }

    pub fn reject_on_failure(mut self, reject: bool) -> Self {
        self.reject_on_failure = reject;
        self
    }
}

impl Operation for CommandOperation {
    fn apply(&self, row: &Row) -> std::result::Result<Row, ApplyError> {
        let args = self
            .args
            .iter()
            .map(|t| t.render(row))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(program = %self.program, ?args, "running command");
        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| ApplyError::fault(format!("failed to run '{}': {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let message = format!(
                "'{}' exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            );
            return Err(if self.reject_on_failure {
                RowProcessError::rejected(message).into()
            } else {
                ApplyError::fault(message)
            });
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        Ok(Row::new().with(&self.output, stdout.trim_end_matches(['\n', '\r'])))
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        has_value(row, &self.output)
    }

    fn name(&self) -> &str {
        "command"
    }
}

pub(crate) struct CommandFactory {
    decl: OperationDecl,
}

impl CommandFactory {
    pub fn new() -> Self {
        Self {
            decl: OperationDecl::new("command")
                .description("Run a program per row and store its output")
                .required("program", "Program to run")
                .option("args", "Argument templates with {column} placeholders")
                .required("output", "Column to write the program's output to")
                .option(
                    "reject_on_failure",
                    "Reject the row on non-zero exit instead of stopping (default: false)",
                ),
        }
    }
}

impl OperationFactory for CommandFactory {
    fn decl(&self) -> &OperationDecl {
        &self.decl
    }

    fn build(&self, options: &Options) -> Result<Box<dyn Operation>> {
        let config: CommandConfig = parse_options("command", options)?;
        if config.program.trim().is_empty() {
            return Err(Error::config("command needs a program"));
        }
        let args = config
            .args
            .iter()
            .map(|a| Template::parse(a))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(
            CommandOperation::new(config.program, args, config.output)
                .reject_on_failure(config.reject_on_failure),
        ))
    }
}
