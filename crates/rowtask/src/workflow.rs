//! Workflow files.
//!
//! A workflow describes a task declaratively:
//! - input: the table to read on a fresh run
//! - output: where results go (and where a resumed run reads from)
//! - steps: operations to apply, chained in order
//!
//! Files may be YAML, TOML or JSON; the format is picked by extension.

use crate::error::Result;
use crate::operation::Operation;
use crate::registry::{Options, Registry};
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// A workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Input table path.
    #[serde(default)]
    pub input: Option<String>,

    /// Output table path.
    #[serde(default)]
    pub output: Option<String>,

    /// Column names to use instead of the input's header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_names: Option<Vec<String>>,

    /// Operations to apply, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A step in the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Operation id to use.
    pub operation: String,

    /// Options for this operation.
    #[serde(default)]
    pub options: Options,

    /// Optional label for this step, used in logs and error messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Step {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            options: Options::new(),
            id: None,
        }
    }

    /// The step's `id`, or its operation id when it has none.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.operation)
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, path: impl Into<String>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<String>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }

    /// Add a step with no options.
    pub fn step(self, operation: impl Into<String>) -> Self {
        self.add_step(Step::new(operation))
    }

    pub fn add_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Check if this workflow has input, output and at least one step.
    pub fn is_complete(&self) -> bool {
        self.input.is_some() && self.output.is_some() && !self.steps.is_empty()
    }

    /// Build the task this workflow describes.
    pub fn into_task(self, registry: &Registry) -> Result<Task<Box<dyn Operation>>> {
        let (Some(input), Some(output)) = (self.input, self.output) else {
            return Err(WorkflowError::Incomplete("input and output are required".into()).into());
        };
        if self.steps.is_empty() {
            return Err(WorkflowError::Incomplete("no steps".into()).into());
        }

        let operation = registry.build_chain(&self.steps)?;
        let task = Task::new(input, output, operation);
        Ok(match self.column_names {
            Some(names) => task.with_column_names(names),
            None => task,
        })
    }

    /// Parse workflow from bytes, detecting the format from `path`.
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> std::result::Result<Self, WorkflowError> {
        let format = path.and_then(detect_format).unwrap_or("yaml");
        Self::from_bytes_format(data, format)
    }

    /// Parse workflow from bytes with explicit format.
    pub fn from_bytes_format(data: &[u8], format: &str) -> std::result::Result<Self, WorkflowError> {
        match format {
            "json" => serde_json::from_slice(data).map_err(|e| WorkflowError::Parse(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_slice(data).map_err(|e| WorkflowError::Parse(e.to_string()))
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| WorkflowError::Parse(format!("invalid UTF-8: {e}")))?;
                toml::from_str(s).map_err(|e| WorkflowError::Parse(e.to_string()))
            }
            _ => Err(WorkflowError::Parse(format!(
                "unsupported workflow format: {format}"
            ))),
        }
    }

    /// Serialize workflow to bytes.
    pub fn to_bytes(&self, format: &str) -> std::result::Result<Vec<u8>, WorkflowError> {
        match format {
            "json" => {
                serde_json::to_vec_pretty(self).map_err(|e| WorkflowError::Parse(e.to_string()))
            }
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| WorkflowError::Parse(e.to_string())),
            "toml" => toml::to_string_pretty(self)
                .map(String::into_bytes)
                .map_err(|e| WorkflowError::Parse(e.to_string())),
            _ => Err(WorkflowError::Parse(format!(
                "unsupported workflow format: {format}"
            ))),
        }
    }
}

/// Errors related to workflow files.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("failed to parse workflow: {0}")]
    Parse(String),

    #[error("incomplete workflow: {0}")]
    Incomplete(String),
}

/// Workflow format from a file extension.
pub fn detect_format(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    match ext.to_lowercase().as_str() {
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        _ => None,
    }
}
