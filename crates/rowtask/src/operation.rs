//! Operations and their declarations.

use crate::error::{ApplyError, RowProcessError};
use crate::row::{Row, RowExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Trait for implementing row operations.
///
/// An operation reads a row and returns the fields it adds or overwrites.
/// It never removes fields: the engine merges the returned delta into a new
/// row, so a half-processed row still reads as a valid partial result.
pub trait Operation: Send + Sync {
    /// Compute new or overwritten fields for `row`.
    ///
    /// Read fields with [`RowExt::require`]; a missing field then surfaces
    /// as a `MissingField` row error instead of a fault. An empty delta is
    /// a valid no-op.
    fn apply(&self, row: &Row) -> Result<Row, ApplyError>;

    /// True if `row` already carries the output this operation would produce.
    fn has_previous_result(&self, row: &Row) -> bool {
        let _ = row;
        false
    }

    /// Short name used in logs.
    fn name(&self) -> &str {
        "operation"
    }
}

/// Engine-facing wrapper around [`Operation::apply`].
///
/// Blanket-implemented, so operations cannot override it.
pub trait OperationExt: Operation {
    /// Apply, reporting any failed field lookup as [`RowProcessError::MissingField`].
    fn apply_safe(&self, row: &Row) -> Result<Row, ApplyError> {
        match self.apply(row) {
            Err(ApplyError::Lookup(column)) => {
                Err(ApplyError::Row(RowProcessError::MissingField { column }))
            }
            other => other,
        }
    }
}

impl<T: Operation + ?Sized> OperationExt for T {}

impl<T: Operation + ?Sized> Operation for &T {
    fn apply(&self, row: &Row) -> Result<Row, ApplyError> {
        (**self).apply(row)
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        (**self).has_previous_result(row)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Operation + ?Sized> Operation for Box<T> {
    fn apply(&self, row: &Row) -> Result<Row, ApplyError> {
        (**self).apply(row)
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        (**self).has_previous_result(row)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Operation + ?Sized> Operation for Arc<T> {
    fn apply(&self, row: &Row) -> Result<Row, ApplyError> {
        (**self).apply(row)
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        (**self).has_previous_result(row)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The base operation: adds nothing, never considers a row done.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Operation for Noop {
    fn apply(&self, _row: &Row) -> Result<Row, ApplyError> {
        Ok(Row::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// An operation backed by a closure. See [`from_fn`].
pub struct FnOperation<F> {
    name: String,
    apply: F,
    done_when: Option<Vec<String>>,
}

/// Build an operation from a closure.
pub fn from_fn<F>(name: impl Into<String>, apply: F) -> FnOperation<F>
where
    F: Fn(&Row) -> Result<Row, ApplyError> + Send + Sync,
{
    FnOperation {
        name: name.into(),
        apply,
        done_when: None,
    }
}

impl<F> FnOperation<F> {
    /// Treat a row as done when all of `columns` are present and non-empty.
    pub fn done_when<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.done_when = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&Row) -> Result<Row, ApplyError> + Send + Sync,
{
    fn apply(&self, row: &Row) -> Result<Row, ApplyError> {
        (self.apply)(row)
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        self.done_when.as_ref().is_some_and(|columns| {
            columns
                .iter()
                .all(|c| row.get(c).is_some_and(|v| !v.is_empty()))
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Several operations applied in sequence.
///
/// Each step sees the row as merged so far. The chain is done for a row only
/// when every step is; steps already done are not re-run.
pub struct Chain {
    name: String,
    steps: Vec<Box<dyn Operation>>,
}

impl Chain {
    pub fn new(steps: Vec<Box<dyn Operation>>) -> Self {
        let name = steps
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { name, steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Operation for Chain {
    fn apply(&self, row: &Row) -> Result<Row, ApplyError> {
        let mut current = row.clone();
        let mut delta = Row::new();
        for step in &self.steps {
            if step.has_previous_result(&current) {
                continue;
            }
            let out = step.apply_safe(&current)?;
            current = current.merged(out.clone());
            delta.extend(out);
        }
        Ok(delta)
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.has_previous_result(row))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Declaration of one option an operation kind accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Declaration of an operation kind.
///
/// Describes how to configure an operation, without the operation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDecl {
    /// Unique identifier, used in workflow files and on the command line.
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub options: IndexMap<String, OptionDecl>,
}

impl OperationDecl {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            options: IndexMap::new(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Add an optional option.
    pub fn option(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.options.insert(
            name.into(),
            OptionDecl {
                description: description.into(),
                required: false,
            },
        );
        self
    }

    /// Add a required option.
    pub fn required(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.options.insert(
            name.into(),
            OptionDecl {
                description: description.into(),
                required: true,
            },
        );
        self
    }

    pub fn required_options(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|(_, o)| o.required)
            .map(|(name, _)| name.as_str())
    }
}
