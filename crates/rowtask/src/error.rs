//! Error taxonomy.
//!
//! Row-level failures ([`RowProcessError`]) are recoverable by emitting the
//! row unchanged. Everything else is fatal for a run.

use crate::statistics::RunStatistics;
use crate::workflow::WorkflowError;

/// A row cannot be processed by this operation right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowProcessError {
    /// The operation read a field the row does not have.
    #[error("missing column '{column}'")]
    MissingField { column: String },

    /// The operation looked at the row and declined it.
    #[error("{0}")]
    Rejected(String),
}

impl RowProcessError {
    pub fn missing(column: impl Into<String>) -> Self {
        RowProcessError::MissingField {
            column: column.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        RowProcessError::Rejected(reason.into())
    }
}

/// What [`Operation::apply`](crate::Operation::apply) can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Row-level failure, skippable.
    #[error(transparent)]
    Row(#[from] RowProcessError),

    /// A field lookup failed. `apply_safe` reports this as `MissingField`.
    #[error("no value for column '{0}'")]
    Lookup(String),

    /// The operation itself is broken. Never absorbed by the engine.
    #[error(transparent)]
    Fault(Box<dyn std::error::Error + Send + Sync>),
}

impl ApplyError {
    /// Wrap any error (or message) as a non-recoverable fault.
    pub fn fault(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ApplyError::Fault(err.into())
    }

    /// Shorthand for a rejected row.
    pub fn rejected(reason: impl Into<String>) -> Self {
        ApplyError::Row(RowProcessError::rejected(reason))
    }

    /// True for failures the engine may absorb when skipping failing rows.
    pub fn is_row_level(&self) -> bool {
        matches!(self, ApplyError::Row(_) | ApplyError::Lookup(_))
    }
}

/// Errors surfaced by loading, saving and running tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied configuration is invalid. Raised before any row is touched.
    #[error("configuration error: {0}")]
    Config(String),

    /// The table source is structurally unreadable.
    #[error("format error: {0}")]
    Format(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A run stopped at `row`. Output has been saved; `statistics` is final.
    #[error("run aborted at row {row}: {source}")]
    Aborted {
        row: usize,
        statistics: Box<RunStatistics>,
        #[source]
        source: ApplyError,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Statistics of an aborted run, if this is one.
    pub fn statistics(&self) -> Option<&RunStatistics> {
        match self {
            Error::Aborted { statistics, .. } => Some(statistics),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
