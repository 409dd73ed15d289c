//! Rowtask: resumable, crash-safe row transformation for tabular text
//!
//! An [`Operation`] adds fields to one row at a time. The engine
//! ([`apply_to_each`]) drives it over a table, skipping rows that already
//! carry a result and rows that cannot be processed. A [`Task`] ties this to
//! files: it reads an input table, writes an output table, and keeps every
//! row in the output even when a run stops part way. Running a task again
//! resumes from its own output.

mod cursor;
mod engine;
mod error;
mod io;
mod operation;
mod registry;
mod row;
mod statistics;
mod table;
mod task;
mod workflow;

pub use cursor::RowCursor;
pub use engine::{ApplyToEach, EngineOptions, apply_to_each, process, process_with};
pub use error::{ApplyError, Error, Result, RowProcessError};
pub use operation::{
    Chain, FnOperation, Noop, Operation, OperationDecl, OperationExt, OptionDecl, from_fn,
};
pub use registry::{OperationFactory, Options, Registry, parse_options};
pub use row::{Row, RowExt};
pub use statistics::{FailureKind, RowFailure, RunStatistics};
pub use table::Table;
pub use task::Task;
pub use workflow::{Step, Workflow, WorkflowError, detect_format};
