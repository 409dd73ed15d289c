//! Tasks: file-backed, crash-safe, resumable runs of one operation.
//!
//! A task is *fresh* when nothing exists at its output path and *resuming*
//! when something does. A resuming run reads the previous output as its
//! input, so rows already carrying a result are skipped and the rest retried.
//!
//! Whatever happens during a run, the output path ends up holding every input
//! row: processed rows in their augmented form, all others unchanged.

use crate::cursor::RowCursor;
use crate::engine::{EngineOptions, apply_to_each};
use crate::error::{ApplyError, Error, Result};
use crate::operation::Operation;
use crate::row::Row;
use crate::statistics::RunStatistics;
use crate::table::Table;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Input location, output location and the operation to run.
#[derive(Debug, Clone)]
pub struct Task<O> {
    input: PathBuf,
    output: PathBuf,
    operation: O,
    column_names: Option<Vec<String>>,
}

impl<O: Operation> Task<O> {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, operation: O) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            operation,
            column_names: None,
        }
    }

    /// Rename the input's columns on load.
    ///
    /// Only used for fresh runs; a previous output already has its own header.
    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    /// True if a previous run left output behind.
    pub fn is_resuming(&self) -> bool {
        self.output.exists()
    }

    /// Run the task. See [`run_with_progress`](Task::run_with_progress).
    pub fn run(&self) -> Result<RunStatistics> {
        self.run_with_progress(|_, _| {})
    }

    /// Run the task, calling `progress` after each row with the running
    /// statistics and the total row count.
    ///
    /// Failing rows are skipped and counted. Anything else stops the run:
    /// the output is saved with every row accounted for, then the failure is
    /// returned as [`Error::Aborted`]. A panic, in the operation or in
    /// `progress`, is handled the same way and then resumed. Unwinding
    /// cannot carry the statistics, so they are only reported in the
    /// `warn` event that precedes it.
    pub fn run_with_progress<F>(&self, mut progress: F) -> Result<RunStatistics>
    where
        F: FnMut(&RunStatistics, usize),
    {
        let table = self.load_input()?;
        let (rows, column_order) = table.into_parts();
        let total = rows.len();

        let mut cursor = RowCursor::new(rows);
        let mut statistics = RunStatistics::new();
        let mut emitted = Vec::with_capacity(total);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut results = apply_to_each(
                &mut cursor,
                &self.operation,
                EngineOptions::default(),
                &mut statistics,
            );
            while let Some(result) = results.next() {
                emitted.push(result?);
                progress(results.statistics(), total);
            }
            Ok::<(), ApplyError>(())
        }));

        match outcome {
            Ok(Ok(())) => {
                Table::new(emitted, column_order).save(&self.output)?;
                info!(output = %self.output.display(), %statistics, "task finished");
                Ok(statistics)
            }
            Ok(Err(source)) => {
                let row = emitted.len();
                statistics.record_failure(row, &source);
                warn!(row, error = %source, "run aborted, saving all rows");
                if let Err(e) = self.save_recovered(cursor, emitted, column_order) {
                    error!(row, error = %source, "run aborted and its output could not be saved");
                    return Err(e);
                }
                info!(output = %self.output.display(), %statistics, "task aborted");
                Err(Error::Aborted {
                    row,
                    statistics: Box::new(statistics),
                    source,
                })
            }
            Err(payload) => {
                let row = emitted.len();
                let message = panic_message(payload.as_ref());
                // a row taken but not emitted means the operation itself panicked
                if cursor.returned().len() > row {
                    statistics.record_panic(row, message.clone());
                    warn!(row, panic = %message, "operation panicked, saving all rows");
                } else {
                    warn!(row, panic = %message, "progress callback panicked, saving all rows");
                }
                if let Err(e) = self.save_recovered(cursor, emitted, column_order) {
                    error!(error = %e, "could not save output after panic");
                }
                warn!(output = %self.output.display(), %statistics, "task aborted by panic");
                panic::resume_unwind(payload)
            }
        }
    }

    fn load_input(&self) -> Result<Table> {
        if self.is_resuming() {
            info!(
                output = %self.output.display(),
                operation = self.operation.name(),
                "resuming from previous output"
            );
            Table::load(&self.output)
        } else {
            info!(
                input = %self.input.display(),
                operation = self.operation.name(),
                "starting task"
            );
            Table::load_with(&self.input, self.column_names.as_deref())
        }
    }

    fn save_recovered(
        &self,
        cursor: RowCursor,
        emitted: Vec<Row>,
        column_order: Vec<String>,
    ) -> Result<()> {
        let rows = cursor.recover(emitted);
        Table::new(rows, column_order)
            .save(&self.output)
            .inspect_err(|e| error!(output = %self.output.display(), error = %e, "recovery save failed"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowProcessError;
    use crate::operation::from_fn;
    use crate::row::RowExt;
    use crate::statistics::FailureKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_input(dir: &Path, columns: &[&str], size: usize) -> PathBuf {
        let rows = (0..size)
            .map(|i| {
                columns
                    .iter()
                    .fold(Row::new(), |row, c| row.with(*c, format!("{c}_{i}")))
            })
            .collect();
        let path = dir.join("input.csv");
        Table::new(rows, columns.iter().map(|c| c.to_string()).collect())
            .save(&path)
            .unwrap();
        path
    }

    fn concat() -> impl Operation {
        from_fn("concat", |row: &Row| {
            Ok(Row::new().with(
                "concatenated",
                format!("{}{}", row.require("patient")?, row.require("date")?),
            ))
        })
        .done_when(["concatenated"])
    }

    /// Server stand-in cycling through "one", "two", then an error.
    fn unstable_server(calls: &AtomicUsize) -> impl Operation + '_ {
        from_fn("fetch", move |row: &Row| {
            let _id = row.require("field1")?;
            match calls.fetch_add(1, Ordering::SeqCst) % 3 {
                0 => Ok(Row::new().with("server_result", "one")),
                1 => Ok(Row::new().with("server_result", "two")),
                _ => Err(ApplyError::fault("Horrible error")),
            }
        })
        .done_when(["server_result"])
    }

    #[test]
    fn test_fresh_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["patient", "date"], 3);
        let output = dir.path().join("output.csv");

        let task = Task::new(&input, &output, concat());
        assert!(!task.is_resuming());
        let stats = task.run().unwrap();

        assert_eq!(stats.completed, 3);
        let result = Table::load(&output).unwrap();
        assert_eq!(result.column_order(), ["patient", "date", "concatenated"]);
        assert_eq!(result.get(1).unwrap()["concatenated"], "patient_1date_1");
    }

    #[test]
    fn test_fault_preserves_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["field1", "field2"], 10);
        let output = dir.path().join("a_result_file.csv");
        let calls = AtomicUsize::new(0);

        let task = Task::new(&input, &output, unstable_server(&calls));
        let err = task.run().unwrap_err();

        match &err {
            Error::Aborted {
                row,
                statistics,
                source,
            } => {
                assert_eq!(*row, 2);
                assert_eq!(source.to_string(), "Horrible error");
                assert_eq!(statistics.completed, 2);
                assert_eq!(statistics.failed, 1);
                assert_eq!(statistics.errors[0].kind, FailureKind::Fault);
            }
            other => panic!("expected abort, got {other:?}"),
        }

        let saved = Table::load(&output).unwrap();
        assert_eq!(saved.len(), 10);
        assert_eq!(saved.get(0).unwrap()["server_result"], "one");
        assert_eq!(saved.get(1).unwrap()["server_result"], "two");
        assert_eq!(saved.get(2).unwrap()["server_result"], "");
        assert_eq!(saved.get(2).unwrap()["field1"], "field1_2");
        assert_eq!(saved.get(9).unwrap()["field1"], "field1_9");
    }

    #[test]
    fn test_resume_after_fault_finishes_remaining_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["field1"], 3);
        let output = dir.path().join("out.csv");
        let calls = AtomicUsize::new(0);

        let task = Task::new(&input, &output, unstable_server(&calls));
        assert!(task.run().is_err());
        assert!(task.is_resuming());

        // calls is now 3: the retry of row 2 gets "one"
        let stats = task.run().unwrap();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.completed, 1);

        let saved = Table::load(&output).unwrap();
        let results: Vec<_> = saved.iter().map(|r| r["server_result"].as_str()).collect();
        assert_eq!(results, ["one", "two", "one"]);
    }

    #[test]
    fn test_resume_convergence() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["patient", "date"], 5);
        let output = dir.path().join("out.csv");
        let task = Task::new(&input, &output, concat());

        task.run().unwrap();
        let first = std::fs::read_to_string(&output).unwrap();

        let stats = task.run().unwrap();
        let second = std::fs::read_to_string(&output).unwrap();

        assert_eq!(first, second);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.skipped, 5);
    }

    #[test]
    fn test_row_errors_do_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::write(&input, "patient,date\np1,d1\np2\np3,d3\n").unwrap();
        let output = dir.path().join("out.csv");

        let stats = Task::new(&input, &output, concat()).run().unwrap();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(
            stats.errors[0].kind,
            FailureKind::MissingField {
                column: "date".into()
            }
        );

        let saved = std::fs::read_to_string(&output).unwrap();
        assert_eq!(saved, "patient,date,concatenated\np1,d1,p1d1\np2,,\np3,d3,p3d3\n");
    }

    #[test]
    fn test_rejected_rows_are_retried_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["n"], 3);
        let output = dir.path().join("out.csv");
        let reject = AtomicUsize::new(1);

        let op = from_fn("picky", |row: &Row| {
            if reject.load(Ordering::SeqCst) == 1 && row.require("n")? == "n_1" {
                return Err(RowProcessError::rejected("not today").into());
            }
            Ok(Row::new().with("seen", "yes"))
        })
        .done_when(["seen"]);
        let task = Task::new(&input, &output, op);

        let stats = task.run().unwrap();
        assert_eq!((stats.completed, stats.failed), (2, 1));

        reject.store(0, Ordering::SeqCst);
        let stats = task.run().unwrap();
        assert_eq!((stats.completed, stats.skipped), (1, 2));
    }

    #[test]
    fn test_panic_preserves_rows_and_resumes_unwinding() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["n"], 3);
        let output = dir.path().join("out.csv");

        let op = from_fn("explosive", |row: &Row| {
            if row.require("n")? == "n_1" {
                panic!("kaboom");
            }
            Ok(Row::new().with("ok", "yes"))
        });
        let task = Task::new(&input, &output, op);

        let caught = panic::catch_unwind(AssertUnwindSafe(|| task.run()));
        assert!(caught.is_err());

        let saved = Table::load(&output).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.get(0).unwrap()["ok"], "yes");
        assert_eq!(saved.get(1).unwrap()["ok"], "");
        assert_eq!(saved.get(2).unwrap()["n"], "n_2");
    }

    #[test]
    fn test_panic_in_progress_keeps_finished_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["patient", "date"], 3);
        let output = dir.path().join("out.csv");
        let task = Task::new(&input, &output, concat());

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            task.run_with_progress(|stats, _| {
                if stats.completed == 1 {
                    panic!("display went away");
                }
            })
        }));
        assert!(caught.is_err());

        let saved = Table::load(&output).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.get(0).unwrap()["concatenated"], "patient_0date_0");
        assert_eq!(saved.get(1).unwrap()["concatenated"], "");

        // the next run picks up where the callback stopped it
        let stats = task.run().unwrap();
        assert_eq!((stats.completed, stats.skipped), (2, 1));
    }

    #[test]
    fn test_column_names_override_on_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::write(&input, "a,b\np1,d1\n").unwrap();
        let output = dir.path().join("out.csv");

        let task = Task::new(&input, &output, concat())
            .with_column_names(vec!["patient".into(), "date".into()]);
        task.run().unwrap();

        let saved = std::fs::read_to_string(&output).unwrap();
        assert_eq!(saved, "patient,date,concatenated\np1,d1,p1d1\n");
    }

    #[test]
    fn test_bad_column_names_fail_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["a", "b"], 2);
        let output = dir.path().join("out.csv");

        let err = Task::new(&input, &output, concat())
            .with_column_names(vec!["only_one".into()])
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
        assert!(!output.exists());
    }

    #[test]
    fn test_progress_called_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &["patient", "date"], 4);
        let output = dir.path().join("out.csv");

        let mut seen = Vec::new();
        Task::new(&input, &output, concat())
            .run_with_progress(|stats, total| seen.push((stats.total(), total)))
            .unwrap();
        assert_eq!(seen, [(1, 4), (2, 4), (3, 4), (4, 4)]);
    }
}
