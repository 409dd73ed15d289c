//! Reading and writing tables as comma-separated text.
//!
//! - The first record is the header; names must be unique.
//! - Values are text. Nothing is trimmed or parsed, so leading zeros survive.
//! - Records shorter than the header give sparse rows (trailing fields absent).
//! - Saving writes a sibling `.partial` file and renames it over the target.

use crate::error::{Error, Result};
use crate::row::Row;
use crate::table::Table;
use indexmap::IndexSet;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

impl Table {
    /// Load a table from a CSV file, using its header for column names.
    pub fn load(path: impl AsRef<Path>) -> Result<Table> {
        Self::load_with(path, None)
    }

    /// Load a table from a CSV file, optionally renaming its columns.
    ///
    /// `column_names` must have exactly as many entries as the file has
    /// columns; anything else is refused rather than guessed at.
    pub fn load_with(path: impl AsRef<Path>, column_names: Option<&[String]>) -> Result<Table> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        let table = read_table(file, column_names, &path.display().to_string())?;
        debug!(path = %path.display(), rows = table.len(), "loaded table");
        Ok(table)
    }

    /// Load a table from any reader.
    pub fn from_reader<R: Read>(reader: R, column_names: Option<&[String]>) -> Result<Table> {
        read_table(reader, column_names, "input")
    }

    /// Write header and rows to `writer`. Absent fields are written empty.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let fieldnames = self.fieldnames();
        let mut writer = csv::WriterBuilder::new().from_writer(writer);

        writer.write_record(&fieldnames)?;
        for row in self.iter() {
            writer.write_record(
                fieldnames
                    .iter()
                    .map(|name| row.get(name).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer
            .flush()
            .map_err(|e| Error::io("flushing table output", e))?;
        Ok(())
    }

    /// Save to `path` atomically.
    ///
    /// The `.partial` file is removed again if anything fails, so the
    /// previous contents of `path` are the only thing left behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let temp_path = partial_path(path);

        let written = self.write_file(&temp_path).and_then(|()| {
            fs::rename(&temp_path, path)
                .map_err(|e| Error::io(format!("renaming onto {}", path.display()), e))
        });
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(path = %temp_path.display(), error = %cleanup, "could not remove partial file");
            }
            return Err(e);
        }

        debug!(path = %path.display(), rows = self.len(), "saved table");
        Ok(())
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| Error::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer
            .into_inner()
            .map_err(|e| Error::io(format!("writing {}", path.display()), e.into_error()))?
            .sync_all()
            .map_err(|e| Error::io(format!("syncing {}", path.display()), e))
    }
}

/// `out.csv` → `out.csv.partial`, next to the target so rename stays on one filesystem.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn read_table<R: Read>(reader: R, column_names: Option<&[String]>, source: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = reader.headers()?.clone();
    if header.is_empty() || (header.len() == 1 && header.get(0) == Some("")) {
        return Err(Error::Format(format!("no header found in {source}")));
    }

    let mut seen = IndexSet::new();
    for name in header.iter() {
        if !seen.insert(name) {
            return Err(Error::Format(format!(
                "duplicate column '{name}' in header of {source}"
            )));
        }
    }

    let columns: Vec<String> = match column_names {
        Some(names) if names.len() != header.len() => {
            return Err(Error::config(format!(
                "{} column name(s) given ({}), but {} columns found in {source}. \
                 Cannot tell which column is which",
                names.len(),
                names.join(", "),
                header.len()
            )));
        }
        Some(names) => {
            let mut seen = IndexSet::new();
            for name in names {
                if !seen.insert(name.as_str()) {
                    return Err(Error::config(format!(
                        "column name '{name}' given more than once for {source}"
                    )));
                }
            }
            names.to_vec()
        }
        None => header.iter().map(str::to_string).collect(),
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > columns.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(Error::Format(format!(
                "line {line} of {source} has {} fields, header has {}",
                record.len(),
                columns.len()
            )));
        }
        let row: Row = columns
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(Table::new(rows, columns))
}
