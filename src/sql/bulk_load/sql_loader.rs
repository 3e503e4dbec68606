//! SQL*Loader control and data files.
//!
//! The files are only generated here; loading them is a separate step run where the database
//! is reachable:
//!
//! ```text
//! sqlldr <user>/<password> control=<control_file> [log=<log_file>] [bad=<bad_file>]
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use arrow::array::RecordBatch;
use datafusion::sql::TableReference;
use snafu::prelude::*;

use super::{
    column_names, write_data_file, DataFileFormat, Error, InvalidIdentifierSnafu,
    InvalidLoadModeSnafu, Result, UnableToWriteControlFileSnafu,
};
use crate::sql::arrow_sql_gen::statement::is_valid_identifier;

/// How SQL*Loader treats rows already in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    #[default]
    Append,
    Replace,
    Truncate,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Append => write!(f, "APPEND"),
            LoadMode::Replace => write!(f, "REPLACE"),
            LoadMode::Truncate => write!(f, "TRUNCATE"),
        }
    }
}

impl FromStr for LoadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPEND" => Ok(LoadMode::Append),
            "REPLACE" => Ok(LoadMode::Replace),
            "TRUNCATE" => Ok(LoadMode::Truncate),
            _ => InvalidLoadModeSnafu { mode: s }.fail(),
        }
    }
}

/// A SQL*Loader control file describing a `;`-delimited data file.
///
/// Table and column names are written unquoted, so they follow the same rules as the Oracle
/// statement builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFile {
    data_file: PathBuf,
    mode: LoadMode,
    table: TableReference,
    columns: Vec<String>,
}

impl ControlFile {
    /// # Errors
    ///
    /// Returns an error if a part of the table name or a column name is not a plain identifier.
    pub fn new(
        data_file: impl Into<PathBuf>,
        table: &TableReference,
        columns: Vec<String>,
        mode: LoadMode,
    ) -> Result<Self> {
        let table_parts = [table.catalog(), table.schema(), Some(table.table())];
        for identifier in table_parts
            .into_iter()
            .flatten()
            .chain(columns.iter().map(String::as_str))
        {
            ensure!(
                is_valid_identifier(identifier),
                InvalidIdentifierSnafu { identifier }
            );
        }

        Ok(Self {
            data_file: data_file.into(),
            mode,
            table: table.clone(),
            columns,
        })
    }
}

impl fmt::Display for ControlFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_file = self.data_file.display().to_string().replace('\'', "''");
        writeln!(f, "LOAD DATA")?;
        writeln!(f, "CHARACTERSET UTF8")?;
        writeln!(f, "INFILE '{data_file}'")?;
        writeln!(f, "{}", self.mode)?;
        write!(f, "INTO TABLE ")?;
        if let Some(catalog) = self.table.catalog() {
            write!(f, "{catalog}.")?;
        }
        if let Some(schema) = self.table.schema() {
            write!(f, "{schema}.")?;
        }
        writeln!(f, "{}", self.table.table())?;
        writeln!(f, "FIELDS TERMINATED BY ';' OPTIONALLY ENCLOSED BY '\"'")?;
        writeln!(f, "TRAILING NULLCOLS")?;
        write!(f, "({})", self.columns.join(","))
    }
}

/// Writes the data file and then the control file that loads it into `table`.
///
/// If the control file cannot be written the data file is removed again. Returns the number of
/// records in the data file.
///
/// # Errors
///
/// Returns an error if there is no record batch to take the columns from, or either file cannot
/// be written.
pub fn write_sql_loader_files(
    record_batches: &[RecordBatch],
    table: &TableReference,
    data_file: &Path,
    control_file: &Path,
    mode: LoadMode,
) -> Result<u64> {
    let columns = column_names(record_batches, table)?;
    let control = ControlFile::new(data_file, table, columns, mode)?;
    let records = write_data_file(record_batches, &DataFileFormat::sql_loader(), data_file)?;

    if let Err(source) = std::fs::write(control_file, control.to_string()) {
        if let Err(e) = std::fs::remove_file(data_file) {
            tracing::warn!(
                "Unable to remove data file '{}' after a failed control file write: {e}",
                data_file.display()
            );
        }
        return Err(source).context(UnableToWriteControlFileSnafu { path: control_file });
    }

    tracing::info!(
        "Wrote {records} records for {table} to '{}' with control file '{}'",
        data_file.display(),
        control_file.display()
    );
    Ok(records)
}
