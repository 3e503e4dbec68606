//! `MySQL` `LOAD DATA LOCAL INFILE` support.

use std::{io::BufWriter, path::Path};

use arrow::array::RecordBatch;
use datafusion::sql::TableReference;
use snafu::prelude::*;
use tempfile::NamedTempFile;

use super::{write_records, DataFileFormat, Result, UnableToCreateTempFileSnafu};

/// The statement that loads the data file at `path` into `table`.
#[must_use]
pub fn load_data_statement(path: &Path, table: &TableReference) -> String {
    let path = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!(
        "LOAD DATA LOCAL INFILE '{path}' INTO TABLE {} FIELDS TERMINATED BY ';' ENCLOSED BY '\"'",
        quote_table(table)
    )
}

fn quote_table(table: &TableReference) -> String {
    [table.schema(), Some(table.table())]
        .into_iter()
        .flatten()
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

/// A data file waiting to be loaded. The file is deleted when this value is dropped.
pub struct LoadDataFile {
    file: NamedTempFile,
    records: u64,
}

impl LoadDataFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// The `LOAD DATA LOCAL INFILE` statement for this file.
    #[must_use]
    pub fn statement(&self, table: &TableReference) -> String {
        load_data_statement(self.path(), table)
    }
}

/// Writes `record_batches` to a new temporary data file in the `LOAD DATA` layout.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn write_load_data_file(record_batches: &[RecordBatch]) -> Result<LoadDataFile> {
    let mut file = tempfile::Builder::new()
        .prefix("load-data-")
        .suffix(".csv")
        .tempfile()
        .context(UnableToCreateTempFileSnafu)?;
    let path = file.path().to_path_buf();
    let records = {
        let mut writer = BufWriter::new(file.as_file_mut());
        write_records(record_batches, &DataFileFormat::load_data(), &mut writer, &path)?
    };

    tracing::debug!("Wrote {records} records to '{}'", path.display());
    Ok(LoadDataFile { file, records })
}
