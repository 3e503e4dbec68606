//! Flat files for the databases' native bulk loaders.
//!
//! Both loaders read the same delimited layout: UTF-8, fields separated by `;`, one record per
//! line, no header, text enclosed in `"` with embedded quotes doubled. They differ in how nulls
//! are spelled and in when a field is enclosed, see [`DataFileFormat`].

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use arrow::{
    array::{Array, RecordBatch},
    error::ArrowError,
    util::display::array_value_to_string,
};
use datafusion::sql::TableReference;
use snafu::prelude::*;

pub mod load_data;
pub mod sql_loader;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to write data file '{}': {source}", path.display()))]
    UnableToWriteDataFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to write control file '{}': {source}", path.display()))]
    UnableToWriteControlFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to create a temporary data file: {source}"))]
    UnableToCreateTempFile { source: std::io::Error },

    #[snafu(display("Unable to format a value of column '{column}': {source}"))]
    UnableToFormatValue { column: String, source: ArrowError },

    #[snafu(display("No record batches to take the columns of '{table}' from"))]
    NoRecordBatches { table: String },

    #[snafu(display("Invalid load mode '{mode}': expected APPEND, REPLACE or TRUNCATE"))]
    InvalidLoadMode { mode: String },

    #[snafu(display("Invalid identifier '{identifier}' for a SQL*Loader control file"))]
    InvalidIdentifier { identifier: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// When a field is wrapped in the enclosure character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    /// Every non-null, non-numeric field.
    NonNumeric,
    /// Only text that contains the delimiter, the enclosure or a line break, or that would
    /// otherwise read back as null.
    Necessary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileFormat {
    pub delimiter: char,
    pub enclosure: char,
    pub quoting: Quoting,
    /// Written, unenclosed, for null values.
    pub null_marker: String,
    /// Double backslashes in text, for loaders that treat `\` as an escape character.
    pub escape_backslash: bool,
}

impl DataFileFormat {
    /// Layout read by SQL*Loader with `FIELDS TERMINATED BY ';' OPTIONALLY ENCLOSED BY '"'`.
    #[must_use]
    pub fn sql_loader() -> Self {
        Self {
            delimiter: ';',
            enclosure: '"',
            quoting: Quoting::NonNumeric,
            null_marker: String::new(),
            escape_backslash: false,
        }
    }

    /// Layout read by `LOAD DATA ... FIELDS TERMINATED BY ';' ENCLOSED BY '"'`.
    #[must_use]
    pub fn load_data() -> Self {
        Self {
            delimiter: ';',
            enclosure: '"',
            quoting: Quoting::Necessary,
            null_marker: "\\N".to_string(),
            escape_backslash: true,
        }
    }

    fn write_text(&self, text: &str, out: &mut String) {
        let escaped;
        let text = if self.escape_backslash && text.contains('\\') {
            escaped = text.replace('\\', "\\\\");
            escaped.as_str()
        } else {
            text
        };

        let enclose = match self.quoting {
            Quoting::NonNumeric => true,
            Quoting::Necessary => {
                text.contains([self.delimiter, self.enclosure, '\n', '\r'])
                    || text == self.null_marker
                    // an unenclosed NULL word is read as SQL NULL
                    || text.eq_ignore_ascii_case("NULL")
            }
        };
        if !enclose {
            out.push_str(text);
            return;
        }

        out.push(self.enclosure);
        for c in text.chars() {
            if c == self.enclosure {
                out.push(c);
            }
            out.push(c);
        }
        out.push(self.enclosure);
    }

    /// Renders one record of a batch, without the line terminator.
    fn write_record(&self, record_batch: &RecordBatch, row: usize, out: &mut String) -> Result<()> {
        let schema = record_batch.schema();
        for (i, (field, column)) in schema.fields().iter().zip(record_batch.columns()).enumerate() {
            if i > 0 {
                out.push(self.delimiter);
            }
            if column.is_null(row) {
                out.push_str(&self.null_marker);
                continue;
            }

            let value = array_value_to_string(column.as_ref(), row).context(
                UnableToFormatValueSnafu {
                    column: field.name().clone(),
                },
            )?;
            if field.data_type().is_numeric() {
                out.push_str(&value);
            } else {
                self.write_text(&value, out);
            }
        }
        Ok(())
    }
}

/// Writes every row of `record_batches` to `writer` and returns the number of records written.
///
/// # Errors
///
/// Returns an error if a value cannot be formatted or the writer fails.
pub fn write_records<W: Write>(
    record_batches: &[RecordBatch],
    format: &DataFileFormat,
    writer: &mut W,
    path: &Path,
) -> Result<u64> {
    let mut records = 0;
    let mut line = String::new();
    for record_batch in record_batches {
        for row in 0..record_batch.num_rows() {
            line.clear();
            format.write_record(record_batch, row, &mut line)?;
            line.push('\n');
            writer
                .write_all(line.as_bytes())
                .context(UnableToWriteDataFileSnafu { path })?;
            records += 1;
        }
    }
    writer.flush().context(UnableToWriteDataFileSnafu { path })?;
    Ok(records)
}

/// Creates (or truncates) the file at `path` and writes the records to it.
///
/// # Errors
///
/// Returns an error if the file cannot be written or a value cannot be formatted.
pub fn write_data_file(
    record_batches: &[RecordBatch],
    format: &DataFileFormat,
    path: &Path,
) -> Result<u64> {
    let file = File::create(path).context(UnableToWriteDataFileSnafu { path })?;
    let mut writer = BufWriter::new(file);
    write_records(record_batches, format, &mut writer, path)
}

/// Column names of the dataset, taken from the first batch.
pub(crate) fn column_names(
    record_batches: &[RecordBatch],
    table: &TableReference,
) -> Result<Vec<String>> {
    let Some(first) = record_batches.first() else {
        return NoRecordBatchesSnafu {
            table: table.to_string(),
        }
        .fail();
    };
    Ok(first
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect())
}
