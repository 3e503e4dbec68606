use crate::sql::arrow_sql_gen::arrow::map_data_type_to_array_builder;
use arrow::{
    array::{
        ArrayBuilder, ArrayRef, BinaryBuilder, Float32Builder, Float64Builder, Int64Builder,
        LargeStringBuilder, StringBuilder,
    },
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use oracle::{sql_type::OracleType, ColumnInfo, Row};
use snafu::{ResultExt, Snafu};
use std::sync::Arc;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to build record batch: {source}"))]
    FailedToBuildRecordBatch { source: ArrowError },

    #[snafu(display("No builder found for data type {data_type}"))]
    NoBuilderForDataType { data_type: DataType },

    #[snafu(display("Failed to downcast builder for index {index}"))]
    FailedToDowncastBuilder { index: usize },

    #[snafu(display("Oracle error: {source}"))]
    OracleError { source: oracle::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Derives the Arrow schema of a result set from its column metadata.
#[must_use]
pub fn schema_from_column_info(column_info: &[ColumnInfo]) -> SchemaRef {
    let fields: Vec<Field> = column_info
        .iter()
        .map(|column| {
            Field::new(
                column.name(),
                map_oracle_type_to_arrow(column.oracle_type()),
                column.nullable(),
            )
        })
        .collect();
    Arc::new(Schema::new(fields))
}

#[must_use]
pub fn map_oracle_type_to_arrow(oracle_type: &OracleType) -> DataType {
    match oracle_type {
        // Integer columns that fit in an i64
        OracleType::Number(precision, 0) if (1..=18).contains(precision) => DataType::Int64,
        OracleType::Int64 => DataType::Int64,
        OracleType::Number(_, _) | OracleType::Float(_) | OracleType::BinaryDouble => {
            DataType::Float64
        }
        OracleType::BinaryFloat => DataType::Float32,
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => DataType::Binary,
        OracleType::CLOB | OracleType::NCLOB | OracleType::Long => DataType::LargeUtf8,
        _ => DataType::Utf8,
    }
}

/// Converts Oracle rows to a `RecordBatch` with the given schema.
///
/// # Errors
///
/// Returns an error if a value cannot be read as its column's Arrow type.
pub fn rows_to_arrow(rows: Vec<Row>, schema: &SchemaRef) -> Result<RecordBatch> {
    let mut builders: Vec<Box<dyn ArrayBuilder>> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let Some(builder) = map_data_type_to_array_builder(field.data_type()) else {
            return NoBuilderForDataTypeSnafu {
                data_type: field.data_type().clone(),
            }
            .fail();
        };
        builders.push(builder);
    }

    for row in rows {
        for (i, (builder, field)) in builders.iter_mut().zip(schema.fields()).enumerate() {
            match field.data_type() {
                DataType::Int64 => {
                    let builder = builder
                        .as_any_mut()
                        .downcast_mut::<Int64Builder>()
                        .ok_or(Error::FailedToDowncastBuilder { index: i })?;
                    let val: Option<i64> = row.get(i).context(OracleSnafu)?;
                    builder.append_option(val);
                }
                DataType::Float64 => {
                    let builder = builder
                        .as_any_mut()
                        .downcast_mut::<Float64Builder>()
                        .ok_or(Error::FailedToDowncastBuilder { index: i })?;
                    let val: Option<f64> = row.get(i).context(OracleSnafu)?;
                    builder.append_option(val);
                }
                DataType::Float32 => {
                    let builder = builder
                        .as_any_mut()
                        .downcast_mut::<Float32Builder>()
                        .ok_or(Error::FailedToDowncastBuilder { index: i })?;
                    let val: Option<f32> = row.get(i).context(OracleSnafu)?;
                    builder.append_option(val);
                }
                DataType::Binary => {
                    let builder = builder
                        .as_any_mut()
                        .downcast_mut::<BinaryBuilder>()
                        .ok_or(Error::FailedToDowncastBuilder { index: i })?;
                    let val: Option<Vec<u8>> = row.get(i).context(OracleSnafu)?;
                    builder.append_option(val);
                }
                DataType::LargeUtf8 => {
                    let builder = builder
                        .as_any_mut()
                        .downcast_mut::<LargeStringBuilder>()
                        .ok_or(Error::FailedToDowncastBuilder { index: i })?;
                    let val: Option<String> = row.get(i).context(OracleSnafu)?;
                    builder.append_option(val);
                }
                _ => {
                    let builder = builder
                        .as_any_mut()
                        .downcast_mut::<StringBuilder>()
                        .ok_or(Error::FailedToDowncastBuilder { index: i })?;
                    let val: Option<String> = row.get(i).context(OracleSnafu)?;
                    builder.append_option(val);
                }
            }
        }
    }

    let arrays: Vec<ArrayRef> = builders.into_iter().map(|mut b| b.finish()).collect();

    RecordBatch::try_new(Arc::clone(schema), arrays).context(FailedToBuildRecordBatchSnafu)
}
