use async_trait::async_trait;
use datafusion::{
    arrow::datatypes::{Schema, SchemaRef},
    execution::SendableRecordBatchStream,
    physical_plan::stream::RecordBatchStreamAdapter,
    sql::TableReference,
};
use oracle::{sql_type::ToSql, Connection};
use sea_query::Value;
use std::{any::Any, sync::Arc};

use async_stream::stream;
use snafu::prelude::*;
use tokio::sync::mpsc;
use tokio::task;

use crate::sql::{
    arrow_sql_gen::{
        oracle::{rows_to_arrow, schema_from_column_info},
        statement::is_null,
    },
    db_connection_pool::dbconnection::{
        AsyncDbConnection, DbConnection, Error, GenericError, Result,
    },
};

const BATCH_SIZE: usize = 4096;

type OracleParam = Box<dyn ToSql + Send>;

#[derive(Debug, Snafu)]
pub enum ParameterError {
    #[snafu(display("Unsupported parameter value: {value}"))]
    UnsupportedParameter { value: String },
}

pub struct OracleConnection {
    pub conn: Arc<Connection>,
}

impl DbConnection<Arc<Connection>, Value> for OracleConnection {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_async(&self) -> Option<&dyn AsyncDbConnection<Arc<Connection>, Value>> {
        Some(self)
    }
}

#[async_trait]
impl AsyncDbConnection<Arc<Connection>, Value> for OracleConnection {
    fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    async fn table_exists(
        &self,
        table_reference: &TableReference,
    ) -> std::result::Result<bool, Error> {
        // Unquoted identifiers are stored upper-cased in the data dictionary
        let table_name = table_reference.table().to_uppercase();
        let schema_name = table_reference.schema().map(str::to_uppercase);
        let conn = Arc::clone(&self.conn);

        let count = task::spawn_blocking(move || {
            conn.query_row_as::<i64>(
                "SELECT COUNT(*) FROM all_tables WHERE owner = NVL(:1, USER) AND table_name = :2",
                &[&schema_name, &table_name],
            )
        })
        .await
        .map_err(|e| Box::new(e) as GenericError)
        .context(super::UnableToCheckTableSnafu {
            table_name: table_reference.to_string(),
        })?
        .map_err(|e| Box::new(e) as GenericError)
        .context(super::UnableToCheckTableSnafu {
            table_name: table_reference.to_string(),
        })?;

        Ok(count > 0)
    }

    async fn query_arrow(
        &self,
        sql: &str,
        params: &[Value],
        projected_schema: Option<SchemaRef>,
    ) -> Result<SendableRecordBatchStream> {
        let sql = sql.to_string();
        let params = to_oracle_params(params)?;
        let conn = Arc::clone(&self.conn);
        let schema_clone = projected_schema.clone();

        let (tx, mut rx) = mpsc::channel(2);

        task::spawn_blocking(move || {
            let process = || -> std::result::Result<(), GenericError> {
                let param_refs = param_refs(&params);
                let mut stmt = conn
                    .statement(&sql)
                    .fetch_array_size(100_000)
                    .build()
                    .map_err(|e| Box::new(e) as GenericError)
                    .context(super::UnableToQueryArrowSnafu)?;

                let rows = stmt
                    .query(&param_refs)
                    .map_err(|e| Box::new(e) as GenericError)
                    .context(super::UnableToQueryArrowSnafu)?;
                let schema =
                    schema_clone.unwrap_or_else(|| schema_from_column_info(rows.column_info()));

                let mut chunk = Vec::with_capacity(BATCH_SIZE);
                let mut sent_any = false;
                for row_result in rows {
                    let row = row_result
                        .map_err(|e| Box::new(e) as GenericError)
                        .context(super::UnableToQueryArrowSnafu)?;

                    chunk.push(row);
                    if chunk.len() >= BATCH_SIZE {
                        let batch_res = rows_to_arrow(chunk, &schema)
                            .map_err(|e| Box::new(e) as GenericError);
                        sent_any = true;
                        if tx.blocking_send(batch_res).is_err() {
                            return Ok(());
                        }
                        chunk = Vec::with_capacity(BATCH_SIZE);
                    }
                }
                // An empty result still reports its columns
                if !chunk.is_empty() || !sent_any {
                    let batch_res =
                        rows_to_arrow(chunk, &schema).map_err(|e| Box::new(e) as GenericError);
                    let _ = tx.blocking_send(batch_res);
                }
                Ok(())
            };

            if let Err(e) = process() {
                let _ = tx.blocking_send(Err(e));
            }
        });

        let Some(first_batch_res) = rx.recv().await else {
            let empty_schema = projected_schema.unwrap_or_else(|| Arc::new(Schema::empty()));
            return Ok(Box::pin(RecordBatchStreamAdapter::new(
                empty_schema,
                futures::stream::empty(),
            )));
        };

        let first_batch = first_batch_res?;
        let schema = first_batch.schema();

        let output_stream = stream! {
            yield Ok(first_batch);
            while let Some(result) = rx.recv().await {
                 match result {
                     Ok(batch) => yield Ok(batch),
                     Err(e) => yield Err(datafusion::error::DataFusionError::External(e)),
                 }
            }
        };

        Ok(Box::pin(RecordBatchStreamAdapter::new(schema, output_stream)))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let sql = sql.to_string();
        let params = to_oracle_params(params)?;
        let conn = Arc::clone(&self.conn);

        let row_count = task::spawn_blocking(move || {
            let stmt = conn.execute(&sql, &param_refs(&params))?;
            let row_count = stmt.row_count()?;
            conn.commit()?;
            Ok::<u64, oracle::Error>(row_count)
        })
        .await
        .map_err(|e| Box::new(e) as GenericError)
        .context(super::UnableToExecuteSnafu)?
        .map_err(|e| Box::new(e) as GenericError)
        .context(super::UnableToExecuteSnafu)?;

        Ok(row_count)
    }
}

fn param_refs(params: &[OracleParam]) -> Vec<&dyn ToSql> {
    params
        .iter()
        .map(|param| param.as_ref() as &dyn ToSql)
        .collect()
}

fn to_oracle_params(params: &[Value]) -> std::result::Result<Vec<OracleParam>, ParameterError> {
    params.iter().map(to_oracle_param).collect()
}

fn to_oracle_param(value: &Value) -> std::result::Result<OracleParam, ParameterError> {
    if is_null(value) {
        return Ok(Box::new(Option::<String>::None));
    }

    let param: OracleParam = match value {
        // No boolean column type before 23ai
        Value::Bool(Some(v)) => Box::new(i64::from(*v)),
        Value::TinyInt(Some(v)) => Box::new(i64::from(*v)),
        Value::SmallInt(Some(v)) => Box::new(i64::from(*v)),
        Value::Int(Some(v)) => Box::new(i64::from(*v)),
        Value::BigInt(Some(v)) => Box::new(*v),
        Value::TinyUnsigned(Some(v)) => Box::new(i64::from(*v)),
        Value::SmallUnsigned(Some(v)) => Box::new(i64::from(*v)),
        Value::Unsigned(Some(v)) => Box::new(i64::from(*v)),
        Value::BigUnsigned(Some(v)) => Box::new(v.to_string()),
        Value::Float(Some(v)) => Box::new(f64::from(*v)),
        Value::Double(Some(v)) => Box::new(*v),
        Value::String(Some(v)) => Box::new(v.to_string()),
        Value::Char(Some(v)) => Box::new(v.to_string()),
        Value::Bytes(Some(v)) => Box::new(v.to_vec()),
        other => {
            return UnsupportedParameterSnafu {
                value: format!("{other:?}"),
            }
            .fail()
        }
    };
    Ok(param)
}
