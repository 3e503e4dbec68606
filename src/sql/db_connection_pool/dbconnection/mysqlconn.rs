use std::{any::Any, future::Future, path::Path, sync::Arc};

use crate::sql::arrow_sql_gen::{self, mysql::rows_to_arrow, statement::is_null};
use arrow::datatypes::{Schema, SchemaRef};
use async_stream::stream;
use bytes::Bytes;
use datafusion::error::DataFusionError;
use datafusion::execution::SendableRecordBatchStream;
use datafusion::physical_plan::stream::RecordBatchStreamAdapter;
use datafusion::sql::TableReference;
use futures::lock::Mutex;
use futures::stream::BoxStream;
use futures::{stream, StreamExt};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row, Value as MySQLValue};
use sea_query::Value;
use snafu::prelude::*;

use super::Result;
use super::{AsyncDbConnection, DbConnection};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{source}"))]
    QueryError { source: mysql_async::Error },

    #[snafu(display("Failed to convert query result to Arrow: {source}"))]
    ConversionError { source: arrow_sql_gen::mysql::Error },

    #[snafu(display("Unable to get MySQL query result stream"))]
    QueryResultStreamError {},

    #[snafu(display("Unsupported parameter value: {value}"))]
    UnsupportedParameter { value: String },

    #[snafu(display("Unable to read data file '{}': {source}", path.display()))]
    UnableToReadDataFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

pub struct MySQLConnection {
    pub conn: Arc<Mutex<Conn>>,
}

impl DbConnection<Conn, Value> for MySQLConnection {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_async(&self) -> Option<&dyn AsyncDbConnection<Conn, Value>> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl AsyncDbConnection<Conn, Value> for MySQLConnection {
    fn new(conn: Conn) -> Self {
        MySQLConnection {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn table_exists(&self, table_reference: &TableReference) -> Result<bool, super::Error> {
        let mut conn = self.conn.lock().await;
        let conn = &mut *conn;

        // An unqualified table lives in the database the connection was opened on
        let count: Option<i64> = conn
            .exec_first(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?",
                (
                    table_reference.schema().map(str::to_string),
                    table_reference.table().to_string(),
                ),
            )
            .await
            .boxed()
            .context(super::UnableToCheckTableSnafu {
                table_name: table_reference.to_string(),
            })?;

        Ok(count.unwrap_or(0) > 0)
    }

    async fn query_arrow(
        &self,
        sql: &str,
        params: &[Value],
        projected_schema: Option<SchemaRef>,
    ) -> Result<SendableRecordBatchStream> {
        let params = to_mysql_params(params)?;
        let sql = sql.to_string();
        let conn = Arc::clone(&self.conn);

        let mut stream = Box::pin(stream! {
            let mut conn = conn.lock().await;
            let mut exec_iter = conn
                .exec_iter(sql, params)
                .await
                .context(QuerySnafu)?;

            let Some(stream) = exec_iter.stream::<Row>().await.context(QuerySnafu)? else {
                yield Err(Error::QueryResultStreamError {});
                return;
            };

            let mut chunked_stream = stream.chunks(4_000).boxed();

            while let Some(chunk) = chunked_stream.next().await {
                let rows = chunk
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .context(QuerySnafu)?;

                let rec = rows_to_arrow(&rows).context(ConversionSnafu)?;
                yield Ok::<_, Error>(rec)
            }
        });

        let Some(first_chunk) = stream.next().await else {
            return Ok(Box::pin(RecordBatchStreamAdapter::new(
                projected_schema.unwrap_or_else(|| Arc::new(Schema::empty())),
                stream::empty(),
            )));
        };

        let first_chunk = first_chunk?;
        let schema = first_chunk.schema();

        Ok(Box::pin(RecordBatchStreamAdapter::new(schema, {
            stream! {
                yield Ok(first_chunk);
                while let Some(batch) = stream.next().await {
                    yield batch
                        .map_err(|e| DataFusionError::Execution(format!("Failed to fetch batch: {e}")))
                }
            }
        })))
    }

    async fn execute(&self, query: &str, params: &[Value]) -> Result<u64> {
        let mut conn = self.conn.lock().await;
        let conn = &mut *conn;
        if params.is_empty() {
            // Text protocol: not every statement can be prepared
            conn.query_drop(query).await.context(QuerySnafu)?;
        } else {
            conn.exec_drop(query, to_mysql_params(params)?)
                .await
                .context(QuerySnafu)?;
        }
        Ok(conn.affected_rows())
    }
}

impl MySQLConnection {
    /// Runs a `LOAD DATA LOCAL INFILE` statement, serving the file at `path` to the server.
    ///
    /// The server must have `local_infile` enabled. Returns the number of loaded rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the server rejects the load.
    pub async fn load_data_local_infile(&self, path: &Path, statement: &str) -> Result<u64> {
        let data = tokio::fs::read(path)
            .await
            .context(UnableToReadDataFileSnafu { path })?;

        let mut conn = self.conn.lock().await;
        let conn = &mut *conn;
        conn.set_infile_handler(infile_data(data));

        tracing::debug!("Running SQL: [ {statement} ]");
        conn.query_drop(statement).await.context(QuerySnafu)?;
        Ok(conn.affected_rows())
    }
}

/// Serves `data` as a single chunk to the server's local infile request.
fn infile_data(
    data: Vec<u8>,
) -> impl Future<Output = Result<BoxStream<'static, std::io::Result<Bytes>>, mysql_async::Error>>
       + Send
       + Sync
       + 'static {
    async move {
        let chunk: std::io::Result<Bytes> = Ok(Bytes::from(data));
        Ok::<_, mysql_async::Error>(stream::iter([chunk]).boxed())
    }
}

fn to_mysql_params(params: &[Value]) -> Result<Params, Error> {
    if params.is_empty() {
        return Ok(Params::Empty);
    }
    let values = params
        .iter()
        .map(to_mysql_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Params::Positional(values))
}

fn to_mysql_value(value: &Value) -> Result<MySQLValue, Error> {
    if is_null(value) {
        return Ok(MySQLValue::NULL);
    }

    let value = match value {
        Value::Bool(Some(v)) => MySQLValue::Int(i64::from(*v)),
        Value::TinyInt(Some(v)) => MySQLValue::Int(i64::from(*v)),
        Value::SmallInt(Some(v)) => MySQLValue::Int(i64::from(*v)),
        Value::Int(Some(v)) => MySQLValue::Int(i64::from(*v)),
        Value::BigInt(Some(v)) => MySQLValue::Int(*v),
        Value::TinyUnsigned(Some(v)) => MySQLValue::UInt(u64::from(*v)),
        Value::SmallUnsigned(Some(v)) => MySQLValue::UInt(u64::from(*v)),
        Value::Unsigned(Some(v)) => MySQLValue::UInt(u64::from(*v)),
        Value::BigUnsigned(Some(v)) => MySQLValue::UInt(*v),
        Value::Float(Some(v)) => MySQLValue::Float(*v),
        Value::Double(Some(v)) => MySQLValue::Double(*v),
        Value::String(Some(v)) => MySQLValue::Bytes(v.as_bytes().to_vec()),
        Value::Char(Some(v)) => MySQLValue::Bytes(v.to_string().into_bytes()),
        Value::Bytes(Some(v)) => MySQLValue::Bytes(v.to_vec()),
        other => {
            return UnsupportedParameterSnafu {
                value: format!("{other:?}"),
            }
            .fail()
        }
    };
    Ok(value)
}
