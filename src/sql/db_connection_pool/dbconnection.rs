use std::any::Any;

use datafusion::{
    arrow::{array::RecordBatch, datatypes::SchemaRef},
    execution::SendableRecordBatchStream,
    sql::TableReference,
};
use futures::TryStreamExt;
use sea_query::Value;
use snafu::prelude::*;

use crate::sql::arrow_sql_gen::statement::{self, CreateTableBuilder, Dialect, Statement};

#[cfg(feature = "mysql")]
pub mod mysqlconn;
#[cfg(feature = "oracle")]
pub mod oracleconn;

pub type GenericError = Box<dyn std::error::Error + Send + Sync>;
type Result<T, E = GenericError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to downcast connection."))]
    UnableToDowncastConnection {},

    #[snafu(display("Unable to check whether table '{table_name}' exists: {source}"))]
    UnableToCheckTable {
        table_name: String,
        source: GenericError,
    },

    #[snafu(display("Failed to execute query.\n{source}"))]
    UnableToQueryArrow { source: GenericError },

    #[snafu(display("Failed to execute statement.\n{source}"))]
    UnableToExecute { source: GenericError },

    #[snafu(display("Unable to build statement: {source}"))]
    UnableToBuildStatement { source: statement::Error },
}

#[async_trait::async_trait]
pub trait AsyncDbConnection<T, P>: DbConnection<T, P> + Sync {
    fn new(conn: T) -> Self
    where
        Self: Sized;

    /// Whether the table exists. A table without a schema is looked up in the connection's
    /// default schema.
    async fn table_exists(&self, table_reference: &TableReference) -> Result<bool, Error>;

    /// Query the database with the given SQL statement and parameters, returning a `Result` of `SendableRecordBatchStream`.
    ///
    /// # Arguments
    ///
    /// * `sql` - The SQL statement.
    /// * `params` - The parameters for the SQL statement.
    /// * `projected_schema` - Schema of the stream when the query returns no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn query_arrow(
        &self,
        sql: &str,
        params: &[P],
        projected_schema: Option<SchemaRef>,
    ) -> Result<SendableRecordBatchStream>;

    /// Execute the given SQL statement with parameters, returning the number of affected rows.
    ///
    /// # Arguments
    ///
    /// * `sql` - The SQL statement.
    /// * `params` - The parameters for the SQL statement.
    async fn execute(&self, sql: &str, params: &[P]) -> Result<u64>;
}

pub trait DbConnection<T, P>: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_async(&self) -> Option<&dyn AsyncDbConnection<T, P>> {
        None
    }
}

/// The asynchronous interface of a connection.
///
/// # Errors
///
/// Returns an error if the connection only supports synchronous use.
pub fn as_async<T, P>(
    conn: &dyn DbConnection<T, P>,
) -> Result<&dyn AsyncDbConnection<T, P>, Error> {
    conn.as_async().context(UnableToDowncastConnectionSnafu)
}

/// Binds the statement's values to its placeholders and runs it.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub async fn execute_statement<T>(
    conn: &dyn AsyncDbConnection<T, Value>,
    statement: &Statement,
) -> Result<u64, Error> {
    tracing::debug!("Running SQL: [ {statement} ]");
    conn.execute(statement.sql(), statement.values())
        .await
        .context(UnableToExecuteSnafu)
}

/// Runs a query and collects all of its record batches.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn query_statement<T>(
    conn: &dyn AsyncDbConnection<T, Value>,
    statement: &Statement,
    projected_schema: Option<SchemaRef>,
) -> Result<Vec<RecordBatch>, Error> {
    tracing::debug!("Running SQL: [ {statement} ]");
    let stream = conn
        .query_arrow(statement.sql(), statement.values(), projected_schema)
        .await
        .context(UnableToQueryArrowSnafu)?;
    stream
        .try_collect::<Vec<_>>()
        .await
        .boxed()
        .context(UnableToQueryArrowSnafu)
}

/// Creates the builder's table unless it already exists. Returns whether it was created.
///
/// # Errors
///
/// Returns an error if the lookup fails, the schema cannot be mapped to column declarations or
/// the `CREATE TABLE` statement fails.
pub async fn create_table_if_not_exists<T>(
    conn: &dyn AsyncDbConnection<T, Value>,
    create_table: &CreateTableBuilder,
    dialect: Dialect,
) -> Result<bool, Error> {
    let table = create_table.table();
    if conn.table_exists(table).await? {
        tracing::debug!("Table {table} already exists");
        return Ok(false);
    }

    let statement = create_table
        .build(dialect)
        .context(UnableToBuildStatementSnafu)?;
    execute_statement(conn, &statement).await?;
    tracing::info!("Created table {table}");
    Ok(true)
}
