//! Read and write Oracle tables with Arrow record batches.
//!
//! Single-row changes go through parameterized statements. Large datasets are written to
//! SQL*Loader files with [`Oracle::bulk_insert`] and loaded by running `sqlldr` separately.

use std::{collections::HashMap, path::Path, sync::Arc};

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use datafusion::sql::TableReference;
use oracle::Connection;
use sea_query::Value;
use secrecy::SecretString;
use snafu::prelude::*;

use crate::{
    sql::{
        arrow_sql_gen::statement::{
            self, Conditions, CreateTableBuilder, DeleteBuilder, Dialect, FieldMap, InsertBuilder,
            RowId, SelectBuilder, Statement, TypeConversionMap, UpdateBuilder,
        },
        bulk_load::{
            self,
            sql_loader::{write_sql_loader_files, LoadMode},
        },
        db_connection_pool::{
            dbconnection::{
                self, as_async, create_table_if_not_exists, execute_statement, query_statement,
                DbConnection, GenericError,
            },
            oraclepool::{self, OracleConnectionPool},
            DbConnectionPool,
        },
    },
    UnsupportedTypeAction,
};

pub type OraclePool = Arc<dyn DbConnectionPool<Arc<Connection>, Value> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid Oracle connection parameters: {source}"))]
    InvalidParameters { source: oraclepool::Error },

    #[snafu(display("Unable to connect to Oracle: {source}"))]
    UnableToConnect { source: GenericError },

    #[snafu(display("{source}"))]
    UnableToBuildStatement { source: statement::Error },

    #[snafu(display("{source}"))]
    DbConnectionError { source: dbconnection::Error },

    #[snafu(display("{source}"))]
    UnableToWriteLoaderFiles { source: bulk_load::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// CRUD against one Oracle database.
///
/// Every call opens a session from the pool and closes it when done. Failures are logged and
/// returned.
pub struct Oracle {
    pool: OraclePool,
    type_map: TypeConversionMap,
    unsupported_type_action: UnsupportedTypeAction,
}

impl Oracle {
    #[must_use]
    pub fn new(pool: OraclePool) -> Self {
        Self {
            pool,
            type_map: TypeConversionMap::oracle(),
            unsupported_type_action: UnsupportedTypeAction::default(),
        }
    }

    /// Uses the parameters described in [`OracleConnectionPool::new`].
    ///
    /// # Errors
    ///
    /// Returns an error if a required parameter is missing or invalid.
    pub fn from_params(params: HashMap<String, SecretString>) -> Result<Self> {
        let pool = OracleConnectionPool::new(params).context(InvalidParametersSnafu)?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Column declarations used by [`Oracle::create`].
    #[must_use]
    pub fn with_type_conversion_map(mut self, type_map: TypeConversionMap) -> Self {
        self.type_map = type_map;
        self
    }

    #[must_use]
    pub fn with_unsupported_type_action(mut self, action: UnsupportedTypeAction) -> Self {
        self.unsupported_type_action = action;
        self
    }

    async fn connect(&self) -> Result<Box<dyn DbConnection<Arc<Connection>, Value>>> {
        self.pool.connect().await.context(UnableToConnectSnafu)
    }

    async fn run_query(
        &self,
        statement: &Statement,
        projected_schema: Option<SchemaRef>,
    ) -> Result<Vec<RecordBatch>> {
        let conn = self.connect().await?;
        let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
        query_statement(conn, statement, projected_schema)
            .await
            .context(DbConnectionSnafu)
    }

    async fn execute_built(&self, statement: Result<Statement>) -> Result<u64> {
        let statement = statement?;
        let conn = self.connect().await?;
        let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
        execute_statement(conn, &statement)
            .await
            .context(DbConnectionSnafu)
    }

    /// Runs a query and returns its rows. The SQL must not end with a `;`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let statement = Statement::unparameterized(sql.to_string());
        self.run_query(&statement, None)
            .await
            .inspect_err(|e| tracing::error!("Failed to run query: {e}"))
    }

    /// Reads every row of `table` matching all `conditions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is not a valid identifier or the query fails.
    pub async fn select(
        &self,
        table: &TableReference,
        conditions: impl Into<Conditions>,
    ) -> Result<Vec<RecordBatch>> {
        let statement = SelectBuilder::table(table)
            .conditions(conditions)
            .build_oracle()
            .context(UnableToBuildStatementSnafu);
        let result: Result<_> = async { self.run_query(&statement?, None).await }.await;
        result.inspect_err(|e| tracing::error!("Failed to select from {table}: {e}"))
    }

    /// Reads the columns named by `schema` from the rows of `table` matching all `conditions`.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier is not valid or the query fails.
    pub async fn select_columns(
        &self,
        table: &TableReference,
        schema: SchemaRef,
        conditions: impl Into<Conditions>,
    ) -> Result<Vec<RecordBatch>> {
        let statement = SelectBuilder::columns(table, &schema)
            .conditions(conditions)
            .build_oracle()
            .context(UnableToBuildStatementSnafu);
        let result: Result<_> = async { self.run_query(&statement?, Some(schema)).await }.await;
        result.inspect_err(|e| tracing::error!("Failed to select from {table}: {e}"))
    }

    /// Sets `fields` on the row identified by `row_id`, a `ROWID` or a value of the `ID` column.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is empty or the statement fails.
    pub async fn update(
        &self,
        table: &TableReference,
        row_id: RowId,
        fields: FieldMap,
    ) -> Result<u64> {
        let statement = UpdateBuilder::new(table, fields)
            .row_id(row_id)
            .build_oracle()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to update {table}: {e}"))
    }

    /// Deletes the row identified by `row_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn delete(&self, table: &TableReference, row_id: RowId) -> Result<u64> {
        let statement = DeleteBuilder::new(table)
            .row_id(row_id)
            .build_oracle()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to delete from {table}: {e}"))
    }

    /// Inserts a single row.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is empty or the statement fails.
    pub async fn insert(&self, table: &TableReference, fields: FieldMap) -> Result<u64> {
        let statement = InsertBuilder::from_field_map(table, fields)
            .build_oracle()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to insert into {table}: {e}"))
    }

    /// Creates `table` with one column per schema field, unless it already exists. Returns
    /// whether the table was created.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type has no declaration or the statement fails.
    pub async fn create(&self, table: &TableReference, schema: SchemaRef) -> Result<bool> {
        let create_table = CreateTableBuilder::new(schema, table)
            .type_conversion_map(self.type_map.clone())
            .unsupported_type_action(self.unsupported_type_action);
        let result: Result<_> = async {
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            create_table_if_not_exists(conn, &create_table, Dialect::Oracle)
                .await
                .context(DbConnectionSnafu)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to create table {table}: {e}"))
    }

    /// Whether `table` exists. Unqualified names are looked up in the current user's schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn check_for_table(&self, table: &TableReference) -> Result<bool> {
        let result: Result<_> = async {
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            conn.table_exists(table).await.context(DbConnectionSnafu)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to check for table {table}: {e}"))
    }

    /// Writes the SQL*Loader data and control files that load `record_batches` into `table`.
    /// Returns the number of records written.
    ///
    /// No database connection is needed; run `sqlldr` with the control file to load the data.
    ///
    /// # Errors
    ///
    /// Returns an error if `record_batches` is empty or a file cannot be written.
    pub fn bulk_insert(
        record_batches: &[RecordBatch],
        table: &TableReference,
        data_file: &Path,
        control_file: &Path,
        mode: LoadMode,
    ) -> Result<u64> {
        write_sql_loader_files(record_batches, table, data_file, control_file, mode)
            .context(UnableToWriteLoaderFilesSnafu)
            .inspect_err(|e| tracing::error!("Failed to write loader files for {table}: {e}"))
    }
}
