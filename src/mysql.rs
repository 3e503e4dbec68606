//! Read and write `MySQL` tables with Arrow record batches.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::collections::HashMap;
//!
//! use datafusion::sql::TableReference;
//! use sql_table_io::{mysql::MySQL, util::secrets::to_secret_map};
//!
//! let params = to_secret_map(HashMap::from([
//!     ("host".to_string(), "localhost".to_string()),
//!     ("database".to_string(), "shop".to_string()),
//!     ("user".to_string(), "app".to_string()),
//!     ("password".to_string(), "secret".to_string()),
//! ]));
//! let mysql = MySQL::from_params(params).await?;
//!
//! let open_orders = mysql
//!     .select(&TableReference::bare("orders"), "status = 'open'")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, sync::Arc};

use arrow::{array::RecordBatch, datatypes::SchemaRef, error::ArrowError};
use datafusion::sql::TableReference;
use mysql_async::Conn;
use sea_query::Value;
use secrecy::SecretString;
use snafu::prelude::*;

use crate::{
    sql::{
        arrow_sql_gen::statement::{
            self, Conditions, CreateTableBuilder, DeleteBuilder, Dialect, FieldMap,
            IndexedUpdateBuilder, InsertBuilder, RowId, SelectBuilder, Statement,
            TypeConversionMap, UpdateBuilder, MYSQL_MAX_PLACEHOLDERS,
        },
        bulk_load::{self, load_data::write_load_data_file},
        db_connection_pool::{
            dbconnection::{
                self, as_async, create_table_if_not_exists, execute_statement,
                mysqlconn::MySQLConnection, query_statement, DbConnection,
                GenericError,
            },
            mysqlpool::MySQLConnectionPool,
            DbConnectionPool,
        },
    },
    util, UnsupportedTypeAction,
};

pub type MySQLPool = Arc<dyn DbConnectionPool<Conn, Value> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to create MySQL connection pool: {source}"))]
    UnableToCreatePool { source: GenericError },

    #[snafu(display("Unable to connect to MySQL: {source}"))]
    UnableToConnect { source: GenericError },

    #[snafu(display("{source}"))]
    UnableToBuildStatement { source: statement::Error },

    #[snafu(display("{source}"))]
    DbConnectionError { source: dbconnection::Error },

    #[snafu(display("{source}"))]
    UnableToWriteDataFile { source: bulk_load::Error },

    #[snafu(display("Unable to load data into '{table}': {source}"))]
    UnableToLoadData { table: String, source: GenericError },

    #[snafu(display("The connection does not support LOAD DATA LOCAL INFILE"))]
    BulkLoadUnsupported {},

    #[snafu(display("Unable to project the dataset onto the columns of '{table}': {source}"))]
    UnableToProjectColumns { table: String, source: ArrowError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The outcome of [`MySQL::execute_sql`].
#[derive(Debug)]
pub enum ExecuteResult {
    /// The rows returned by a `SELECT`.
    Rows(Vec<RecordBatch>),
    /// The number of rows affected by any other statement.
    Affected(u64),
}

/// CRUD and bulk loading against one `MySQL` server.
///
/// Every call checks a connection out of the pool and returns it when done. Failures are logged
/// and returned.
pub struct MySQL {
    pool: MySQLPool,
    type_map: TypeConversionMap,
    unsupported_type_action: UnsupportedTypeAction,
}

impl MySQL {
    #[must_use]
    pub fn new(pool: MySQLPool) -> Self {
        Self {
            pool,
            type_map: TypeConversionMap::mysql(),
            unsupported_type_action: UnsupportedTypeAction::default(),
        }
    }

    /// Connects with the parameters described in [`MySQLConnectionPool::new`].
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or the server cannot be reached.
    pub async fn from_params(params: HashMap<String, SecretString>) -> Result<Self> {
        let pool = MySQLConnectionPool::new(params)
            .await
            .context(UnableToCreatePoolSnafu)?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Column declarations used when a table has to be created.
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

    async fn connect(&self) -> Result<Box<dyn DbConnection<Conn, Value>>> {
        self.pool.connect().await.context(UnableToConnectSnafu)
    }

    fn create_table_builder(&self, schema: SchemaRef, table: &TableReference) -> CreateTableBuilder {
        CreateTableBuilder::new(schema, table)
            .type_conversion_map(self.type_map.clone())
            .unsupported_type_action(self.unsupported_type_action)
    }

    /// Drops the columns `create` leaves out of the table under the `Warn` and `Ignore` actions,
    /// so inserts and loads only send columns the table has.
    fn project_to_table(
        &self,
        table: &TableReference,
        record_batches: &[RecordBatch],
    ) -> Result<Vec<RecordBatch>> {
        let Some(first) = record_batches.first() else {
            return Ok(Vec::new());
        };
        if !matches!(
            self.unsupported_type_action,
            UnsupportedTypeAction::Warn | UnsupportedTypeAction::Ignore
        ) {
            return Ok(record_batches.to_vec());
        }

        let schema = first.schema();
        // Ignore here: the unmapped columns were already reported when the table was created
        let columns = CreateTableBuilder::new(Arc::clone(&schema), table)
            .type_conversion_map(self.type_map.clone())
            .unsupported_type_action(UnsupportedTypeAction::Ignore)
            .column_names(Dialect::MySql)
            .context(UnableToBuildStatementSnafu)?;
        if columns.len() == schema.fields().len() {
            return Ok(record_batches.to_vec());
        }

        let projection: Result<Vec<_>, ArrowError> = columns
            .iter()
            .map(|column| schema.index_of(column))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|indices| {
                record_batches
                    .iter()
                    .map(|record_batch| record_batch.project(&indices))
                    .collect()
            });
        projection.context(UnableToProjectColumnsSnafu {
            table: table.to_string(),
        })
    }

    /// Runs raw SQL. A `SELECT` returns its rows, anything else the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn execute_sql(&self, sql: &str) -> Result<ExecuteResult> {
        let result: Result<_> = async {
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            let statement = Statement::unparameterized(sql.to_string());

            if util::is_select_statement(sql) {
                let batches = query_statement(conn, &statement, None)
                    .await
                    .context(DbConnectionSnafu)?;
                Ok(ExecuteResult::Rows(batches))
            } else {
                let affected = execute_statement(conn, &statement)
                    .await
                    .context(DbConnectionSnafu)?;
                Ok(ExecuteResult::Affected(affected))
            }
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to execute SQL: {e}"))
    }

    /// Whether `table` exists. Unqualified names are looked up in the connection's database.
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

    /// Creates `table` with one column per schema field, unless it already exists. Returns
    /// whether the table was created.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type has no declaration or the statement fails.
    pub async fn create(&self, table: &TableReference, schema: SchemaRef) -> Result<bool> {
        let result: Result<_> = async {
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            create_table_if_not_exists(
                conn,
                &self.create_table_builder(schema, table),
                Dialect::MySql,
            )
            .await
            .context(DbConnectionSnafu)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to create table {table}: {e}"))
    }

    /// Reads every row of `table` matching all `conditions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn select(
        &self,
        table: &TableReference,
        conditions: impl Into<Conditions>,
    ) -> Result<Vec<RecordBatch>> {
        let statement = SelectBuilder::table(table)
            .conditions(conditions)
            .build_mysql();
        self.run_select(table, &statement, None).await
    }

    /// Reads the columns named by `schema` from the rows of `table` matching all `conditions`.
    /// The batches come back with `schema` even when no row matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn select_columns(
        &self,
        table: &TableReference,
        schema: SchemaRef,
        conditions: impl Into<Conditions>,
    ) -> Result<Vec<RecordBatch>> {
        let statement = SelectBuilder::columns(table, &schema)
            .conditions(conditions)
            .build_mysql();
        self.run_select(table, &statement, Some(schema)).await
    }

    async fn run_select(
        &self,
        table: &TableReference,
        statement: &Statement,
        projected_schema: Option<SchemaRef>,
    ) -> Result<Vec<RecordBatch>> {
        let result: Result<_> = async {
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            query_statement(conn, statement, projected_schema)
                .await
                .context(DbConnectionSnafu)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to select from {table}: {e}"))
    }

    /// Inserts the rows of `record_batches`, or only the rows at `rows` when given, creating the
    /// table from the batches' schema first if it does not exist. Returns the number of inserted
    /// rows.
    ///
    /// Large datasets are split into several statements to stay under the server's placeholder
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created or the insert fails.
    pub async fn insert(
        &self,
        table: &TableReference,
        record_batches: &[RecordBatch],
        rows: Option<Vec<usize>>,
    ) -> Result<u64> {
        let result: Result<_> = async {
            let Some(first) = record_batches.first() else {
                return Ok(0);
            };
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            create_table_if_not_exists(
                conn,
                &self.create_table_builder(first.schema(), table),
                Dialect::MySql,
            )
            .await
            .context(DbConnectionSnafu)?;

            let record_batches = self.project_to_table(table, record_batches)?;
            let mut insert = InsertBuilder::new(table, record_batches);
            if let Some(rows) = rows {
                insert = insert.rows(rows);
            }
            let statements = match insert.build_mysql_chunked(MYSQL_MAX_PLACEHOLDERS) {
                Ok(statements) => statements,
                Err(statement::Error::NoRowsToInsert { .. }) => {
                    tracing::debug!("No rows to insert into {table}");
                    return Ok(0);
                }
                Err(e) => return Err(e).context(UnableToBuildStatementSnafu),
            };
            let mut inserted = 0;
            for statement in &statements {
                inserted += execute_statement(conn, statement)
                    .await
                    .context(DbConnectionSnafu)?;
            }
            Ok(inserted)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to insert into {table}: {e}"))
    }

    /// Updates the rows of `table` matching each dataset row on the `index` columns with the
    /// dataset's other columns. Returns the total number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns an error if an index column is missing from the dataset or an update fails.
    pub async fn update<T>(
        &self,
        table: &TableReference,
        record_batches: &[RecordBatch],
        index: Vec<T>,
    ) -> Result<u64>
    where
        T: Into<String>,
    {
        let statements = IndexedUpdateBuilder::new(table, record_batches.to_vec(), index)
            .build(Dialect::MySql)
            .context(UnableToBuildStatementSnafu);
        let result: Result<_> = async {
            let statements = statements?;
            let conn = self.connect().await?;
            let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
            let mut affected = 0;
            for statement in &statements {
                affected += execute_statement(conn, statement)
                    .await
                    .context(DbConnectionSnafu)?;
            }
            Ok(affected)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to update {table}: {e}"))
    }

    /// Deletes the rows of `table` matching all `conditions`, or every row when there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn delete(
        &self,
        table: &TableReference,
        conditions: impl Into<Conditions>,
    ) -> Result<u64> {
        let statement = DeleteBuilder::new(table)
            .conditions(conditions)
            .build_mysql()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to delete from {table}: {e}"))
    }

    /// Loads `record_batches` with `LOAD DATA LOCAL INFILE` through a temporary data file,
    /// creating the table first if it does not exist. Returns the number of loaded rows.
    ///
    /// The server must allow `local_infile`. The data file is removed once the load is done,
    /// whether it succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the data file cannot be written or the load fails.
    pub async fn bulk_insert(
        &self,
        table: &TableReference,
        record_batches: &[RecordBatch],
    ) -> Result<u64> {
        let result: Result<_> = async {
            let Some(first) = record_batches.first() else {
                return Ok(0);
            };
            let conn = self.connect().await?;
            create_table_if_not_exists(
                as_async(conn.as_ref()).context(DbConnectionSnafu)?,
                &self.create_table_builder(first.schema(), table),
                Dialect::MySql,
            )
            .await
            .context(DbConnectionSnafu)?;

            let Some(mysql_conn) = conn.as_any().downcast_ref::<MySQLConnection>() else {
                return BulkLoadUnsupportedSnafu.fail();
            };

            let record_batches = self.project_to_table(table, record_batches)?;
            let data_file =
                write_load_data_file(&record_batches).context(UnableToWriteDataFileSnafu)?;
            let loaded = mysql_conn
                .load_data_local_infile(data_file.path(), &data_file.statement(table))
                .await
                .context(UnableToLoadDataSnafu {
                    table: table.to_string(),
                })?;

            tracing::info!(
                "Loaded {loaded} of {} records into {table}",
                data_file.records()
            );
            Ok(loaded)
        }
        .await;
        result.inspect_err(|e| tracing::error!("Failed to bulk insert into {table}: {e}"))
    }

    /// Inserts a single row.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is empty or the statement fails.
    pub async fn insert_row(&self, table: &TableReference, fields: FieldMap) -> Result<u64> {
        let statement = InsertBuilder::from_field_map(table, fields)
            .build_mysql()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to insert into {table}: {e}"))
    }

    /// Sets `fields` on the row with the numeric id `row_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is empty, `row_id` is a row address or the statement fails.
    pub async fn update_row(
        &self,
        table: &TableReference,
        row_id: RowId,
        fields: FieldMap,
    ) -> Result<u64> {
        let statement = UpdateBuilder::new(table, fields)
            .row_id(row_id)
            .build_mysql()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to update {table}: {e}"))
    }

    /// Deletes the row with the numeric id `row_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `row_id` is a row address or the statement fails.
    pub async fn delete_row(&self, table: &TableReference, row_id: RowId) -> Result<u64> {
        let statement = DeleteBuilder::new(table)
            .row_id(row_id)
            .build_mysql()
            .context(UnableToBuildStatementSnafu);
        self.execute_built(statement)
            .await
            .inspect_err(|e| tracing::error!("Failed to delete from {table}: {e}"))
    }

    async fn execute_built(&self, statement: Result<Statement>) -> Result<u64> {
        let statement = statement?;
        let conn = self.connect().await?;
        let conn = as_async(conn.as_ref()).context(DbConnectionSnafu)?;
        execute_statement(conn, &statement)
            .await
            .context(DbConnectionSnafu)
    }
}
