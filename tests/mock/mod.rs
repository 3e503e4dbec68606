use std::{
    any::Any,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::{
    execution::SendableRecordBatchStream, physical_plan::stream::RecordBatchStreamAdapter,
    sql::TableReference,
};
use sea_query::Value;
use sql_table_io::sql::db_connection_pool::{
    dbconnection::{self, AsyncDbConnection, DbConnection, GenericError},
    DbConnectionPool,
};

use crate::arrow_record_batch_gen::orders_record_batch;

/// State shared by every connection a [`MockPool`] hands out.
#[derive(Default)]
pub(crate) struct MockDatabase {
    tables: Mutex<Vec<TableReference>>,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
    queried: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockDatabase {
    pub(crate) fn with_tables(tables: Vec<TableReference>) -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(tables),
            ..Default::default()
        })
    }

    pub(crate) fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.executed.lock().expect("lock").clone()
    }

    pub(crate) fn executed_sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|(sql, _)| sql).collect()
    }

    pub(crate) fn queried(&self) -> Vec<(String, Vec<Value>)> {
        self.queried.lock().expect("lock").clone()
    }
}

pub(crate) struct MockPool {
    db: Arc<MockDatabase>,
}

impl MockPool {
    pub(crate) fn new(db: &Arc<MockDatabase>) -> Self {
        Self { db: Arc::clone(db) }
    }
}

#[async_trait]
impl<T: 'static> DbConnectionPool<T, Value> for MockPool {
    async fn connect(&self) -> Result<Box<dyn DbConnection<T, Value>>, GenericError> {
        Ok(Box::new(MockConnection::<T> {
            db: Arc::clone(&self.db),
            _conn: PhantomData,
        }))
    }
}

/// Records statements instead of running them. Every query answers with the same three orders.
pub(crate) struct MockConnection<T> {
    db: Arc<MockDatabase>,
    _conn: PhantomData<fn() -> T>,
}

impl<T: 'static> DbConnection<T, Value> for MockConnection<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_async(&self) -> Option<&dyn AsyncDbConnection<T, Value>> {
        Some(self)
    }
}

#[async_trait]
impl<T: 'static> AsyncDbConnection<T, Value> for MockConnection<T> {
    fn new(_conn: T) -> Self {
        unimplemented!("mock connections come from MockPool")
    }

    async fn table_exists(
        &self,
        table_reference: &TableReference,
    ) -> Result<bool, dbconnection::Error> {
        Ok(self
            .db
            .tables
            .lock()
            .expect("lock")
            .contains(table_reference))
    }

    async fn query_arrow(
        &self,
        sql: &str,
        params: &[Value],
        _projected_schema: Option<SchemaRef>,
    ) -> Result<SendableRecordBatchStream, GenericError> {
        self.db
            .queried
            .lock()
            .expect("lock")
            .push((sql.to_string(), params.to_vec()));
        let batch = orders_record_batch(
            vec![1, 2, 3],
            vec![Some("open"), Some("open"), Some("open")],
            vec![Some(1.5), Some(2.5), Some(3.5)],
        );
        Ok(Box::pin(RecordBatchStreamAdapter::new(
            batch.schema(),
            futures::stream::iter(vec![Ok(batch)]),
        )))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, GenericError> {
        self.db
            .executed
            .lock()
            .expect("lock")
            .push((sql.to_string(), params.to_vec()));
        if sql.starts_with("CREATE TABLE") {
            return Ok(0);
        }
        Ok(1)
    }
}
