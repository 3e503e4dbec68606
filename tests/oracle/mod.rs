use std::{collections::HashMap, sync::Arc};

use datafusion::sql::TableReference;
use sea_query::Value;
use sql_table_io::{
    oracle::{Error, Oracle},
    sql::{
        arrow_sql_gen::statement::{FieldMap, RowId},
        bulk_load::sql_loader::LoadMode,
    },
    util::secrets::to_secret_map,
};

use crate::{
    arrow_record_batch_gen::{get_orders_record_batches, orders_schema},
    mock::{MockDatabase, MockPool},
};

fn orders() -> TableReference {
    TableReference::bare("orders")
}

fn oracle_with_tables(tables: Vec<TableReference>) -> (Oracle, Arc<MockDatabase>) {
    let db = MockDatabase::with_tables(tables);
    (Oracle::new(Arc::new(MockPool::new(&db))), db)
}

#[test_log::test(tokio::test)]
async fn test_update_by_row_address() {
    let (oracle, db) = oracle_with_tables(vec![orders()]);

    let row_id: RowId = "AAAR3sAAEAAAACXAAA".parse().expect("row address");
    let affected = oracle
        .update(&orders(), row_id, FieldMap::new().with("STATUS", "paid"))
        .await
        .expect("row should be updated");

    assert_eq!(affected, 1);
    assert_eq!(
        db.executed(),
        vec![(
            "UPDATE orders SET STATUS = :1 WHERE ROWID = :2".to_string(),
            vec![Value::from("paid"), Value::from("AAAR3sAAEAAAACXAAA")]
        )]
    );
}

#[test_log::test(tokio::test)]
async fn test_insert_and_delete_by_id() {
    let (oracle, db) = oracle_with_tables(vec![orders()]);

    oracle
        .insert(
            &orders(),
            FieldMap::new()
                .with("ID", 6_i64)
                .with("STATUS", Value::String(None))
                .with("AMOUNT", 12.5_f64),
        )
        .await
        .expect("row should be inserted");
    oracle
        .delete(&orders(), RowId::from(6))
        .await
        .expect("row should be deleted");

    assert_eq!(
        db.executed(),
        vec![
            (
                "INSERT INTO orders (ID, STATUS, AMOUNT) VALUES (:1, NULL, :2)".to_string(),
                vec![Value::BigInt(Some(6)), Value::Double(Some(12.5))]
            ),
            (
                "DELETE FROM orders WHERE ID = :1".to_string(),
                vec![Value::BigInt(Some(6))]
            ),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_query_and_select() {
    let (oracle, db) = oracle_with_tables(vec![orders()]);

    let batches = oracle
        .query("SELECT ID FROM orders WHERE ROWNUM <= 3")
        .await
        .expect("query should run");
    assert_eq!(batches[0].num_rows(), 3);

    oracle
        .select(&orders(), vec!["STATUS = 'open'", "AMOUNT > 1"])
        .await
        .expect("select should run");

    let queried: Vec<String> = db.queried().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(
        queried,
        vec![
            "SELECT ID FROM orders WHERE ROWNUM <= 3",
            "SELECT * FROM orders WHERE (STATUS = 'open') AND (AMOUNT > 1)",
        ]
    );
    assert!(db.executed().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_select_named_columns() {
    let (oracle, db) = oracle_with_tables(vec![orders()]);

    oracle
        .select_columns(
            &orders(),
            orders_schema(),
            vec!["STATUS = 'x' OR STATUS = 'y'", "AMOUNT > 1"],
        )
        .await
        .expect("select should run");

    let queried: Vec<String> = db.queried().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(
        queried,
        vec!["SELECT ID, STATUS, AMOUNT FROM orders WHERE (STATUS = 'x' OR STATUS = 'y') AND (AMOUNT > 1)"]
    );
}

#[test_log::test(tokio::test)]
async fn test_create_orders_table() {
    let (oracle, db) = oracle_with_tables(vec![]);

    assert!(!oracle
        .check_for_table(&orders())
        .await
        .expect("lookup should succeed"));
    let created = oracle
        .create(&orders(), orders_schema())
        .await
        .expect("table should be created");

    assert!(created);
    assert_eq!(
        db.executed_sql(),
        vec!["CREATE TABLE orders ( ID NUMBER(19) NOT NULL, STATUS VARCHAR2(255), AMOUNT NUMBER(20,6) )"]
    );
}

#[test_log::test(tokio::test)]
async fn test_invalid_identifier_runs_nothing() {
    let (oracle, db) = oracle_with_tables(vec![]);

    let result = oracle
        .delete(&TableReference::bare("orders--"), RowId::from(1))
        .await;

    assert!(matches!(result, Err(Error::UnableToBuildStatement { .. })));
    assert!(db.executed().is_empty());
}

#[test]
fn test_bulk_insert_writes_loader_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let data_file = dir.path().join("orders.dat");
    let control_file = dir.path().join("orders.ctl");

    let records = Oracle::bulk_insert(
        &get_orders_record_batches(),
        &orders(),
        &data_file,
        &control_file,
        LoadMode::Replace,
    )
    .expect("loader files should be written");

    assert_eq!(records, 5);
    let control = std::fs::read_to_string(&control_file).expect("control file");
    assert!(control.contains("\nREPLACE\nINTO TABLE orders\n"));
    assert!(control.ends_with("(ID,STATUS,AMOUNT)"));
}

#[test]
fn test_bulk_insert_without_batches() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = Oracle::bulk_insert(
        &[],
        &orders(),
        &dir.path().join("orders.dat"),
        &dir.path().join("orders.ctl"),
        LoadMode::Append,
    );
    assert!(matches!(result, Err(Error::UnableToWriteLoaderFiles { .. })));
}

#[test]
fn test_from_params_requires_user() {
    let params = to_secret_map(HashMap::from([
        ("oracle_host".to_string(), "db".to_string()),
        ("oracle_password".to_string(), "tiger".to_string()),
    ]));

    let result = Oracle::from_params(params);
    assert!(matches!(result, Err(Error::InvalidParameters { .. })));
}
