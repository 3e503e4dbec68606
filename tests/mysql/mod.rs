use std::sync::Arc;

use arrow::{
    array::{BooleanArray, Int64Array, RecordBatch},
    datatypes::{DataType, Field, Schema},
};
use datafusion::sql::TableReference;
use sea_query::Value;
use sql_table_io::{
    mysql::{Error, ExecuteResult, MySQL},
    sql::arrow_sql_gen::statement::{FieldMap, RowId},
    UnsupportedTypeAction,
};

use crate::{
    arrow_record_batch_gen::{get_orders_record_batches, orders_schema},
    mock::{MockDatabase, MockPool},
};

fn orders() -> TableReference {
    TableReference::bare("orders")
}

fn mysql_with_tables(tables: Vec<TableReference>) -> (MySQL, Arc<MockDatabase>) {
    let db = MockDatabase::with_tables(tables);
    (MySQL::new(Arc::new(MockPool::new(&db))), db)
}

#[test_log::test(tokio::test)]
async fn test_execute_sql_routes_by_statement_kind() {
    let (mysql, db) = mysql_with_tables(vec![]);

    let result = mysql
        .execute_sql("  select * from orders")
        .await
        .expect("query should run");
    let ExecuteResult::Rows(batches) = result else {
        panic!("a SELECT should return rows");
    };
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 3);

    let result = mysql
        .execute_sql("DELETE FROM orders WHERE ID = 1")
        .await
        .expect("statement should run");
    assert!(matches!(result, ExecuteResult::Affected(1)));

    assert_eq!(db.queried().len(), 1);
    assert_eq!(db.executed_sql(), vec!["DELETE FROM orders WHERE ID = 1"]);
}

#[test_log::test(tokio::test)]
async fn test_create_only_when_missing() {
    let (mysql, db) = mysql_with_tables(vec![]);
    let created = mysql
        .create(&orders(), orders_schema())
        .await
        .expect("table should be created");
    assert!(created);
    assert_eq!(
        db.executed_sql(),
        vec!["CREATE TABLE `orders` ( `ID` INT NOT NULL, `STATUS` VARCHAR(255), `AMOUNT` DECIMAL(20,6) )"]
    );

    let (mysql, db) = mysql_with_tables(vec![orders()]);
    let created = mysql
        .create(&orders(), orders_schema())
        .await
        .expect("lookup should succeed");
    assert!(!created);
    assert!(db.executed().is_empty());
    assert!(mysql
        .check_for_table(&orders())
        .await
        .expect("lookup should succeed"));
}

#[test_log::test(tokio::test)]
async fn test_insert_creates_table_first() {
    let (mysql, db) = mysql_with_tables(vec![]);

    let inserted = mysql
        .insert(&orders(), &get_orders_record_batches(), Some(vec![1, 4]))
        .await
        .expect("rows should be inserted");

    assert_eq!(inserted, 1);
    let executed = db.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].0.starts_with("CREATE TABLE `orders`"));
    assert_eq!(
        executed[1].0,
        "INSERT INTO `orders` (`ID`, `STATUS`, `AMOUNT`) VALUES (?, ?, NULL), (?, ?, ?)"
    );
    assert_eq!(executed[1].1[0], Value::BigInt(Some(2)));
    assert_eq!(executed[1].1[2], Value::BigInt(Some(5)));
}

#[test_log::test(tokio::test)]
async fn test_insert_without_rows_is_a_no_op() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    let inserted = mysql
        .insert(&orders(), &get_orders_record_batches(), Some(vec![]))
        .await
        .expect("nothing to insert is not an error");
    assert_eq!(inserted, 0);

    let inserted = mysql
        .insert(&orders(), &[], None)
        .await
        .expect("nothing to insert is not an error");
    assert_eq!(inserted, 0);

    assert!(db.executed().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_insert_leaves_out_unmapped_columns() {
    let db = MockDatabase::with_tables(vec![]);
    let mysql = MySQL::new(Arc::new(MockPool::new(&db)))
        .with_unsupported_type_action(UnsupportedTypeAction::Ignore);
    let schema = Schema::new(vec![
        Field::new("ID", DataType::Int64, false),
        Field::new("GIFT", DataType::Boolean, true),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(BooleanArray::from(vec![Some(true), None])),
        ],
    )
    .expect("Unable to build record batch");

    let inserted = mysql
        .insert(&orders(), &[batch], None)
        .await
        .expect("rows should be inserted");

    assert_eq!(inserted, 1);
    assert_eq!(
        db.executed(),
        vec![
            (
                "CREATE TABLE `orders` ( `ID` INT NOT NULL )".to_string(),
                vec![]
            ),
            (
                "INSERT INTO `orders` (`ID`) VALUES (?), (?)".to_string(),
                vec![Value::BigInt(Some(1)), Value::BigInt(Some(2))]
            ),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_update_by_index_columns() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    let affected = mysql
        .update(&orders(), &get_orders_record_batches(), vec!["ID"])
        .await
        .expect("rows should be updated");

    assert_eq!(affected, 5);
    let executed = db.executed();
    assert_eq!(executed.len(), 5);
    assert_eq!(
        executed[0].0,
        "UPDATE `orders` SET `STATUS` = ?, `AMOUNT` = ? WHERE `ID` = ?"
    );
    assert_eq!(
        executed[1].0,
        "UPDATE `orders` SET `STATUS` = ?, `AMOUNT` = NULL WHERE `ID` = ?"
    );
}

#[test_log::test(tokio::test)]
async fn test_update_with_missing_index_runs_nothing() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    let result = mysql
        .update(&orders(), &get_orders_record_batches(), vec!["ORDER_NO"])
        .await;

    assert!(matches!(result, Err(Error::UnableToBuildStatement { .. })));
    assert!(db.executed().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_single_row_operations() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    mysql
        .insert_row(
            &orders(),
            FieldMap::new().with("ID", 6_i64).with("STATUS", "open"),
        )
        .await
        .expect("row should be inserted");
    mysql
        .update_row(&orders(), RowId::from(6), FieldMap::new().with("STATUS", "paid"))
        .await
        .expect("row should be updated");
    mysql
        .delete_row(&orders(), RowId::from(6))
        .await
        .expect("row should be deleted");

    assert_eq!(
        db.executed(),
        vec![
            (
                "INSERT INTO `orders` (`ID`, `STATUS`) VALUES (?, ?)".to_string(),
                vec![Value::BigInt(Some(6)), Value::from("open")]
            ),
            (
                "UPDATE `orders` SET `STATUS` = ? WHERE `ID` = ?".to_string(),
                vec![Value::from("paid"), Value::BigInt(Some(6))]
            ),
            (
                "DELETE FROM `orders` WHERE `ID` = ?".to_string(),
                vec![Value::BigInt(Some(6))]
            ),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_row_address_is_rejected_before_running() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    let result = mysql
        .update_row(
            &orders(),
            RowId::RowAddress("AAAR3sAAEAAAACXAAA".to_string()),
            FieldMap::new().with("STATUS", "paid"),
        )
        .await;

    assert!(matches!(result, Err(Error::UnableToBuildStatement { .. })));
    assert!(db.executed().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_select_and_delete_with_conditions() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    let batches = mysql
        .select(&orders(), "STATUS = 'open'")
        .await
        .expect("query should run");
    assert_eq!(batches.len(), 1);

    let queried = db.queried();
    assert_eq!(queried.len(), 1);
    assert!(queried[0].0.starts_with("SELECT * FROM `orders` WHERE "));
    assert!(queried[0].0.contains("STATUS = 'open'"));

    mysql
        .delete(&orders(), Vec::<String>::new())
        .await
        .expect("rows should be deleted");
    assert_eq!(db.executed_sql(), vec!["DELETE FROM `orders`"]);
}

#[test_log::test(tokio::test)]
async fn test_select_named_columns() {
    let (mysql, db) = mysql_with_tables(vec![orders()]);

    let batches = mysql
        .select_columns(&orders(), orders_schema(), vec!["AMOUNT > 5"])
        .await
        .expect("query should run");
    assert_eq!(batches.len(), 1);

    let queried = db.queried();
    assert_eq!(queried.len(), 1);
    assert_eq!(
        queried[0].0,
        "SELECT `ID`, `STATUS`, `AMOUNT` FROM `orders` WHERE AMOUNT > 5"
    );
}

#[test_log::test(tokio::test)]
async fn test_bulk_insert_needs_a_mysql_connection() {
    let (mysql, db) = mysql_with_tables(vec![]);

    let result = mysql
        .bulk_insert(&orders(), &get_orders_record_batches())
        .await;

    assert!(matches!(result, Err(Error::BulkLoadUnsupported { .. })));
    let executed = db.executed_sql();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].starts_with("CREATE TABLE `orders`"));
}
