use datafusion::sql::TableReference;
use rstest::rstest;
use sea_query::Value;
use sql_table_io::sql::arrow_sql_gen::statement::{
    CreateTableBuilder, Dialect, FieldMap, IndexedUpdateBuilder, InsertBuilder, RowId,
    SelectBuilder, UpdateBuilder,
};

use crate::arrow_record_batch_gen::{get_orders_record_batches, orders_schema};

fn orders() -> TableReference {
    TableReference::bare("orders")
}

#[test]
fn test_create_orders_table() {
    let builder = CreateTableBuilder::new(orders_schema(), &orders());

    let stmt = builder
        .build(Dialect::Oracle)
        .expect("Failed to build create statement");
    assert_eq!(
        stmt.sql(),
        "CREATE TABLE orders ( ID NUMBER(19) NOT NULL, STATUS VARCHAR2(255), AMOUNT NUMBER(20,6) )"
    );

    let stmt = builder
        .build(Dialect::MySql)
        .expect("Failed to build create statement");
    assert_eq!(
        stmt.sql(),
        "CREATE TABLE `orders` ( `ID` INT NOT NULL, `STATUS` VARCHAR(255), `AMOUNT` DECIMAL(20,6) )"
    );
}

#[test]
fn test_insert_all_orders_mysql() {
    let stmt = InsertBuilder::new(&orders(), get_orders_record_batches())
        .build(Dialect::MySql)
        .expect("Failed to build insert statement");

    assert_eq!(
        stmt.sql(),
        "INSERT INTO `orders` (`ID`, `STATUS`, `AMOUNT`) VALUES (?, ?, ?), (?, ?, NULL), (?, NULL, ?), (?, ?, ?), (?, ?, ?)"
    );
    // Nulls are written as keywords, never bound.
    assert_eq!(stmt.values().len(), 13);
    assert_eq!(stmt.values()[0], Value::BigInt(Some(1)));
    assert_eq!(stmt.values()[11], Value::from("C:\\orders"));
}

#[test]
fn test_insert_selected_orders_oracle() {
    let stmt = InsertBuilder::new(&orders(), get_orders_record_batches())
        .rows(vec![0, 3])
        .build(Dialect::Oracle)
        .expect("Failed to build insert statement");

    assert_eq!(
        stmt.sql(),
        "INSERT ALL INTO orders (ID, STATUS, AMOUNT) VALUES (:1, :2, :3) INTO orders (ID, STATUS, AMOUNT) VALUES (:4, :5, :6) SELECT 1 FROM DUAL"
    );
    insta::assert_snapshot!(stmt.to_string(), @r#"INSERT ALL INTO orders (ID, STATUS, AMOUNT) VALUES (1, 'open', 10.5) INTO orders (ID, STATUS, AMOUNT) VALUES (4, 'say "hi"; bye', -1.25) SELECT 1 FROM DUAL"#);
}

#[test]
fn test_single_selected_row_is_a_plain_insert() {
    let stmt = InsertBuilder::new(&orders(), get_orders_record_batches())
        .rows(vec![2])
        .build(Dialect::Oracle)
        .expect("Failed to build insert statement");

    assert_eq!(
        stmt.sql(),
        "INSERT INTO orders (ID, STATUS, AMOUNT) VALUES (:1, NULL, :2)"
    );
    assert_eq!(
        stmt.values(),
        &[Value::BigInt(Some(3)), Value::Double(Some(7.25))]
    );
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(7)]
fn test_update_binds_every_assignment(#[case] assignments: usize) {
    let fields: FieldMap = (1..=assignments)
        .map(|i| (format!("C{i}"), format!("value {i}")))
        .collect();

    let stmt = UpdateBuilder::new(&orders(), fields)
        .row_id(RowId::from(11))
        .build(Dialect::Oracle)
        .expect("Failed to build update statement");

    let set_clause = (1..=assignments)
        .map(|i| format!("C{i} = :{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    assert_eq!(
        stmt.sql(),
        format!(
            "UPDATE orders SET {set_clause} WHERE ID = :{}",
            assignments + 1
        )
    );
    assert_eq!(stmt.values().len(), assignments + 1);
    assert_eq!(stmt.values()[assignments], Value::BigInt(Some(11)));
}

#[test]
fn test_update_by_row_address_inlines_quoted_address() {
    let row_id: RowId = "AAAR3sAAEAAAACXAAA".parse().expect("row address");
    let stmt = UpdateBuilder::new(&orders(), FieldMap::new().with("STATUS", "it's done"))
        .row_id(row_id)
        .build(Dialect::Oracle)
        .expect("Failed to build update statement");

    assert_eq!(
        stmt.to_string(),
        "UPDATE orders SET STATUS = 'it''s done' WHERE ROWID = 'AAAR3sAAEAAAACXAAA'"
    );
}

#[test]
fn test_update_orders_by_id_across_batches() {
    let statements = IndexedUpdateBuilder::new(&orders(), get_orders_record_batches(), vec!["ID"])
        .build(Dialect::Oracle)
        .expect("Failed to build update statements");

    assert_eq!(statements.len(), 5);
    assert_eq!(
        statements[1].to_string(),
        "UPDATE orders SET STATUS = 'shipped', AMOUNT = NULL WHERE ID = 2"
    );
    assert_eq!(
        statements[4].sql(),
        "UPDATE orders SET STATUS = :1, AMOUNT = :2 WHERE ID = :3"
    );
}

#[test]
fn test_select_with_conditions() {
    let stmt = SelectBuilder::table(&TableReference::partial("sales", "orders"))
        .conditions(vec!["AMOUNT > 5", "STATUS = 'open'"])
        .build(Dialect::Oracle)
        .expect("Failed to build select statement");

    assert_eq!(
        stmt.sql(),
        "SELECT * FROM sales.orders WHERE (AMOUNT > 5) AND (STATUS = 'open')"
    );
    assert!(stmt.values().is_empty());
}
