use datafusion::sql::TableReference;
use sql_table_io::sql::bulk_load::{
    load_data::write_load_data_file,
    sql_loader::{write_sql_loader_files, LoadMode},
    Error,
};

use crate::arrow_record_batch_gen::get_orders_record_batches;

#[test]
fn test_sql_loader_files_for_orders() {
    let dir = tempfile::tempdir().expect("temp dir");
    let data_file = dir.path().join("orders.dat");
    let control_file = dir.path().join("orders.ctl");

    let records = write_sql_loader_files(
        &get_orders_record_batches(),
        &TableReference::partial("sales", "orders"),
        &data_file,
        &control_file,
        "truncate".parse::<LoadMode>().expect("valid mode"),
    )
    .expect("loader files should be written");

    assert_eq!(records, 5);
    assert_eq!(
        std::fs::read_to_string(&data_file).expect("data file"),
        "1;\"open\";10.5\n2;\"shipped\";\n3;;7.25\n4;\"say \"\"hi\"\"; bye\";-1.25\n5;\"C:\\orders\";3.5\n"
    );

    let control = std::fs::read_to_string(&control_file).expect("control file");
    let expected = format!(
        "LOAD DATA\nCHARACTERSET UTF8\nINFILE '{}'\nTRUNCATE\nINTO TABLE sales.orders\nFIELDS TERMINATED BY ';' OPTIONALLY ENCLOSED BY '\"'\nTRAILING NULLCOLS\n(ID,STATUS,AMOUNT)",
        data_file.display()
    );
    assert_eq!(control, expected);
}

#[test]
fn test_sql_loader_files_need_batches() {
    let dir = tempfile::tempdir().expect("temp dir");
    let data_file = dir.path().join("orders.dat");

    let result = write_sql_loader_files(
        &[],
        &TableReference::bare("orders"),
        &data_file,
        &dir.path().join("orders.ctl"),
        LoadMode::Append,
    );

    assert!(matches!(result, Err(Error::NoRecordBatches { .. })));
    assert!(!data_file.exists());
}

#[test]
fn test_load_data_file_for_orders() {
    let data_file = write_load_data_file(&get_orders_record_batches()).expect("data file");
    let path = data_file.path().to_path_buf();

    assert_eq!(data_file.records(), 5);
    assert_eq!(
        std::fs::read_to_string(&path).expect("data file"),
        "1;open;10.5\n2;shipped;\\N\n3;\\N;7.25\n4;\"say \"\"hi\"\"; bye\";-1.25\n5;C:\\\\orders;3.5\n"
    );

    let statement = data_file.statement(&TableReference::bare("orders"));
    assert!(statement.starts_with("LOAD DATA LOCAL INFILE '"));
    assert!(statement.ends_with(
        "' INTO TABLE `orders` FIELDS TERMINATED BY ';' ENCLOSED BY '\"'"
    ));

    drop(data_file);
    assert!(!path.exists());
}
