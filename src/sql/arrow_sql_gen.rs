//! SQL generation from Arrow data, and Arrow conversion of driver rows.
//!
//! [`statement`] renders `CREATE TABLE`, `INSERT`, `UPDATE`, `DELETE` and `SELECT` statements for
//! `MySQL` and Oracle:
//!
//! ```
//! use datafusion::sql::TableReference;
//! use sql_table_io::sql::arrow_sql_gen::statement::{FieldMap, RowId, SelectBuilder, UpdateBuilder};
//!
//! let orders = TableReference::bare("orders");
//!
//! let select = SelectBuilder::table(&orders).build_oracle().unwrap();
//! assert_eq!(select.sql(), "SELECT * FROM orders");
//!
//! let update = UpdateBuilder::new(&orders, FieldMap::new().with("status", "shipped"))
//!     .row_id("AB1C2".parse::<RowId>().unwrap())
//!     .build_oracle()
//!     .unwrap();
//! assert_eq!(update.sql(), "UPDATE orders SET status = :1 WHERE ROWID = :2");
//! assert_eq!(
//!     update.to_string(),
//!     "UPDATE orders SET status = 'shipped' WHERE ROWID = 'AB1C2'"
//! );
//! ```

#[cfg(any(feature = "mysql", feature = "oracle"))]
pub mod arrow;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod statement;
