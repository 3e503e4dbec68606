#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//! Read and write Arrow record batches against MySQL and Oracle.
//!
//! The crate has two halves:
//!
//! - [`sql::arrow_sql_gen::statement`] turns table names, field maps and record batches into
//!   parameterized `SELECT`/`INSERT`/`UPDATE`/`DELETE`/`CREATE TABLE` statements for either dialect.
//! - [`sql::bulk_load`] serializes record batches into the flat files consumed by the databases'
//!   native bulk loaders (SQL*Loader control + data files, MySQL `LOAD DATA LOCAL INFILE`).
//!
//! Executing statements is delegated to the connection layer in [`sql::db_connection_pool`],
//! with convenience facades in `mysql` and `oracle` behind the features of the same name.

use serde::{Deserialize, Serialize};

pub mod sql;
pub mod util;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;

/// What to do with a column whose Arrow type has no entry in the type conversion map.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedTypeAction {
    /// Refuse to create the table if any unsupported types are found
    #[default]
    Error,
    /// Log a warning for any unsupported types and leave the column out
    Warn,
    /// Ignore any unsupported types (i.e. skip them)
    Ignore,
    /// Declare any unsupported types with the text declaration of the map
    String,
}
