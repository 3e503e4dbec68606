//! Oracle rendering for the statement builders.
//!
//! Identifiers are written unquoted, so each dotted part must match
//! `[A-Za-z][A-Za-z0-9_$#]*` and fit in 128 bytes. Values are bound through numbered
//! placeholders (`:1`, `:2`, ...) while a literal rendering is kept alongside for logging.

use datafusion::sql::TableReference;
use sea_query::Value;
use snafu::prelude::*;

use super::{is_null, Filter, InvalidIdentifierSnafu, Result, Statement};

const MAX_IDENTIFIER_LENGTH: usize = 128;

pub(super) struct OracleWriter {
    sql: String,
    inlined: String,
    values: Vec<Value>,
}

impl OracleWriter {
    pub(super) fn new() -> Self {
        Self {
            sql: String::new(),
            inlined: String::new(),
            values: Vec::new(),
        }
    }

    /// Appends SQL text to both renderings.
    pub(super) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
        self.inlined.push_str(text);
    }

    pub(super) fn push_identifier(&mut self, identifier: &str) -> Result<()> {
        ensure!(
            is_valid_identifier(identifier),
            InvalidIdentifierSnafu { identifier }
        );
        self.push(identifier);
        Ok(())
    }

    pub(super) fn push_identifier_list<T: AsRef<str>>(&mut self, identifiers: &[T]) -> Result<()> {
        for (i, identifier) in identifiers.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_identifier(identifier.as_ref())?;
        }
        Ok(())
    }

    pub(super) fn push_table(&mut self, table: &TableReference) -> Result<()> {
        if let Some(catalog) = table.catalog() {
            self.push_identifier(catalog)?;
            self.push(".");
        }
        if let Some(schema) = table.schema() {
            self.push_identifier(schema)?;
            self.push(".");
        }
        self.push_identifier(table.table())
    }

    /// Binds `value` to the next placeholder. Nulls are written as the `NULL` keyword.
    pub(super) fn push_value(&mut self, value: &Value) {
        if is_null(value) {
            self.push("NULL");
            return;
        }

        self.values.push(value.clone());
        self.sql.push(':');
        self.sql.push_str(&self.values.len().to_string());
        self.inlined.push_str(&literal(value));
    }

    /// Appends ` WHERE ...` for a non-empty filter.
    pub(super) fn push_filter(&mut self, filter: &Filter) -> Result<()> {
        match filter {
            Filter::RowId(row_id) => {
                self.push(" WHERE ");
                self.push(row_id.key_column());
                self.push(" = ");
                self.push_value(&row_id.value());
            }
            Filter::Equals(fields) => {
                for (i, (column, value)) in fields.iter().enumerate() {
                    self.push(if i == 0 { " WHERE " } else { " AND " });
                    self.push_identifier(column)?;
                    if is_null(value) {
                        self.push(" IS NULL");
                    } else {
                        self.push(" = ");
                        self.push_value(value);
                    }
                }
            }
            Filter::Predicates(conditions) => {
                // Each predicate is grouped so an OR inside one cannot bind across the AND.
                let grouped = conditions.iter().nth(1).is_some();
                for (i, predicate) in conditions.iter().enumerate() {
                    self.push(if i == 0 { " WHERE " } else { " AND " });
                    if grouped {
                        self.push("(");
                        self.push(predicate);
                        self.push(")");
                    } else {
                        self.push(predicate);
                    }
                }
            }
        }
        Ok(())
    }

    pub(super) fn finish(self) -> Statement {
        Statement::new(self.sql, self.values, self.inlined)
    }
}

pub(crate) fn is_valid_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    identifier.len() <= MAX_IDENTIFIER_LENGTH
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Literal form of a non-null value.
fn literal(value: &Value) -> String {
    match value {
        Value::Bool(Some(v)) => if *v { "1" } else { "0" }.to_string(),
        Value::TinyInt(Some(v)) => v.to_string(),
        Value::SmallInt(Some(v)) => v.to_string(),
        Value::Int(Some(v)) => v.to_string(),
        Value::BigInt(Some(v)) => v.to_string(),
        Value::TinyUnsigned(Some(v)) => v.to_string(),
        Value::SmallUnsigned(Some(v)) => v.to_string(),
        Value::Unsigned(Some(v)) => v.to_string(),
        Value::BigUnsigned(Some(v)) => v.to_string(),
        Value::Float(Some(v)) => v.to_string(),
        Value::Double(Some(v)) => v.to_string(),
        Value::String(Some(v)) => quote(v.as_str()),
        Value::Char(Some(v)) => quote(&v.to_string()),
        Value::Bytes(Some(v)) => {
            let hex: String = v.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("HEXTORAW('{hex}')")
        }
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("ORDERS"));
        assert!(is_valid_identifier("order_items$2#"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("_orders"));
        assert!(!is_valid_identifier("2orders"));
        assert!(!is_valid_identifier("orders x"));
        assert!(!is_valid_identifier(&"a".repeat(129)));
    }

    #[test]
    fn test_values_are_numbered_and_inlined() {
        let mut writer = OracleWriter::new();
        writer.push("VALUES (");
        writer.push_value(&Value::from("O'Brien"));
        writer.push(", ");
        writer.push_value(&Value::Int(None));
        writer.push(", ");
        writer.push_value(&Value::Double(Some(2.5)));
        writer.push(", ");
        writer.push_value(&Value::from(vec![0x0A_u8, 0xFF]));
        writer.push(")");

        let stmt = writer.finish();
        assert_eq!(stmt.sql(), "VALUES (:1, NULL, :2, :3)");
        assert_eq!(
            stmt.inlined(),
            "VALUES ('O''Brien', NULL, 2.5, HEXTORAW('0AFF'))"
        );
        assert_eq!(stmt.values().len(), 3);
    }

    #[test]
    fn test_qualified_table() {
        let mut writer = OracleWriter::new();
        writer
            .push_table(&TableReference::partial("sales", "orders"))
            .expect("valid table name");
        assert_eq!(writer.finish().sql(), "sales.orders");
    }

    #[test]
    fn test_predicates_keep_their_precedence() {
        let mut writer = OracleWriter::new();
        writer.push("DELETE FROM orders");
        writer
            .push_filter(&Filter::Predicates(
                vec!["STATUS = 'x' OR STATUS = 'y'", "REGION = 'EU'"].into(),
            ))
            .expect("predicates need no validation");
        assert_eq!(
            writer.finish().sql(),
            "DELETE FROM orders WHERE (STATUS = 'x' OR STATUS = 'y') AND (REGION = 'EU')"
        );

        let mut writer = OracleWriter::new();
        writer.push("DELETE FROM orders");
        writer
            .push_filter(&Filter::Predicates("STATUS = 'x' OR STATUS = 'y'".into()))
            .expect("predicates need no validation");
        assert_eq!(
            writer.finish().sql(),
            "DELETE FROM orders WHERE STATUS = 'x' OR STATUS = 'y'"
        );
    }
}
