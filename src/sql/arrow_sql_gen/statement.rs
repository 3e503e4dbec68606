use std::{collections::HashMap, collections::HashSet, fmt, str::FromStr, sync::Arc};

use datafusion::arrow::{
    array::{self, Array, RecordBatch},
    datatypes::{DataType, Field, SchemaRef},
};
use datafusion::sql::TableReference;
use sea_query::{
    Alias, Asterisk, ColumnDef, ColumnType, Expr, Index, IntoIden, IntoIndexColumn, Keyword,
    MysqlQueryBuilder, Query, SeaRc, SimpleExpr, Table, TableRef, Value,
};
use snafu::prelude::*;

use crate::UnsupportedTypeAction;

mod oracle;

pub(crate) use self::oracle::is_valid_identifier;
use self::oracle::OracleWriter;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to build insert statement: {source}"))]
    FailedToCreateInsertStatement {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Unimplemented data type in insert statement: {data_type:?}"))]
    UnimplementedDataTypeInInsertStatement { data_type: DataType },

    #[snafu(display(
        "Column '{column}' has data type {data_type} which has no column type mapping"
    ))]
    UnknownColumnType { column: String, data_type: DataType },

    #[snafu(display("Cannot create table '{table}' without any columns"))]
    NoColumns { table: String },

    #[snafu(display("The field map for table '{table}' is empty"))]
    EmptyFieldMap { table: String },

    #[snafu(display("No rows were selected for insertion into table '{table}'"))]
    NoRowsToInsert { table: String },

    #[snafu(display("Row index {index} is out of bounds for a dataset of {num_rows} rows"))]
    RowIndexOutOfBounds { index: usize, num_rows: usize },

    #[snafu(display(
        "Record batch has {found} columns but the first batch of the dataset has {expected}"
    ))]
    MismatchedColumnCount { expected: usize, found: usize },

    #[snafu(display("Invalid row identifier '{value}': expected a row address or an integer id"))]
    InvalidRowId { value: String },

    #[snafu(display("{dialect} tables have no physical row address, cannot filter on ROWID '{row_id}'"))]
    RowAddressUnsupported { dialect: Dialect, row_id: String },

    #[snafu(display("Invalid identifier '{identifier}'"))]
    InvalidIdentifier { identifier: String },

    #[snafu(display("At least one index column is required to update rows of '{table}'"))]
    MissingIndex { table: String },

    #[snafu(display("Index column '{column}' is not part of the dataset"))]
    MissingIndexColumn { column: String },

    #[snafu(display("No columns are left to update once the index columns {index:?} are excluded"))]
    NothingToUpdate { index: Vec<String> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) const ROW_ADDRESS_COLUMN: &str = "ROWID";
pub(crate) const ID_COLUMN: &str = "ID";

/// The SQL dialect a statement is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Oracle,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::MySql => write!(f, "MySQL"),
            Dialect::Oracle => write!(f, "Oracle"),
        }
    }
}

/// A rendered statement.
///
/// `sql` carries placeholders (`?` for `MySQL`, `:1, :2, ...` for Oracle) and `values` the
/// parameters to bind, in placeholder order. `inlined` is the same statement with the values
/// written as literals; it is meant for logs and is what [`fmt::Display`] prints.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    values: Vec<Value>,
    inlined: String,
}

impl Statement {
    pub(crate) fn new(sql: String, values: Vec<Value>, inlined: String) -> Self {
        Self {
            sql,
            values,
            inlined,
        }
    }

    pub(crate) fn unparameterized(sql: String) -> Self {
        Self {
            inlined: sql.clone(),
            sql,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn inlined(&self) -> &str {
        &self.inlined
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.values)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inlined)
    }
}

macro_rules! mysql_statement {
    ($stmt:expr) => {{
        let (sql, values) = $stmt.build(MysqlQueryBuilder);
        Statement::new(sql, values.0, $stmt.to_string(MysqlQueryBuilder))
    }};
}

/// Identifies a single row, either by its physical address (`ROWID`) or by the `ID` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowId {
    Id(i64),
    RowAddress(String),
}

impl RowId {
    /// The column the row identifier is matched against.
    #[must_use]
    pub fn key_column(&self) -> &'static str {
        match self {
            RowId::Id(_) => ID_COLUMN,
            RowId::RowAddress(_) => ROW_ADDRESS_COLUMN,
        }
    }

    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            RowId::Id(id) => Value::BigInt(Some(*id)),
            RowId::RowAddress(address) => address.as_str().into(),
        }
    }
}

impl FromStr for RowId {
    type Err = Error;

    /// Text starting with an ASCII letter is a row address, anything else must be an integer id.
    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Ok(RowId::RowAddress(s.to_string()));
        }

        s.trim()
            .parse::<i64>()
            .map(RowId::Id)
            .map_err(|_| Error::InvalidRowId {
                value: s.to_string(),
            })
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        RowId::Id(id)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Id(id) => write!(f, "{id}"),
            RowId::RowAddress(address) => f.write_str(address),
        }
    }
}

/// Ordered column to value assignments.
///
/// Inserting a column that is already present replaces its value in place, so the column order
/// of the generated SQL is the order in which columns were first inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: Vec<(String, Value)>,
}

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `value`, returning the previous value if the column was already present.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((column, value));
                None
            }
        }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(column, value)| (column.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(column, _)| column.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMap
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut field_map = FieldMap::new();
        for (column, value) in iter {
            field_map.insert(column, value);
        }
        field_map
    }
}

/// Raw SQL predicates, combined with `AND`.
///
/// Predicates are embedded verbatim and must come from trusted code. Blank predicates are
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(Vec<String>);

impl Conditions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn and(mut self, predicate: impl Into<String>) -> Self {
        self.push(predicate.into());
        self
    }

    fn push(&mut self, predicate: String) {
        if !predicate.trim().is_empty() {
            self.0.push(predicate);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for Conditions {
    fn from(predicate: &str) -> Self {
        Conditions::new().and(predicate)
    }
}

impl From<String> for Conditions {
    fn from(predicate: String) -> Self {
        Conditions::new().and(predicate)
    }
}

impl<T: Into<String>> From<Vec<T>> for Conditions {
    fn from(predicates: Vec<T>) -> Self {
        let mut conditions = Conditions::new();
        for predicate in predicates {
            conditions.push(predicate.into());
        }
        conditions
    }
}

/// Row selection shared by updates and deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    RowId(RowId),
    /// Every column of the map equals its value; a null value matches `IS NULL`.
    Equals(FieldMap),
    Predicates(Conditions),
}

impl Filter {
    fn is_empty(&self) -> bool {
        match self {
            Filter::RowId(_) => false,
            Filter::Equals(fields) => fields.is_empty(),
            Filter::Predicates(conditions) => conditions.is_empty(),
        }
    }

    fn mysql_exprs(&self) -> Result<Vec<SimpleExpr>> {
        match self {
            Filter::RowId(RowId::RowAddress(address)) => RowAddressUnsupportedSnafu {
                dialect: Dialect::MySql,
                row_id: address.clone(),
            }
            .fail(),
            Filter::RowId(row_id) => {
                Ok(vec![Expr::col(Alias::new(row_id.key_column())).eq(row_id.value())])
            }
            Filter::Equals(fields) => Ok(fields
                .iter()
                .map(|(column, value)| {
                    if is_null(value) {
                        Expr::col(Alias::new(column)).is_null()
                    } else {
                        Expr::col(Alias::new(column)).eq(value.clone())
                    }
                })
                .collect()),
            Filter::Predicates(conditions) => Ok(conditions.iter().map(Expr::cust).collect()),
        }
    }
}

impl From<RowId> for Filter {
    fn from(row_id: RowId) -> Self {
        Filter::RowId(row_id)
    }
}

impl From<Conditions> for Filter {
    fn from(conditions: Conditions) -> Self {
        Filter::Predicates(conditions)
    }
}

/// Maps Arrow data types to the column declarations used by `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConversionMap {
    declarations: HashMap<DataType, String>,
}

impl TypeConversionMap {
    fn from_entries(text: &str, integer: &str, decimal: &str) -> Self {
        let declarations = [
            (DataType::Utf8, text),
            (DataType::LargeUtf8, text),
            (DataType::Utf8View, text),
            (DataType::Int64, integer),
            (DataType::Float32, decimal),
            (DataType::Float64, decimal),
        ]
        .into_iter()
        .map(|(data_type, declaration)| (data_type, declaration.to_string()))
        .collect();

        Self { declarations }
    }

    #[must_use]
    pub fn mysql() -> Self {
        Self::from_entries("VARCHAR(255)", "INT", "DECIMAL(20,6)")
    }

    #[must_use]
    pub fn oracle() -> Self {
        Self::from_entries("VARCHAR2(255)", "NUMBER(19)", "NUMBER(20,6)")
    }

    #[must_use]
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::MySql => Self::mysql(),
            Dialect::Oracle => Self::oracle(),
        }
    }

    /// Adds or replaces the declaration used for `data_type`.
    #[must_use]
    pub fn with_mapping(mut self, data_type: DataType, declaration: impl Into<String>) -> Self {
        self.declarations.insert(data_type, declaration.into());
        self
    }

    #[must_use]
    pub fn lookup(&self, data_type: &DataType) -> Option<&str> {
        self.declarations.get(data_type).map(String::as_str)
    }
}

pub struct CreateTableBuilder {
    schema: SchemaRef,
    table: TableReference,
    primary_keys: Vec<String>,
    type_map: Option<TypeConversionMap>,
    unsupported_type_action: UnsupportedTypeAction,
}

impl CreateTableBuilder {
    #[must_use]
    pub fn new(schema: SchemaRef, table: &TableReference) -> Self {
        Self {
            schema,
            table: table.clone(),
            primary_keys: Vec::new(),
            type_map: None,
            unsupported_type_action: UnsupportedTypeAction::default(),
        }
    }

    #[must_use]
    pub fn primary_keys<T>(mut self, keys: Vec<T>) -> Self
    where
        T: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the dialect's default type conversion map.
    #[must_use]
    pub fn type_conversion_map(mut self, type_map: TypeConversionMap) -> Self {
        self.type_map = Some(type_map);
        self
    }

    #[must_use]
    pub fn unsupported_type_action(mut self, action: UnsupportedTypeAction) -> Self {
        self.unsupported_type_action = action;
        self
    }

    #[must_use]
    pub fn table(&self) -> &TableReference {
        &self.table
    }

    /// Names of the schema fields that get a column in `dialect`, in schema order.
    ///
    /// # Errors
    ///
    /// Returns an error if a column type has no mapping or no column is left to create.
    pub fn column_names(&self, dialect: Dialect) -> Result<Vec<String>> {
        Ok(self
            .column_declarations(dialect)?
            .into_iter()
            .map(|(field, _)| field.name().clone())
            .collect())
    }

    /// # Errors
    ///
    /// Returns an error if a column type has no mapping or no column is left to create.
    pub fn build_mysql(&self) -> Result<Statement> {
        let columns = self.column_declarations(Dialect::MySql)?;

        let mut create_stmt = Table::create();
        create_stmt.table(table_reference_to_sea_table_ref(&self.table));

        for (field, declaration) in columns {
            let column_type = ColumnType::Custom(Alias::new(declaration).into_iden());
            let mut column_def = ColumnDef::new_with_type(Alias::new(field.name()), column_type);
            if !field.is_nullable() {
                column_def.not_null();
            }

            create_stmt.col(&mut column_def);
        }

        if !self.primary_keys.is_empty() {
            let mut index = Index::create();
            index.primary();
            for key in &self.primary_keys {
                index.col(Alias::new(key).into_iden().into_index_column());
            }
            create_stmt.primary_key(&mut index);
        }

        Ok(Statement::unparameterized(
            create_stmt.to_string(MysqlQueryBuilder),
        ))
    }

    /// # Errors
    ///
    /// Returns an error if a column type has no mapping, no column is left to create or an
    /// identifier is not a valid Oracle identifier.
    pub fn build_oracle(&self) -> Result<Statement> {
        let columns = self.column_declarations(Dialect::Oracle)?;

        let mut writer = OracleWriter::new();
        writer.push("CREATE TABLE ");
        writer.push_table(&self.table)?;
        writer.push(" ( ");
        for (i, (field, declaration)) in columns.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.push_identifier(field.name())?;
            writer.push(" ");
            writer.push(declaration);
            if !field.is_nullable() {
                writer.push(" NOT NULL");
            }
        }
        if !self.primary_keys.is_empty() {
            writer.push(", PRIMARY KEY (");
            writer.push_identifier_list(&self.primary_keys)?;
            writer.push(")");
        }
        writer.push(" )");

        Ok(writer.finish())
    }

    /// # Errors
    ///
    /// See [`CreateTableBuilder::build_mysql`] and [`CreateTableBuilder::build_oracle`].
    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        match dialect {
            Dialect::MySql => self.build_mysql(),
            Dialect::Oracle => self.build_oracle(),
        }
    }

    fn column_declarations(&self, dialect: Dialect) -> Result<Vec<(Arc<Field>, String)>> {
        let default_map;
        let type_map = match &self.type_map {
            Some(type_map) => type_map,
            None => {
                default_map = TypeConversionMap::for_dialect(dialect);
                &default_map
            }
        };

        let mut columns = Vec::with_capacity(self.schema.fields().len());
        for field in self.schema.fields() {
            let declaration = match type_map.lookup(field.data_type()) {
                Some(declaration) => declaration.to_string(),
                None => match self.unsupported_type_action {
                    UnsupportedTypeAction::Error => {
                        return UnknownColumnTypeSnafu {
                            column: field.name().clone(),
                            data_type: field.data_type().clone(),
                        }
                        .fail();
                    }
                    UnsupportedTypeAction::Warn => {
                        tracing::warn!(
                            "Leaving column '{}' out of table '{}': no column type mapping for {}",
                            field.name(),
                            self.table,
                            field.data_type()
                        );
                        continue;
                    }
                    UnsupportedTypeAction::Ignore => continue,
                    UnsupportedTypeAction::String => match type_map.lookup(&DataType::Utf8) {
                        Some(declaration) => declaration.to_string(),
                        None => {
                            return UnknownColumnTypeSnafu {
                                column: field.name().clone(),
                                data_type: field.data_type().clone(),
                            }
                            .fail();
                        }
                    },
                },
            };
            columns.push((Arc::clone(field), declaration));
        }

        ensure!(
            !columns.is_empty(),
            NoColumnsSnafu {
                table: self.table.to_string(),
            }
        );

        Ok(columns)
    }
}

macro_rules! push_value {
    ($row_values:expr, $column:expr, $row:expr, $array_type:ident) => {{
        if let Some(valid_array) = $column.as_any().downcast_ref::<array::$array_type>() {
            $row_values.push(valid_array.value($row).into());
        }
    }};
}

/// Reads the value at `row` of an Arrow column. Nulls become a null string value.
///
/// # Errors
///
/// Returns an error if the column's data type has no scalar representation.
pub fn array_value(column: &dyn Array, row: usize) -> Result<Value> {
    if column.is_null(row) {
        return Ok(Value::String(None));
    }

    let mut values: Vec<Value> = Vec::with_capacity(1);
    match column.data_type() {
        DataType::Int8 => push_value!(values, column, row, Int8Array),
        DataType::Int16 => push_value!(values, column, row, Int16Array),
        DataType::Int32 => push_value!(values, column, row, Int32Array),
        DataType::Int64 => push_value!(values, column, row, Int64Array),
        DataType::UInt8 => push_value!(values, column, row, UInt8Array),
        DataType::UInt16 => push_value!(values, column, row, UInt16Array),
        DataType::UInt32 => push_value!(values, column, row, UInt32Array),
        DataType::UInt64 => push_value!(values, column, row, UInt64Array),
        DataType::Float32 => push_value!(values, column, row, Float32Array),
        DataType::Float64 => push_value!(values, column, row, Float64Array),
        DataType::Utf8 => push_value!(values, column, row, StringArray),
        DataType::LargeUtf8 => push_value!(values, column, row, LargeStringArray),
        DataType::Utf8View => push_value!(values, column, row, StringViewArray),
        DataType::Boolean => push_value!(values, column, row, BooleanArray),
        DataType::Null => values.push(Value::String(None)),
        data_type => {
            return UnimplementedDataTypeInInsertStatementSnafu {
                data_type: data_type.clone(),
            }
            .fail();
        }
    }

    values
        .pop()
        .context(UnimplementedDataTypeInInsertStatementSnafu {
            data_type: column.data_type().clone(),
        })
}

/// Whether a value is a SQL null, whatever its type.
#[must_use]
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
    )
}

fn value_expr(value: &Value) -> SimpleExpr {
    if is_null(value) {
        Keyword::Null.into()
    } else {
        SimpleExpr::Value(value.clone())
    }
}

/// Most placeholders MySQL accepts in one prepared statement.
pub const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;

enum InsertSource {
    RecordBatches(Vec<RecordBatch>),
    Fields(FieldMap),
}

pub struct InsertBuilder {
    table: TableReference,
    source: InsertSource,
    rows: Option<Vec<usize>>,
}

impl InsertBuilder {
    /// Inserts every row of `record_batches`. Column names are taken from the first batch.
    #[must_use]
    pub fn new(table: &TableReference, record_batches: Vec<RecordBatch>) -> Self {
        Self {
            table: table.clone(),
            source: InsertSource::RecordBatches(record_batches),
            rows: None,
        }
    }

    /// Inserts a single row built from a field map.
    #[must_use]
    pub fn from_field_map(table: &TableReference, fields: FieldMap) -> Self {
        Self {
            table: table.clone(),
            source: InsertSource::Fields(fields),
            rows: None,
        }
    }

    /// Restricts the insert to the given row indexes, counted across all record batches.
    #[must_use]
    pub fn rows(mut self, rows: Vec<usize>) -> Self {
        self.rows = Some(rows);
        self
    }

    fn columns_and_rows(&self) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        match &self.source {
            InsertSource::Fields(fields) => {
                ensure!(
                    !fields.is_empty(),
                    EmptyFieldMapSnafu {
                        table: self.table.to_string(),
                    }
                );
                let columns = fields.columns().map(str::to_string).collect();
                let values = fields.iter().map(|(_, value)| value.clone()).collect();
                Ok((columns, vec![values]))
            }
            InsertSource::RecordBatches(record_batches) => {
                let Some(first) = record_batches.first() else {
                    return NoRowsToInsertSnafu {
                        table: self.table.to_string(),
                    }
                    .fail();
                };
                let columns: Vec<String> = first
                    .schema()
                    .fields()
                    .iter()
                    .map(|field| field.name().clone())
                    .collect();

                let num_rows: usize = record_batches.iter().map(RecordBatch::num_rows).sum();
                let selected: Option<HashSet<usize>> = match &self.rows {
                    Some(rows) => {
                        if let Some(&index) = rows.iter().find(|&&index| index >= num_rows) {
                            return RowIndexOutOfBoundsSnafu { index, num_rows }.fail();
                        }
                        Some(rows.iter().copied().collect())
                    }
                    None => None,
                };

                let mut rows = Vec::new();
                let mut offset = 0;
                for record_batch in record_batches {
                    ensure!(
                        record_batch.num_columns() == columns.len(),
                        MismatchedColumnCountSnafu {
                            expected: columns.len(),
                            found: record_batch.num_columns(),
                        }
                    );
                    for row in 0..record_batch.num_rows() {
                        if selected
                            .as_ref()
                            .is_some_and(|selected| !selected.contains(&(offset + row)))
                        {
                            continue;
                        }
                        let values = record_batch
                            .columns()
                            .iter()
                            .map(|column| array_value(column.as_ref(), row))
                            .collect::<Result<Vec<_>>>()?;
                        rows.push(values);
                    }
                    offset += record_batch.num_rows();
                }

                ensure!(
                    !rows.is_empty(),
                    NoRowsToInsertSnafu {
                        table: self.table.to_string(),
                    }
                );
                Ok((columns, rows))
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if there is nothing to insert or a column's data type is not supported.
    pub fn build_mysql(&self) -> Result<Statement> {
        let (columns, rows) = self.columns_and_rows()?;
        self.mysql_insert(&columns, &rows)
    }

    /// Splits the insert into statements that each bind at most `max_placeholders` values.
    ///
    /// Rows are never split, so a row binding more values than the limit gets a statement of
    /// its own. Nulls are written as keywords and do not count.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to insert or a column's data type is not supported.
    pub fn build_mysql_chunked(&self, max_placeholders: usize) -> Result<Vec<Statement>> {
        let (columns, rows) = self.columns_and_rows()?;

        let mut statements = Vec::new();
        let mut start = 0;
        let mut bound = 0;
        for (i, row) in rows.iter().enumerate() {
            let row_bound = row.iter().filter(|value| !is_null(value)).count();
            if i > start && bound + row_bound > max_placeholders {
                statements.push(self.mysql_insert(&columns, &rows[start..i])?);
                start = i;
                bound = 0;
            }
            bound += row_bound;
        }
        statements.push(self.mysql_insert(&columns, &rows[start..])?);

        Ok(statements)
    }

    fn mysql_insert(&self, columns: &[String], rows: &[Vec<Value>]) -> Result<Statement> {
        let mut insert_stmt = Query::insert()
            .into_table(table_reference_to_sea_table_ref(&self.table))
            .columns(columns.iter().map(Alias::new))
            .to_owned();

        for row in rows {
            insert_stmt
                .values(row.iter().map(value_expr))
                .map_err(|e| Error::FailedToCreateInsertStatement {
                    source: Box::new(e),
                })?;
        }

        Ok(mysql_statement!(insert_stmt))
    }

    /// A single row renders as `INSERT INTO`, several rows as `INSERT ALL ... SELECT 1 FROM DUAL`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to insert, a column's data type is not supported or
    /// an identifier is not a valid Oracle identifier.
    pub fn build_oracle(&self) -> Result<Statement> {
        let (columns, rows) = self.columns_and_rows()?;

        let mut writer = OracleWriter::new();
        let multi_row = rows.len() > 1;
        if multi_row {
            writer.push("INSERT ALL");
        }
        for row in &rows {
            writer.push(if multi_row { " INTO " } else { "INSERT INTO " });
            writer.push_table(&self.table)?;
            writer.push(" (");
            writer.push_identifier_list(&columns)?;
            writer.push(") VALUES (");
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    writer.push(", ");
                }
                writer.push_value(value);
            }
            writer.push(")");
        }
        if multi_row {
            writer.push(" SELECT 1 FROM DUAL");
        }

        Ok(writer.finish())
    }

    /// # Errors
    ///
    /// See [`InsertBuilder::build_mysql`] and [`InsertBuilder::build_oracle`].
    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        match dialect {
            Dialect::MySql => self.build_mysql(),
            Dialect::Oracle => self.build_oracle(),
        }
    }
}

pub struct UpdateBuilder {
    table: TableReference,
    fields: FieldMap,
    filter: Option<Filter>,
}

impl UpdateBuilder {
    #[must_use]
    pub fn new(table: &TableReference, fields: FieldMap) -> Self {
        Self {
            table: table.clone(),
            fields,
            filter: None,
        }
    }

    #[must_use]
    pub fn row_id(self, row_id: RowId) -> Self {
        self.filter(Filter::RowId(row_id))
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn active_filter(&self) -> Option<&Filter> {
        self.filter.as_ref().filter(|filter| !filter.is_empty())
    }

    /// # Errors
    ///
    /// Returns an error if the field map is empty or the filter uses a row address.
    pub fn build_mysql(&self) -> Result<Statement> {
        ensure!(
            !self.fields.is_empty(),
            EmptyFieldMapSnafu {
                table: self.table.to_string(),
            }
        );

        let mut update_stmt = Query::update()
            .table(table_reference_to_sea_table_ref(&self.table))
            .values(
                self.fields
                    .iter()
                    .map(|(column, value)| (Alias::new(column), value_expr(value))),
            )
            .to_owned();

        if let Some(filter) = self.active_filter() {
            for expr in filter.mysql_exprs()? {
                update_stmt.and_where(expr);
            }
        }

        Ok(mysql_statement!(update_stmt))
    }

    /// # Errors
    ///
    /// Returns an error if the field map is empty or an identifier is not a valid Oracle
    /// identifier.
    pub fn build_oracle(&self) -> Result<Statement> {
        ensure!(
            !self.fields.is_empty(),
            EmptyFieldMapSnafu {
                table: self.table.to_string(),
            }
        );

        let mut writer = OracleWriter::new();
        writer.push("UPDATE ");
        writer.push_table(&self.table)?;
        writer.push(" SET ");
        for (i, (column, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.push_identifier(column)?;
            writer.push(" = ");
            writer.push_value(value);
        }
        if let Some(filter) = self.active_filter() {
            writer.push_filter(filter)?;
        }

        Ok(writer.finish())
    }

    /// # Errors
    ///
    /// See [`UpdateBuilder::build_mysql`] and [`UpdateBuilder::build_oracle`].
    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        match dialect {
            Dialect::MySql => self.build_mysql(),
            Dialect::Oracle => self.build_oracle(),
        }
    }
}

/// Updates each row of a dataset, matching rows on the index columns and setting the rest.
pub struct IndexedUpdateBuilder {
    table: TableReference,
    record_batches: Vec<RecordBatch>,
    index: Vec<String>,
}

impl IndexedUpdateBuilder {
    #[must_use]
    pub fn new<T>(table: &TableReference, record_batches: Vec<RecordBatch>, index: Vec<T>) -> Self
    where
        T: Into<String>,
    {
        Self {
            table: table.clone(),
            record_batches,
            index: index.into_iter().map(Into::into).collect(),
        }
    }

    /// Produces one statement per row, in dataset order.
    ///
    /// # Errors
    ///
    /// Returns an error if no index is given, an index column is missing from the dataset, no
    /// column is left to update or a value cannot be read.
    pub fn build(&self, dialect: Dialect) -> Result<Vec<Statement>> {
        ensure!(
            !self.index.is_empty(),
            MissingIndexSnafu {
                table: self.table.to_string(),
            }
        );

        let mut statements = Vec::new();
        for record_batch in &self.record_batches {
            let schema = record_batch.schema();
            for column in &self.index {
                ensure!(
                    schema.column_with_name(column).is_some(),
                    MissingIndexColumnSnafu {
                        column: column.clone(),
                    }
                );
            }
            ensure!(
                schema.fields().len() > self.index.len(),
                NothingToUpdateSnafu {
                    index: self.index.clone(),
                }
            );

            for row in 0..record_batch.num_rows() {
                let mut assignments = FieldMap::new();
                let mut keys = FieldMap::new();
                for (field, column) in schema.fields().iter().zip(record_batch.columns()) {
                    let value = array_value(column.as_ref(), row)?;
                    if self.index.contains(field.name()) {
                        keys.insert(field.name().clone(), value);
                    } else {
                        assignments.insert(field.name().clone(), value);
                    }
                }

                statements.push(
                    UpdateBuilder::new(&self.table, assignments)
                        .filter(Filter::Equals(keys))
                        .build(dialect)?,
                );
            }
        }

        Ok(statements)
    }
}

pub struct DeleteBuilder {
    table: TableReference,
    filter: Option<Filter>,
}

impl DeleteBuilder {
    /// Without a filter every row of the table is deleted.
    #[must_use]
    pub fn new(table: &TableReference) -> Self {
        Self {
            table: table.clone(),
            filter: None,
        }
    }

    #[must_use]
    pub fn row_id(self, row_id: RowId) -> Self {
        self.filter(Filter::RowId(row_id))
    }

    #[must_use]
    pub fn conditions(self, conditions: impl Into<Conditions>) -> Self {
        self.filter(Filter::Predicates(conditions.into()))
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn active_filter(&self) -> Option<&Filter> {
        self.filter.as_ref().filter(|filter| !filter.is_empty())
    }

    /// # Errors
    ///
    /// Returns an error if the filter uses a row address.
    pub fn build_mysql(&self) -> Result<Statement> {
        let mut delete_stmt = Query::delete()
            .from_table(table_reference_to_sea_table_ref(&self.table))
            .to_owned();

        if let Some(filter) = self.active_filter() {
            for expr in filter.mysql_exprs()? {
                delete_stmt.and_where(expr);
            }
        }

        Ok(mysql_statement!(delete_stmt))
    }

    /// # Errors
    ///
    /// Returns an error if an identifier is not a valid Oracle identifier.
    pub fn build_oracle(&self) -> Result<Statement> {
        let mut writer = OracleWriter::new();
        writer.push("DELETE FROM ");
        writer.push_table(&self.table)?;
        if let Some(filter) = self.active_filter() {
            writer.push_filter(filter)?;
        }

        Ok(writer.finish())
    }

    /// # Errors
    ///
    /// See [`DeleteBuilder::build_mysql`] and [`DeleteBuilder::build_oracle`].
    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        match dialect {
            Dialect::MySql => self.build_mysql(),
            Dialect::Oracle => self.build_oracle(),
        }
    }
}

pub struct SelectBuilder {
    table: TableReference,
    columns: Option<Vec<String>>,
    conditions: Conditions,
}

impl SelectBuilder {
    /// Selects every column of `table`.
    #[must_use]
    pub fn table(table: &TableReference) -> Self {
        Self {
            table: table.clone(),
            columns: None,
            conditions: Conditions::new(),
        }
    }

    /// Selects only the columns named by `schema`.
    #[must_use]
    pub fn columns(table: &TableReference, schema: &SchemaRef) -> Self {
        Self {
            table: table.clone(),
            columns: Some(
                schema
                    .fields()
                    .iter()
                    .map(|field| field.name().clone())
                    .collect(),
            ),
            conditions: Conditions::new(),
        }
    }

    #[must_use]
    pub fn conditions(mut self, conditions: impl Into<Conditions>) -> Self {
        self.conditions = conditions.into();
        self
    }

    #[must_use]
    pub fn build_mysql(&self) -> Statement {
        let mut select_stmt = Query::select();
        match &self.columns {
            Some(columns) => select_stmt.columns(columns.iter().map(Alias::new)),
            None => select_stmt.column(Asterisk),
        };
        select_stmt.from(table_reference_to_sea_table_ref(&self.table));
        for predicate in self.conditions.iter() {
            select_stmt.and_where(Expr::cust(predicate));
        }

        mysql_statement!(select_stmt)
    }

    /// # Errors
    ///
    /// Returns an error if an identifier is not a valid Oracle identifier.
    pub fn build_oracle(&self) -> Result<Statement> {
        let mut writer = OracleWriter::new();
        writer.push("SELECT ");
        match &self.columns {
            Some(columns) => writer.push_identifier_list(columns)?,
            None => writer.push("*"),
        }
        writer.push(" FROM ");
        writer.push_table(&self.table)?;
        writer.push_filter(&Filter::Predicates(self.conditions.clone()))?;

        Ok(writer.finish())
    }

    /// # Errors
    ///
    /// See [`SelectBuilder::build_oracle`].
    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        match dialect {
            Dialect::MySql => Ok(self.build_mysql()),
            Dialect::Oracle => self.build_oracle(),
        }
    }
}

pub(crate) fn table_reference_to_sea_table_ref(table: &TableReference) -> TableRef {
    match table {
        TableReference::Bare { table } => {
            TableRef::Table(SeaRc::new(Alias::new(table.to_string())))
        }
        TableReference::Partial { schema, table } => TableRef::SchemaTable(
            SeaRc::new(Alias::new(schema.to_string())),
            SeaRc::new(Alias::new(table.to_string())),
        ),
        TableReference::Full {
            catalog,
            schema,
            table,
        } => TableRef::DatabaseSchemaTable(
            SeaRc::new(Alias::new(catalog.to_string())),
            SeaRc::new(Alias::new(schema.to_string())),
            SeaRc::new(Alias::new(table.to_string())),
        ),
    }
}
