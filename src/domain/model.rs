use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A single field value as read from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    Text(String),
    Integer(i64),
    Null,
}

impl Value {
    pub fn empty() -> Self {
        Value::Text(String::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// An ordered tuple of field values. Identity is its position in the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub fields: Vec<Value>,
}

impl Record {
    pub fn new(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }
}

impl<V: Into<Value>> FromIterator<V> for Record {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The unit of atomic commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}

impl ColumnType {
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub constraint: Option<ColumnConstraint>,
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Text,
            constraint: None,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            column_type: ColumnType::Integer,
            ..Self::text(name)
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.constraint = Some(ColumnConstraint::PrimaryKey);
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraint = Some(ColumnConstraint::Unique);
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// How a batch is written into its destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteMode {
    /// Positional insert; duplicate keys are kept.
    Insert,
    /// A row whose unique key already exists overwrites the prior row.
    InsertOrReplace,
}

/// Shape of one destination table, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Columns that get a secondary lookup index.
    pub indexes: Vec<String>,
    pub write_mode: WriteMode,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
            write_mode: WriteMode::Insert,
        }
    }

    /// All-TEXT schema built from a header row.
    pub fn all_text<I, S>(name: impl Into<String>, column_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, column_names.into_iter().map(ColumnDef::text).collect())
    }

    pub fn with_indexes<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Counters produced by one run of the batch transfer loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub records_read: u64,
    pub records_written: u64,
    pub batches: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Outcome of transferring one destination table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub stats: TransferStats,
    /// `SELECT COUNT(*)` on the destination after the transfer.
    pub rows_in_table: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub started_at: DateTime<Local>,
    pub elapsed_ms: u128,
    pub destination: PathBuf,
    pub destination_size_bytes: Option<u64>,
    pub tables: Vec<TableReport>,
}

impl RunSummary {
    pub fn total_written(&self) -> u64 {
        self.tables.iter().map(|t| t.stats.records_written).sum()
    }
}
