//! SQLite destination: schema preparation and transactional batch writes.

use crate::adapters::quote_ident;
use crate::domain::model::{Batch, ColumnConstraint, TableSchema, Value, WriteMode};
use crate::domain::ports::RecordSink;
use crate::utils::error::Result;
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bulk-load tuning applied when the destination file is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlitePragmas {
    pub journal_mode: String,
    pub synchronous: String,
    pub cache_size: i64,
    pub temp_store: String,
}

impl Default for SqlitePragmas {
    fn default() -> Self {
        Self {
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
            cache_size: 1_000_000,
            temp_store: "MEMORY".to_string(),
        }
    }
}

impl SqlitePragmas {
    fn apply(&self, conn: &Connection) -> Result<()> {
        // journal_mode 會回傳一列結果，需要用 _and_check 版本
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            &self.journal_mode,
            |row| row.get(0),
        )?;
        conn.pragma_update(None, "synchronous", &self.synchronous)?;
        conn.pragma_update(None, "cache_size", self.cache_size)?;
        conn.pragma_update(None, "temp_store", &self.temp_store)?;
        tracing::debug!(
            "SQLite pragmas: journal_mode={}, synchronous={}, cache_size={}, temp_store={}",
            mode,
            self.synchronous,
            self.cache_size,
            self.temp_store
        );
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
        })
    }
}

pub fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|column| {
            let mut def = format!("{} {}", quote_ident(&column.name), column.column_type.sql_name());
            match column.constraint {
                Some(ColumnConstraint::PrimaryKey) => def.push_str(" PRIMARY KEY"),
                Some(ColumnConstraint::Unique) => def.push_str(" UNIQUE"),
                None => {}
            }
            // default 是 SQL 字面值，由固定 schema 提供
            if let Some(default) = &column.default {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            def
        })
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(&schema.name),
        columns.join(", ")
    )
}

pub fn create_index_sql(table: &str, column: &str) -> String {
    format!(
        "CREATE INDEX {} ON {}({})",
        quote_ident(&format!("idx_{}_{}", table, column)),
        quote_ident(table),
        quote_ident(column)
    )
}

pub fn insert_sql(schema: &TableSchema) -> String {
    let verb = match schema.write_mode {
        WriteMode::Insert => "INSERT",
        WriteMode::InsertOrReplace => "INSERT OR REPLACE",
    };
    let columns: Vec<String> = schema.column_names().map(quote_ident).collect();
    let placeholders: Vec<String> = (1..=schema.arity()).map(|i| format!("?{}", i)).collect();
    format!(
        "{} INTO {} ({}) VALUES ({})",
        verb,
        quote_ident(&schema.name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// An open SQLite database file. Dropping it closes the connection.
pub struct SqliteDestination {
    conn: Connection,
}

impl SqliteDestination {
    pub fn open(path: &Path, pragmas: &SqlitePragmas) -> Result<Self> {
        let conn = Connection::open(path)?;
        pragmas.apply(&conn)?;
        tracing::debug!("Opened SQLite database {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Drop and recreate `schema`'s table and its indexes in one transaction.
    pub fn recreate_table(&mut self, schema: &TableSchema) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&schema.name)))?;
        tx.execute_batch(&create_table_sql(schema))?;
        for column in &schema.indexes {
            tx.execute_batch(&create_index_sql(&schema.name, column))?;
        }
        tx.commit()?;
        tracing::debug!(
            "Recreated table '{}' ({} columns, {} indexes)",
            schema.name,
            schema.arity(),
            schema.indexes.len()
        );
        Ok(())
    }

    pub fn table_sink(&mut self, schema: &TableSchema) -> SqliteTableSink<'_> {
        SqliteTableSink {
            conn: &mut self.conn,
            insert_sql: insert_sql(schema),
        }
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Up to `limit` rows of `columns` where `non_empty` holds a non-empty value.
    pub fn sample_rows(
        &self,
        table: &str,
        columns: &[String],
        non_empty: &str,
        limit: usize,
    ) -> Result<Vec<Vec<String>>> {
        let select: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {col} IS NOT NULL AND {col} != '' LIMIT ?1",
            select.join(", "),
            quote_ident(table),
            col = quote_ident(non_empty)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], |row| {
            (0..columns.len())
                .map(|i| -> rusqlite::Result<String> {
                    Ok(match row.get_ref(i)? {
                        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                            String::from_utf8_lossy(bytes).into_owned()
                        }
                        ValueRef::Integer(n) => n.to_string(),
                        ValueRef::Real(f) => f.to_string(),
                        ValueRef::Null => String::new(),
                    })
                })
                .collect::<rusqlite::Result<Vec<String>>>()
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

/// Writes batches into one table; each batch is its own transaction.
pub struct SqliteTableSink<'a> {
    conn: &'a mut Connection,
    insert_sql: String,
}

impl SqliteTableSink<'_> {
    fn write(&mut self, batch: &Batch) -> Result<u64> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql)?;
            for record in &batch.records {
                stmt.execute(params_from_iter(record.fields.iter()))?;
            }
        }
        tx.commit()?;
        Ok(batch.len() as u64)
    }
}

#[async_trait]
impl RecordSink for SqliteTableSink<'_> {
    async fn commit_batch(&mut self, batch: &Batch) -> Result<u64> {
        self.write(batch)
    }
}
