// Adapters layer: concrete implementations of the ports for SQLite,
// delimited text files and PostgreSQL.

pub mod postgres_source;
pub mod sqlite;
mod tls;
pub mod tsv_source;

/// Quote an SQL identifier, doubling embedded quotes. Both SQLite and
/// PostgreSQL accept this form.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
