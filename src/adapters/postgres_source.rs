//! Paged reader over a PostgreSQL table.

use crate::adapters::quote_ident;
use crate::adapters::tls::rustls_client_config;
use crate::domain::model::{Batch, ColumnType, Record, TableSchema, Value};
use crate::domain::ports::RecordSource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use tokio_postgres::{Client, Config, Row};
use tokio_postgres_rustls::MakeRustlsConnect;

/// Connect to the database, using TLS when the server offers it.
pub async fn connect(config: &Config) -> Result<Client> {
    let tls = MakeRustlsConnect::new(rustls_client_config()?);

    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| EtlError::ConnectionError {
            message: format!("could not connect to PostgreSQL: {}", e),
        })?;

    // 連線物件必須在背景執行；Client 被 drop 時它會自行結束
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("❌ PostgreSQL connection error: {}", e);
        }
    });

    Ok(client)
}

/// `SELECT ... ORDER BY key LIMIT $1 OFFSET $2` for one source table.
///
/// Columns are cast to the destination's declared type so decoding does not
/// depend on the exact server-side column type.
pub fn select_page_sql(schema: &TableSchema, source_table: &str, order_by: &str) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|column| {
            let cast = match column.column_type {
                ColumnType::Text => "text",
                ColumnType::Integer => "bigint",
            };
            format!("{}::{}", quote_ident(&column.name), cast)
        })
        .collect();
    format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT $1 OFFSET $2",
        columns.join(", "),
        quote_ident(source_table),
        quote_ident(order_by)
    )
}

/// One page-at-a-time view of a source table.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Number of rows in the table when reading starts.
    async fn count(&self) -> Result<u64>;

    /// Up to `limit` rows starting at `offset`, in a stable order.
    async fn fetch_page(&self, limit: i64, offset: i64) -> Result<Vec<Record>>;
}

/// Reads one PostgreSQL table through `LIMIT/OFFSET` queries.
pub struct PgTableReader<'a> {
    client: &'a Client,
    count_sql: String,
    page_sql: String,
    column_types: Vec<ColumnType>,
}

impl<'a> PgTableReader<'a> {
    pub fn new(
        client: &'a Client,
        schema: &TableSchema,
        source_table: &str,
        order_by: &str,
    ) -> Self {
        Self {
            client,
            count_sql: format!("SELECT COUNT(*) FROM {}", quote_ident(source_table)),
            page_sql: select_page_sql(schema, source_table, order_by),
            column_types: schema.columns.iter().map(|c| c.column_type).collect(),
        }
    }

    fn decode(&self, row: &Row) -> Result<Record> {
        let mut fields = Vec::with_capacity(self.column_types.len());
        for (i, column_type) in self.column_types.iter().enumerate() {
            let value = match column_type {
                ColumnType::Text => Value::from(row.try_get::<_, Option<String>>(i)?),
                ColumnType::Integer => Value::from(row.try_get::<_, Option<i64>>(i)?),
            };
            fields.push(value);
        }
        Ok(Record::new(fields))
    }
}

#[async_trait]
impl PageFetcher for PgTableReader<'_> {
    async fn count(&self) -> Result<u64> {
        let row = self.client.query_one(&self.count_sql, &[]).await?;
        let total: i64 = row.try_get(0)?;
        Ok(total.max(0) as u64)
    }

    async fn fetch_page(&self, limit: i64, offset: i64) -> Result<Vec<Record>> {
        let rows = self.client.query(&self.page_sql, &[&limit, &offset]).await?;
        rows.iter().map(|row| self.decode(row)).collect()
    }
}

/// Turns a [`PageFetcher`] into a forward-only [`RecordSource`].
pub struct PagedSource<F: PageFetcher> {
    fetcher: F,
    offset: i64,
    total: u64,
    exhausted: bool,
}

impl<F: PageFetcher> PagedSource<F> {
    pub async fn open(fetcher: F) -> Result<Self> {
        let total = fetcher.count().await?;
        Ok(Self {
            fetcher,
            offset: 0,
            total,
            exhausted: false,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

#[async_trait]
impl<F: PageFetcher> RecordSource for PagedSource<F> {
    async fn next_batch(&mut self, max: usize) -> Result<Batch> {
        if self.exhausted {
            return Ok(Batch::default());
        }

        let limit = i64::try_from(max).unwrap_or(i64::MAX);
        let records = self.fetcher.fetch_page(limit, self.offset).await?;
        self.offset += records.len() as i64;
        // 不滿一頁代表已讀到結尾，省掉一次查詢
        if (records.len() as i64) < limit {
            self.exhausted = true;
        }
        Ok(Batch::new(records))
    }

    fn total_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// In-memory table served page by page, recording each requested offset.
#[cfg(test)]
pub(crate) struct MemoryPages {
    pub rows: Vec<Record>,
    pub requested: std::sync::Mutex<Vec<(i64, i64)>>,
}

#[cfg(test)]
impl MemoryPages {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            requested: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.requested.lock().unwrap().iter().map(|(_, o)| *o).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl<'a> PageFetcher for &'a MemoryPages {
    async fn count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }

    async fn fetch_page(&self, limit: i64, offset: i64) -> Result<Vec<Record>> {
        self.requested.lock().unwrap().push((limit, offset));
        Ok(self
            .rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ColumnDef;

    #[test]
    fn test_select_page_sql_casts_and_orders() {
        let schema = TableSchema::new(
            "ingredients",
            vec![
                ColumnDef::text("title").unique(),
                ColumnDef::text("class"),
                ColumnDef::integer("productcount"),
            ],
        );
        assert_eq!(
            select_page_sql(&schema, "ingredients", "title"),
            r#"SELECT "title"::text, "class"::text, "productcount"::bigint FROM "ingredients" ORDER BY "title" LIMIT $1 OFFSET $2"#
        );
    }

    fn numbered(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::new(vec![Value::from(i.to_string())])).collect()
    }

    async fn drain(source: &mut PagedSource<&MemoryPages>, page: usize) -> Vec<usize> {
        let mut sizes = Vec::new();
        loop {
            let batch = source.next_batch(page).await.unwrap();
            if batch.is_empty() {
                return sizes;
            }
            sizes.push(batch.len());
        }
    }

    #[tokio::test]
    async fn test_short_last_page_ends_without_extra_query() {
        let pages = MemoryPages::new(numbered(25));
        let mut source = PagedSource::open(&pages).await.unwrap();
        assert_eq!(source.total_hint(), Some(25));

        assert_eq!(drain(&mut source, 10).await, vec![10, 10, 5]);
        assert_eq!(pages.offsets(), vec![0, 10, 20]);
        assert_eq!(source.offset(), 25);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let pages = MemoryPages::new(numbered(20));
        let mut source = PagedSource::open(&pages).await.unwrap();

        assert_eq!(drain(&mut source, 10).await, vec![10, 10]);
        assert_eq!(pages.offsets(), vec![0, 10, 20]);
        // 已耗盡後不再查詢
        assert!(source.next_batch(10).await.unwrap().is_empty());
        assert_eq!(pages.offsets().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let pages = MemoryPages::new(Vec::new());
        let mut source = PagedSource::open(&pages).await.unwrap();
        assert_eq!(source.total_hint(), Some(0));

        assert!(drain(&mut source, 10).await.is_empty());
        assert_eq!(pages.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_pages_keep_source_order() {
        let pages = MemoryPages::new(numbered(7));
        let mut source = PagedSource::open(&pages).await.unwrap();

        let mut seen = Vec::new();
        loop {
            let batch = source.next_batch(3).await.unwrap();
            if batch.is_empty() {
                break;
            }
            seen.extend(batch.records.into_iter().map(|r| r.fields[0].to_string()));
        }
        let expected: Vec<String> = (0..7).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }
}
