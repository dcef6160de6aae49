use super::check_destination_dir;
use crate::adapters::postgres_source::{connect, PagedSource, PgTableReader};
use crate::adapters::sqlite::SqliteDestination;
use crate::config::pipeline_config::{RemoteCopyConfig, TableTuning};
use crate::core::progress::{ProgressReporter, ReportInterval};
use crate::core::transfer::BatchTransfer;
use crate::core::{Pipeline, RecordSource, TableReport, TableSchema};
use crate::domain::model::{ColumnDef, WriteMode};
use crate::utils::error::{EtlError, Result};
use crate::utils::format::format_count;
use async_trait::async_trait;
use std::path::Path;
use tokio_postgres::Client;

/// One remote table and how it is copied.
#[derive(Debug, Clone)]
pub struct RemoteTable {
    pub schema: TableSchema,
    pub source_table: String,
    /// Stable sort key for paging.
    pub order_by: String,
    pub tuning: TableTuning,
}

impl RemoteTable {
    pub fn products(tuning: TableTuning) -> Self {
        let columns = vec![
            ColumnDef::text("product_name"),
            ColumnDef::text("brand"),
            ColumnDef::text("upc"),
            ColumnDef::text("ean13").primary_key(),
            ColumnDef::text("ingredients"),
            ColumnDef::text("lastupdated"),
            ColumnDef::text("analysis"),
            ColumnDef::text("created"),
            ColumnDef::text("mfg"),
            ColumnDef::text("imageurl"),
            ColumnDef::text("classification"),
            ColumnDef::text("issues"),
        ];
        Self {
            schema: TableSchema::new("products", columns)
                .with_indexes(["ean13", "classification"])
                .with_write_mode(WriteMode::InsertOrReplace),
            source_table: "products".to_string(),
            order_by: "ean13".to_string(),
            tuning,
        }
    }

    pub fn ingredients(tuning: TableTuning) -> Self {
        let columns = vec![
            ColumnDef::text("title").unique(),
            ColumnDef::text("class"),
            ColumnDef::integer("productcount").default_value("0"),
            ColumnDef::text("lastupdated"),
            ColumnDef::text("created"),
            ColumnDef::text("primary_class"),
        ];
        Self {
            schema: TableSchema::new("ingredients", columns)
                .with_indexes(["title", "class"])
                .with_write_mode(WriteMode::InsertOrReplace),
            source_table: "ingredients".to_string(),
            order_by: "title".to_string(),
            tuning,
        }
    }
}

/// Copies `products` and `ingredients` from PostgreSQL into SQLite.
pub struct RemoteCopyPipeline {
    config: RemoteCopyConfig,
    tables: Vec<RemoteTable>,
    client: Option<Client>,
}

impl RemoteCopyPipeline {
    pub fn new(config: RemoteCopyConfig) -> Self {
        let tables = vec![
            RemoteTable::products(config.products),
            RemoteTable::ingredients(config.ingredients),
        ];
        Self {
            config,
            tables,
            client: None,
        }
    }

    pub fn tables(&self) -> &[RemoteTable] {
        &self.tables
    }

    async fn copy_table<S: RecordSource + ?Sized>(
        source: &mut S,
        destination: &mut SqliteDestination,
        table: &RemoteTable,
    ) -> Result<TableReport> {
        let name = &table.schema.name;
        println!("\n🔄 Exporting {}...", name);

        let total = source.total_hint();
        if let Some(total) = total {
            println!("   Total {}: {}", name, format_count(total));
        }

        let transfer = BatchTransfer::new(name, table.schema.arity(), table.tuning.batch_size);
        let mut reporter =
            ProgressReporter::new(name, ReportInterval::Records(table.tuning.report_every))
                .with_total(total);
        let stats = {
            let mut sink = destination.table_sink(&table.schema);
            transfer.run(source, &mut sink, &mut reporter).await?
        };
        println!(
            "✅ {} completed: {} records",
            name,
            format_count(stats.records_written)
        );

        Ok(TableReport {
            table: name.clone(),
            stats,
            rows_in_table: destination.row_count(name)?,
        })
    }
}

#[async_trait]
impl Pipeline for RemoteCopyPipeline {
    fn name(&self) -> &str {
        "PostgreSQL to SQLite Export"
    }

    fn destination(&self) -> &Path {
        &self.config.output
    }

    /// Connects before the destination is opened, so an unreachable server
    /// leaves any existing database untouched.
    async fn check_preconditions(&mut self) -> Result<()> {
        check_destination_dir(&self.config.output)?;

        println!("📡 Connecting to {}...", self.config.connection.describe());
        let pg_config = self.config.connection.to_pg_config()?;
        let client = connect(&pg_config).await.inspect_err(|e| {
            tracing::error!("❌ {}", e);
        })?;
        println!("✅ Connected");
        self.client = Some(client);
        Ok(())
    }

    async fn execute(&mut self) -> Result<Vec<TableReport>> {
        let client = self.client.take().ok_or_else(|| EtlError::ConnectionError {
            message: "not connected; preconditions were not checked".to_string(),
        })?;

        println!("📦 Preparing SQLite database...");
        let mut destination = SqliteDestination::open(&self.config.output, &self.config.pragmas)?;
        for table in &self.tables {
            destination.recreate_table(&table.schema)?;
        }
        println!("✅ Created {} tables", self.tables.len());

        let mut reports = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            let reader =
                PgTableReader::new(&client, &table.schema, &table.source_table, &table.order_by);
            let mut source = PagedSource::open(reader).await?;
            reports.push(Self::copy_table(&mut source, &mut destination, table).await?);
        }

        destination.close()?;
        Ok(reports)
    }
}
