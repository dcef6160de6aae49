use super::{check_destination_dir, unique_column_names};
use crate::adapters::sqlite::SqliteDestination;
use crate::adapters::tsv_source::{TsvOptions, TsvSource};
use crate::config::pipeline_config::{PreviewConfig, TextImportConfig};
use crate::core::progress::{ProgressReporter, ReportInterval};
use crate::core::transfer::BatchTransfer;
use crate::core::{Pipeline, TableReport, TableSchema};
use crate::utils::error::{EtlError, Result};
use crate::utils::format::format_count;
use async_trait::async_trait;
use std::path::Path;

/// Loads a delimited text export into one all-TEXT table.
pub struct TextImportPipeline {
    config: TextImportConfig,
}

impl TextImportPipeline {
    pub fn new(config: TextImportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TextImportConfig {
        &self.config
    }

    fn tsv_options(&self) -> Result<TsvOptions> {
        // 非 ASCII 的位元組會出現在 UTF-8 多位元組字元中間
        let delimiter = self
            .config
            .delimiter
            .is_ascii()
            .then_some(self.config.delimiter as u8)
            .ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "delimiter".to_string(),
                value: self.config.delimiter.to_string(),
                reason: "Delimiter must be a single ASCII character".to_string(),
            })?;
        Ok(TsvOptions {
            delimiter,
            max_field_bytes: self.config.max_field_bytes,
        })
    }

    fn build_schema(&self, headers: &[String]) -> TableSchema {
        let schema = TableSchema::all_text(&self.config.table, unique_column_names(headers));

        // 只替實際存在的欄位建立索引
        let mut indexes = Vec::new();
        for column in &self.config.index_columns {
            if schema.has_column(column) {
                indexes.push(column.clone());
            } else {
                tracing::warn!(
                    "⚠️ Index column '{}' not found in header, skipping index",
                    column
                );
            }
        }
        schema.with_indexes(indexes)
    }

    fn print_preview(
        destination: &SqliteDestination,
        schema: &TableSchema,
        preview: &PreviewConfig,
    ) -> Result<()> {
        let missing: Vec<&str> = preview
            .columns
            .iter()
            .chain(std::iter::once(&preview.non_empty_column))
            .filter(|c| !schema.has_column(c))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            tracing::info!("Skipping sample preview, missing columns: {:?}", missing);
            return Ok(());
        }

        let rows = destination.sample_rows(
            &schema.name,
            &preview.columns,
            &preview.non_empty_column,
            preview.limit,
        )?;
        if rows.is_empty() {
            return Ok(());
        }

        println!("\n📋 Sample records:");
        for row in rows {
            println!("   {}", preview_line(&row));
        }
        Ok(())
    }
}

/// `code: name (brand, ...)` for one sample row.
fn preview_line(row: &[String]) -> String {
    match row {
        [] => String::new(),
        [first] => first.clone(),
        [first, second] => format!("{}: {}", first, second),
        [first, second, rest @ ..] => format!("{}: {} ({})", first, second, rest.join(", ")),
    }
}

#[async_trait]
impl Pipeline for TextImportPipeline {
    fn name(&self) -> &str {
        "Open Food Facts Text Import"
    }

    fn destination(&self) -> &Path {
        &self.config.output
    }

    async fn check_preconditions(&mut self) -> Result<()> {
        println!("📁 Input file: {}", self.config.input.display());
        if !self.config.input.is_file() {
            tracing::error!("❌ Input file not found: {}", self.config.input.display());
            return Err(EtlError::SourceNotFound {
                path: self.config.input.clone(),
            });
        }
        check_destination_dir(&self.config.output)
    }

    async fn execute(&mut self) -> Result<Vec<TableReport>> {
        println!("📋 Reading file structure...");
        let mut source = TsvSource::open(&self.config.input, self.tsv_options()?)?;
        if source.headers().is_empty() {
            return Err(EtlError::InvalidConfigValueError {
                field: "input".to_string(),
                value: self.config.input.display().to_string(),
                reason: "Input file has no header line".to_string(),
            });
        }
        println!("   Found {} columns", source.headers().len());

        let schema = self.build_schema(source.headers());

        let mut destination = SqliteDestination::open(&self.config.output, &self.config.pragmas)?;
        destination.recreate_table(&schema)?;
        println!(
            "✅ Created {} table with {} columns",
            schema.name,
            schema.arity()
        );

        println!("🔄 Starting import...");
        let transfer = BatchTransfer::new(&schema.name, schema.arity(), self.config.batch_size);
        let mut reporter =
            ProgressReporter::new("records", ReportInterval::Records(self.config.report_every));
        let stats = {
            let mut sink = destination.table_sink(&schema);
            transfer.run(&mut source, &mut sink, &mut reporter).await?
        };
        println!(
            "✅ Import completed: {} records",
            format_count(stats.records_written)
        );

        let rows_in_table = destination.row_count(&schema.name)?;
        if let Some(preview) = &self.config.preview {
            Self::print_preview(&destination, &schema, preview)?;
        }
        destination.close()?;

        Ok(vec![TableReport {
            table: schema.name.clone(),
            stats,
            rows_in_table,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_index_only_on_existing_columns() {
        let mut config = TextImportConfig::new("in.tsv", "out.db");
        config.index_columns = strings(&["code", "ean"]);
        let pipeline = TextImportPipeline::new(config);

        let schema = pipeline.build_schema(&strings(&["code", "product_name"]));
        assert_eq!(schema.indexes, vec!["code"]);
        assert_eq!(schema.name, "openfoodfacts");
    }

    #[test]
    fn test_preview_line_formats() {
        assert_eq!(
            preview_line(&strings(&["3017620422003", "Nutella", "Ferrero"])),
            "3017620422003: Nutella (Ferrero)"
        );
        assert_eq!(preview_line(&strings(&["1", "Milk"])), "1: Milk");
    }

    #[test]
    fn test_non_ascii_delimiter_is_rejected() {
        // U+00A7 and U+00FF fit in a byte but are not ASCII
        for delimiter in ['§', 'ÿ', '→'] {
            let mut config = TextImportConfig::new("in.tsv", "out.db");
            config.delimiter = delimiter;
            assert!(matches!(
                TextImportPipeline::new(config).tsv_options(),
                Err(EtlError::InvalidConfigValueError { .. })
            ));
        }

        let mut config = TextImportConfig::new("in.tsv", "out.db");
        config.delimiter = ';';
        assert_eq!(
            TextImportPipeline::new(config).tsv_options().unwrap().delimiter,
            b';'
        );
    }

    #[tokio::test]
    async fn test_missing_input_fails_precondition() {
        let mut pipeline = TextImportPipeline::new(TextImportConfig::new(
            "/nonexistent/products.tsv",
            "off-database.db",
        ));
        assert!(matches!(
            pipeline.check_preconditions().await,
            Err(EtlError::SourceNotFound { .. })
        ));
    }
}
