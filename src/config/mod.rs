pub mod pipeline_config;
pub mod toml_config;

pub use pipeline_config::{
    PgConnectionConfig, PreviewConfig, RemoteCopyConfig, TableTuning, TextImportConfig,
};
pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command, CopyRemoteArgs, ImportTsvArgs, LogFormat};

#[cfg(feature = "cli")]
mod cli {
    use super::pipeline_config::{
        PgConnectionConfig, PreviewConfig, RemoteCopyConfig, TableTuning, TextImportConfig,
        DEFAULT_DATABASE_PATH,
    };
    use super::toml_config::{TableSection, TomlConfig};
    use crate::utils::error::{EtlError, Result};
    use clap::{Args, Parser, Subcommand, ValueEnum};
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "off-etl")]
    #[command(about = "Bulk-load Open Food Facts data into a local SQLite database")]
    pub struct CliConfig {
        /// Path to an optional TOML configuration file
        #[arg(short, long, global = true)]
        pub config: Option<PathBuf>,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
        pub monitor: bool,

        #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
        pub log_format: LogFormat,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
    pub enum LogFormat {
        Compact,
        Json,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Load a tab-delimited export into a single all-TEXT table
        ImportTsv(ImportTsvArgs),
        /// Copy the products and ingredients tables from PostgreSQL
        CopyRemote(CopyRemoteArgs),
    }

    #[derive(Debug, Clone, Args)]
    pub struct ImportTsvArgs {
        /// Tab-delimited input file; its first line is the header
        #[arg(short, long)]
        pub input: Option<PathBuf>,

        /// SQLite database file to write
        #[arg(short, long)]
        pub output: Option<PathBuf>,

        #[arg(long)]
        pub table: Option<String>,

        #[arg(long)]
        pub batch_size: Option<usize>,

        /// Print progress every N records
        #[arg(long)]
        pub report_every: Option<u64>,

        /// Largest accepted field, in bytes
        #[arg(long)]
        pub max_field_bytes: Option<usize>,

        #[arg(long)]
        pub delimiter: Option<char>,

        /// Skip the sample rows printed after the import
        #[arg(long)]
        pub no_preview: bool,
    }

    #[derive(Clone, Args)]
    pub struct CopyRemoteArgs {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        pub database_url: Option<String>,

        #[arg(long, env = "PGHOST")]
        pub host: Option<String>,

        #[arg(long, env = "PGPORT")]
        pub port: Option<u16>,

        #[arg(long, env = "PGDATABASE")]
        pub dbname: Option<String>,

        #[arg(long, env = "PGUSER")]
        pub user: Option<String>,

        #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
        pub password: Option<String>,

        /// SQLite database file to write
        #[arg(short, long)]
        pub output: Option<PathBuf>,

        #[arg(long)]
        pub products_batch_size: Option<usize>,

        #[arg(long)]
        pub products_report_every: Option<u64>,

        #[arg(long)]
        pub ingredients_batch_size: Option<usize>,

        #[arg(long)]
        pub ingredients_report_every: Option<u64>,
    }

    impl std::fmt::Debug for CopyRemoteArgs {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("CopyRemoteArgs")
                .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
                .field("host", &self.host)
                .field("port", &self.port)
                .field("dbname", &self.dbname)
                .field("user", &self.user)
                .field("password", &self.password.as_ref().map(|_| "***"))
                .field("output", &self.output)
                .finish_non_exhaustive()
        }
    }

    fn output_path(cli: Option<&PathBuf>, file: Option<&TomlConfig>) -> PathBuf {
        cli.cloned()
            .or_else(|| file.and_then(TomlConfig::destination_path).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
    }

    impl ImportTsvArgs {
        /// 合併命令列、設定檔與預設值 (命令列優先)
        pub fn resolve(&self, file: Option<&TomlConfig>) -> Result<TextImportConfig> {
            let section = file.and_then(|f| f.text_import.clone()).unwrap_or_default();

            let input = self
                .input
                .clone()
                .or(section.input)
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "input".to_string(),
                })?;

            let mut config = TextImportConfig::new(input, output_path(self.output.as_ref(), file));
            if let Some(table) = self.table.clone().or(section.table) {
                config.table = table;
            }
            if let Some(batch_size) = self.batch_size.or(section.batch_size) {
                config.batch_size = batch_size;
            }
            if let Some(report_every) = self.report_every.or(section.report_every) {
                config.report_every = report_every;
            }
            if let Some(max_field_bytes) = self.max_field_bytes.or(section.max_field_bytes) {
                config.max_field_bytes = max_field_bytes;
            }
            match (self.delimiter, section.delimiter) {
                (Some(delimiter), _) => config.delimiter = delimiter,
                (None, Some(text)) => config.delimiter = single_char("delimiter", &text)?,
                (None, None) => {}
            }
            if let Some(index_columns) = section.index_columns {
                config.index_columns = index_columns;
            }

            let preview = section.preview.unwrap_or_default();
            config.preview = if self.no_preview || preview.enabled == Some(false) {
                None
            } else {
                let defaults = PreviewConfig::default();
                Some(PreviewConfig {
                    columns: preview.columns.unwrap_or(defaults.columns),
                    non_empty_column: preview
                        .non_empty_column
                        .unwrap_or(defaults.non_empty_column),
                    limit: preview.limit.unwrap_or(defaults.limit),
                })
            };

            if let Some(pragmas) = file.and_then(TomlConfig::pragmas) {
                config.pragmas = pragmas.clone();
            }
            Ok(config)
        }
    }

    fn single_char(field: &str, text: &str) -> Result<char> {
        // 設定檔中允許寫 "\t"
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(EtlError::InvalidConfigValueError {
                field: field.to_string(),
                value: text.to_string(),
                reason: "Expected exactly one character".to_string(),
            }),
        }
    }

    fn table_tuning(
        defaults: TableTuning,
        batch_size: Option<usize>,
        report_every: Option<u64>,
        section: Option<TableSection>,
    ) -> TableTuning {
        let section = section.unwrap_or_default();
        TableTuning {
            batch_size: batch_size.or(section.batch_size).unwrap_or(defaults.batch_size),
            report_every: report_every
                .or(section.report_every)
                .unwrap_or(defaults.report_every),
        }
    }

    impl CopyRemoteArgs {
        /// 命令列 (含環境變數) 優先於設定檔
        pub fn resolve(&self, file: Option<&TomlConfig>) -> Result<RemoteCopyConfig> {
            let section = file.and_then(|f| f.remote_copy.clone()).unwrap_or_default();

            let connection = PgConnectionConfig {
                url: self.database_url.clone().or(section.database_url),
                host: self.host.clone().or(section.host),
                port: self.port.or(section.port),
                dbname: self.dbname.clone().or(section.dbname),
                user: self.user.clone().or(section.user),
                password: self.password.clone().or(section.password),
            };

            let mut config =
                RemoteCopyConfig::new(connection, output_path(self.output.as_ref(), file));
            config.products = table_tuning(
                config.products,
                self.products_batch_size,
                self.products_report_every,
                section.products,
            );
            config.ingredients = table_tuning(
                config.ingredients,
                self.ingredients_batch_size,
                self.ingredients_report_every,
                section.ingredients,
            );
            if let Some(pragmas) = file.and_then(TomlConfig::pragmas) {
                config.pragmas = pragmas.clone();
            }
            Ok(config)
        }
    }

}
