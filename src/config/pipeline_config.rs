use crate::adapters::sqlite::SqlitePragmas;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    redact_url, validate_non_empty_string, validate_path, validate_positive_number,
    validate_postgres_url, validate_range, validate_required_field, Validate,
};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio_postgres::config::Host;

pub const DEFAULT_DATABASE_PATH: &str = "off-database.db";
pub const DEFAULT_TEXT_TABLE: &str = "openfoodfacts";
pub const DEFAULT_TEXT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_TEXT_REPORT_EVERY: u64 = 1_000_000;
pub const DEFAULT_MAX_FIELD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_PRODUCTS_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_PRODUCTS_REPORT_EVERY: u64 = 50_000;
pub const DEFAULT_INGREDIENTS_BATCH_SIZE: usize = 20_000;
pub const DEFAULT_INGREDIENTS_REPORT_EVERY: u64 = 100_000;
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_PG_DATABASE: &str = "postgres";

/// Rows shown after a text import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    pub columns: Vec<String>,
    /// Only rows where this column is non-empty are shown.
    pub non_empty_column: String,
    pub limit: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            columns: vec![
                "code".to_string(),
                "product_name".to_string(),
                "brands".to_string(),
            ],
            non_empty_column: "product_name".to_string(),
            limit: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextImportConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub table: String,
    pub batch_size: usize,
    pub report_every: u64,
    pub max_field_bytes: usize,
    pub delimiter: char,
    pub index_columns: Vec<String>,
    /// `None` disables the preview.
    pub preview: Option<PreviewConfig>,
    pub pragmas: SqlitePragmas,
}

impl TextImportConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            table: DEFAULT_TEXT_TABLE.to_string(),
            batch_size: DEFAULT_TEXT_BATCH_SIZE,
            report_every: DEFAULT_TEXT_REPORT_EVERY,
            max_field_bytes: DEFAULT_MAX_FIELD_BYTES,
            delimiter: '\t',
            index_columns: vec!["code".to_string()],
            preview: Some(PreviewConfig::default()),
            pragmas: SqlitePragmas::default(),
        }
    }
}

impl Validate for TextImportConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input", &self.input)?;
        validate_path("output", &self.output)?;
        validate_non_empty_string("table", &self.table)?;
        validate_positive_number("batch_size", self.batch_size, 1)?;
        validate_positive_number("report_every", self.report_every as usize, 1)?;
        validate_positive_number("max_field_bytes", self.max_field_bytes, 1)?;
        if !self.delimiter.is_ascii() {
            return Err(EtlError::InvalidConfigValueError {
                field: "delimiter".to_string(),
                value: self.delimiter.to_string(),
                reason: "Delimiter must be a single ASCII character".to_string(),
            });
        }
        if let Some(preview) = &self.preview {
            validate_range("preview.limit", preview.limit, 0, 1_000)?;
        }
        Ok(())
    }
}

/// Remote connection settings. A URL wins over the discrete fields.
#[derive(Clone, Default)]
pub struct PgConnectionConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for PgConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnectionConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl PgConnectionConfig {
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config> {
        if let Some(url) = &self.url {
            return tokio_postgres::Config::from_str(url).map_err(|e| {
                EtlError::InvalidConfigValueError {
                    field: "database_url".to_string(),
                    value: "<redacted>".to_string(),
                    reason: e.to_string(),
                }
            });
        }

        let host = validate_required_field("host", &self.host)?;
        let mut config = tokio_postgres::Config::new();
        config
            .host(host.as_str())
            .port(self.port.unwrap_or(DEFAULT_PG_PORT))
            .dbname(self.dbname.as_deref().unwrap_or(DEFAULT_PG_DATABASE));
        if let Some(user) = &self.user {
            config.user(user.as_str());
        }
        if let Some(password) = &self.password {
            config.password(password.as_str());
        }
        Ok(config)
    }

    /// Where we are connecting, without credentials.
    pub fn describe(&self) -> String {
        match (&self.url, &self.host) {
            (Some(url), _) => match url::Url::parse(url) {
                Ok(parsed) => redact_url(&parsed),
                // libpq key=value 形式：只顯示主機與資料庫
                Err(_) => self
                    .to_pg_config()
                    .map(|config| describe_pg_config(&config))
                    .unwrap_or_else(|_| "<invalid connection string>".to_string()),
            },
            (None, Some(host)) => format!(
                "{}:{}/{}",
                host,
                self.port.unwrap_or(DEFAULT_PG_PORT),
                self.dbname.as_deref().unwrap_or(DEFAULT_PG_DATABASE)
            ),
            (None, None) => "<not configured>".to_string(),
        }
    }
}

fn describe_pg_config(config: &tokio_postgres::Config) -> String {
    let hosts: Vec<String> = config
        .get_hosts()
        .iter()
        .map(|host| match host {
            Host::Tcp(name) => name.clone(),
            #[cfg(unix)]
            Host::Unix(path) => path.display().to_string(),
        })
        .collect();
    let port = config.get_ports().first().copied().unwrap_or(DEFAULT_PG_PORT);
    format!(
        "{}:{}/{}",
        hosts.join(","),
        port,
        config.get_dbname().unwrap_or(DEFAULT_PG_DATABASE)
    )
}

impl Validate for PgConnectionConfig {
    fn validate(&self) -> Result<()> {
        match &self.url {
            Some(url) => validate_postgres_url("database_url", url),
            None => {
                let host = validate_required_field("host", &self.host)?;
                validate_non_empty_string("host", host)
            }
        }
    }
}

/// Batch size and reporting interval for one remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTuning {
    pub batch_size: usize,
    pub report_every: u64,
}

#[derive(Debug, Clone)]
pub struct RemoteCopyConfig {
    pub connection: PgConnectionConfig,
    pub output: PathBuf,
    pub products: TableTuning,
    pub ingredients: TableTuning,
    pub pragmas: SqlitePragmas,
}

impl RemoteCopyConfig {
    pub fn new(connection: PgConnectionConfig, output: impl Into<PathBuf>) -> Self {
        Self {
            connection,
            output: output.into(),
            products: TableTuning {
                batch_size: DEFAULT_PRODUCTS_BATCH_SIZE,
                report_every: DEFAULT_PRODUCTS_REPORT_EVERY,
            },
            ingredients: TableTuning {
                batch_size: DEFAULT_INGREDIENTS_BATCH_SIZE,
                report_every: DEFAULT_INGREDIENTS_REPORT_EVERY,
            },
            pragmas: SqlitePragmas::default(),
        }
    }
}

impl Validate for RemoteCopyConfig {
    fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        validate_path("output", &self.output)?;
        validate_positive_number("products.batch_size", self.products.batch_size, 1)?;
        validate_positive_number("products.report_every", self.products.report_every as usize, 1)?;
        validate_positive_number("ingredients.batch_size", self.ingredients.batch_size, 1)?;
        validate_positive_number(
            "ingredients.report_every",
            self.ingredients.report_every as usize,
            1,
        )?;
        Ok(())
    }
}
