use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Destination directory not found: {}", path.display())]
    DestinationNotFound { path: PathBuf },

    #[error("Connection failed: {message}")]
    ConnectionError { message: String },

    #[error("Field on line {line} is {size} bytes, exceeding the limit of {limit} bytes")]
    FieldTooLarge { line: u64, size: usize, limit: usize },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Transfer of table '{table}' failed after {written} records: {message}")]
    TransferError {
        table: String,
        written: u64,
        message: String,
    },
}

/// 錯誤類別，對應操作員需要採取的行動
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 尚未寫入任何資料前就失敗 (輸入缺失、連線失敗)
    Precondition,
    Configuration,
    /// 傳輸途中失敗，目的地可能只完成一部分
    Transfer,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::SourceNotFound { .. }
            | EtlError::DestinationNotFound { .. }
            | EtlError::ConnectionError { .. } => ErrorCategory::Precondition,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::CsvError(_)
            | EtlError::SqliteError(_)
            | EtlError::PostgresError(_)
            | EtlError::FieldTooLarge { .. }
            | EtlError::TransferError { .. } => ErrorCategory::Transfer,
            EtlError::IoError(_) | EtlError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Precondition => ErrorSeverity::High,
            // 重新執行即可恢復 (每次執行都會重建目的地表)
            ErrorCategory::Transfer => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::SourceNotFound { path } => {
                format!("Check that the input file exists: {}", path.display())
            }
            EtlError::DestinationNotFound { path } => {
                format!("Create the destination directory first: {}", path.display())
            }
            EtlError::ConnectionError { .. } | EtlError::PostgresError(_) => {
                "Verify DATABASE_URL (or PGHOST/PGUSER/PGPASSWORD) and that the server is reachable"
                    .to_string()
            }
            EtlError::FieldTooLarge { limit, .. } => format!(
                "Raise --max-field-bytes above {} and re-run the import",
                limit
            ),
            EtlError::MissingConfigError { field } => {
                format!("Provide a value for '{}' via flag, environment or config file", field)
            }
            EtlError::InvalidConfigValueError { field, .. }
            | EtlError::ConfigValidationError { field, .. } => {
                format!("Fix the value of '{}' and try again", field)
            }
            EtlError::ConfigError { .. } => "Review the configuration file".to_string(),
            EtlError::CsvError(_) | EtlError::SqliteError(_) | EtlError::TransferError { .. } => {
                "Fix the cause and re-run the whole job; the destination is rebuilt from scratch"
                    .to_string()
            }
            EtlError::IoError(_) | EtlError::SerializationError(_) => {
                "Check disk space and file permissions".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Precondition => format!("Cannot start: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Transfer => format!("Transfer aborted: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
