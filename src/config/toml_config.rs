use crate::adapters::sqlite::SqlitePragmas;
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional configuration file. Every value can be overridden on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub destination: Option<DestinationSection>,
    pub text_import: Option<TextImportSection>,
    pub remote_copy: Option<RemoteCopySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationSection {
    pub path: Option<PathBuf>,
    pub pragmas: Option<SqlitePragmas>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextImportSection {
    pub input: Option<PathBuf>,
    pub table: Option<String>,
    pub batch_size: Option<usize>,
    pub report_every: Option<u64>,
    pub max_field_bytes: Option<usize>,
    pub delimiter: Option<String>,
    pub index_columns: Option<Vec<String>>,
    pub preview: Option<PreviewSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewSection {
    pub enabled: Option<bool>,
    pub columns: Option<Vec<String>>,
    pub non_empty_column: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteCopySection {
    pub database_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub products: Option<TableSection>,
    pub ingredients: Option<TableSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSection {
    pub batch_size: Option<usize>,
    pub report_every: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EtlError::ConfigError {
                message: format!("config file not found: {}", path.display()),
            },
            _ => EtlError::IoError(e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATABASE_URL})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn destination_path(&self) -> Option<&Path> {
        self.destination.as_ref()?.path.as_deref()
    }

    pub fn pragmas(&self) -> Option<&SqlitePragmas> {
        self.destination.as_ref()?.pragmas.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[destination]
path = "/data/off-database.db"

[destination.pragmas]
journal_mode = "DELETE"

[text_import]
input = "/data/en.openfoodfacts.org.products.csv"
batch_size = 5000
index_columns = ["code", "brands"]

[text_import.preview]
enabled = false

[remote_copy]
host = "db.example.com"
port = 6543

[remote_copy.ingredients]
batch_size = 15000
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(
            config.destination_path(),
            Some(Path::new("/data/off-database.db"))
        );
        let pragmas = config.pragmas().unwrap();
        assert_eq!(pragmas.journal_mode, "DELETE");
        // 未指定的 pragma 使用預設值
        assert_eq!(pragmas.synchronous, "NORMAL");

        let text = config.text_import.as_ref().unwrap();
        assert_eq!(text.batch_size, Some(5000));
        assert_eq!(text.index_columns.as_deref(), Some(&["code".to_string(), "brands".to_string()][..]));
        assert_eq!(text.preview.as_ref().unwrap().enabled, Some(false));

        let remote = config.remote_copy.as_ref().unwrap();
        assert_eq!(remote.port, Some(6543));
        assert_eq!(remote.ingredients.as_ref().unwrap().batch_size, Some(15000));
        assert!(remote.products.is_none());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("OFF_ETL_TEST_DATABASE_URL", "postgres://reader@db.example.com/off");

        let toml_content = r#"
[remote_copy]
database_url = "${OFF_ETL_TEST_DATABASE_URL}"
password = "${OFF_ETL_TEST_UNSET_VARIABLE}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let remote = config.remote_copy.unwrap();
        assert_eq!(
            remote.database_url.as_deref(),
            Some("postgres://reader@db.example.com/off")
        );
        assert_eq!(
            remote.password.as_deref(),
            Some("${OFF_ETL_TEST_UNSET_VARIABLE}")
        );

        std::env::remove_var("OFF_ETL_TEST_DATABASE_URL");
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = TomlConfig::from_toml_str("[text_import\nbatch_size = ").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[text_import]\ntable = \"products_dump\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.text_import.unwrap().table.as_deref(),
            Some("products_dump")
        );
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = TomlConfig::from_file("/nonexistent/off-etl.toml").unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
