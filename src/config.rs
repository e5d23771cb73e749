// ⚙️ Configuration
// `earnings.toml` plus environment fallbacks. Lookup order for the file:
// explicit path, `$EARNINGS_CONFIG`, `./earnings.toml`, then built-in defaults.

use crate::classify::{FeeRule, FeeSchedule};
use crate::dashboard::DashboardSettings;
use crate::error::ConfigError;
use crate::record::ColumnMap;
use crate::source::{Connector, CsvFileConnector, SheetConnector};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "EARNINGS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "earnings.toml";
pub const DEFAULT_CSV: &str = "responses.csv";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub columns: ColumnMap,
    /// Ordered fee rules; absent means the standard schedule
    pub fees: Option<Vec<FeeRule>>,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// CSV export on disk
    Csv { path: PathBuf },

    /// Shared spreadsheet downloaded as CSV
    Sheet {
        #[serde(default)]
        spreadsheet_id: Option<String>,
        #[serde(default)]
        worksheet_gid: u64,
        /// Full export URL; overrides `spreadsheet_id`
        #[serde(default)]
        url: Option<String>,
        /// Environment variable holding a bearer token
        #[serde(default)]
        access_token_env: Option<String>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Csv {
            path: PathBuf::from(DEFAULT_CSV),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Explicit path, else `$EARNINGS_CONFIG`, else `./earnings.toml` if it
    /// exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&p));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load(local);
        }
        Ok(Config::default())
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule, ConfigError> {
        match &self.fees {
            None => Ok(FeeSchedule::standard()),
            Some(rules) => FeeSchedule::from_rules(rules.clone()),
        }
    }

    pub fn settings(&self) -> Result<DashboardSettings, ConfigError> {
        Ok(DashboardSettings {
            columns: self.columns.clone(),
            fees: self.fee_schedule()?,
        })
    }

    /// Factory: the connector described by `[source]`.
    pub fn connector(&self) -> Result<Box<dyn Connector>, ConfigError> {
        match &self.source {
            SourceConfig::Csv { path } => Ok(Box::new(CsvFileConnector::new(path))),
            SourceConfig::Sheet {
                spreadsheet_id,
                worksheet_gid,
                url,
                access_token_env,
            } => {
                let url = match (url, spreadsheet_id) {
                    (Some(url), _) => url.clone(),
                    (None, Some(id)) => SheetConnector::export_url(id, *worksheet_gid),
                    (None, None) => {
                        return Err(ConfigError::InvalidSource(
                            "sheet source needs `spreadsheet_id` or `url`".to_string(),
                        ))
                    }
                };
                let connector = SheetConnector::new(url);
                Ok(Box::new(match access_token_env {
                    Some(var) => connector.with_token_env(var),
                    None => connector,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.columns, ColumnMap::default());
        assert_eq!(config.server.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.fee_schedule().unwrap(), FeeSchedule::standard());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [source]
            kind = "sheet"
            spreadsheet_id = "abc"
            worksheet_gid = 7
            access_token_env = "SHEET_TOKEN"

            [columns]
            date = "Timestamp"

            [[fees]]
            pattern = "New Consult"
            amount = "90.00"

            [[fees]]
            pattern = "follow up"
            amount = "70"

            [server]
            bind_addr = "127.0.0.1:8080"
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.source,
            SourceConfig::Sheet { worksheet_gid: 7, .. }
        ));
        assert_eq!(config.columns.date, "Timestamp");
        assert_eq!(config.columns.name, "name");
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");

        let fees = config.fee_schedule().unwrap();
        assert_eq!(fees.classify("new consult"), Decimal::new(9000, 2));
        assert_eq!(fees.classify("Follow up"), Decimal::new(70, 0));
        assert_eq!(fees.classify("non cts"), Decimal::ZERO);
        assert!(config.connector().is_ok());
    }

    #[test]
    fn test_negative_fee_is_config_error() {
        let config = Config::from_toml_str(
            r#"
            [[fees]]
            pattern = "refund"
            amount = "-10"
            "#,
        )
        .unwrap();

        assert!(matches!(config.settings(), Err(ConfigError::InvalidFee { .. })));
    }

    #[test]
    fn test_sheet_without_location_is_rejected() {
        let config = Config::from_toml_str("[source]\nkind = \"sheet\"\n").unwrap();
        assert!(matches!(config.connector(), Err(ConfigError::InvalidSource(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load(Path::new("/nope/earnings.toml")).unwrap_err();
        assert!(err.to_string().contains("/nope/earnings.toml"));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(
            Config::from_toml_str("[source\nkind="),
            Err(ConfigError::Parse(_))
        ));
    }
}
