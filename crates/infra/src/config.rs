//! Configuration loading and representation.
//!
//! Precedence: built-in defaults, then the optional JSON file named by
//! `CARBONSENSE_CONFIG` (default `carbonsense.json`), then the
//! `CARBONSENSE_DATA_DIR`, `CARBONSENSE_BIND` and `CARBONSENSE_LOG_FORMAT`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use carbonsense_compliance::AssessmentRates;
use carbonsense_observability::LogFormat;
use carbonsense_registry::DEFAULT_PRICE_PER_TON;

pub const CONFIG_PATH_ENV: &str = "CARBONSENSE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "carbonsense.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub event_log: PathBuf,
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub rates: RateConfig,
    pub blockchain: BlockchainConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            event_log: PathBuf::from("data/registry_events.jsonl"),
            bind_addr: "0.0.0.0:8080".to_string(),
            log_format: LogFormat::Json,
            rates: RateConfig::default(),
            blockchain: BlockchainConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub tax_rate_per_tonne: f64,
    pub credit_rate_per_tonne: f64,
    /// Price given to lots minted on verification approval.
    pub default_credit_price: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        let rates = AssessmentRates::default();
        Self {
            tax_rate_per_tonne: rates.tax_rate_per_tonne,
            credit_rate_per_tonne: rates.credit_rate_per_tonne,
            default_credit_price: DEFAULT_PRICE_PER_TON,
        }
    }
}

impl RateConfig {
    pub fn assessment_rates(&self) -> AssessmentRates {
        AssessmentRates {
            tax_rate_per_tonne: self.tax_rate_per_tonne,
            credit_rate_per_tonne: self.credit_rate_per_tonne,
        }
    }
}

/// External chain settings. Parsed and reported; no adapter consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainConfig {
    pub blockchain_enabled: bool,
    pub network: String,
    pub rpc_url: String,
    pub contract_address: String,
    #[serde(skip_serializing)]
    pub private_key: String,
    pub ipfs_gateway: String,
    pub verification_threshold: u32,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            blockchain_enabled: false,
            network: "ganache".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: String::new(),
            private_key: String::new(),
            ipfs_gateway: "https://ipfs.io/ipfs/".to_string(),
            verification_threshold: 2,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load with an explicit variable lookup.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup(CONFIG_PATH_ENV).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?.unwrap_or_default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// `Ok(None)` if the file does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map(Some).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("CARBONSENSE_DATA_DIR") {
            // The event log follows the data dir unless it was set elsewhere.
            if self.event_log == self.data_dir.join("registry_events.jsonl") {
                self.event_log = PathBuf::from(&dir).join("registry_events.jsonl");
            }
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(bind) = lookup("CARBONSENSE_BIND") {
            self.bind_addr = bind;
        }
        if let Some(format) = lookup("CARBONSENSE_LOG_FORMAT") {
            self.log_format = format.parse().map_err(|message| ConfigError::Env {
                var: "CARBONSENSE_LOG_FORMAT",
                message,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    /// Path inside a fresh temp dir; the file itself does not exist yet.
    fn missing_file() -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carbonsense.json").display().to_string();
        (dir, path)
    }

    #[test]
    fn defaults_when_no_file_and_no_env() {
        let (_dir, path) = missing_file();
        let config = AppConfig::load_with(lookup(&[(CONFIG_PATH_ENV, &path)])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rates.tax_rate_per_tonne, 2100.0);
        assert_eq!(config.rates.credit_rate_per_tonne, 1680.0);
        assert_eq!(config.rates.default_credit_price, 50.0);
        assert!(!config.blockchain.blockchain_enabled);
        assert_eq!(config.blockchain.verification_threshold, 2);
    }

    #[test]
    fn file_values_fill_in_over_defaults() {
        let (_dir, path) = missing_file();
        std::fs::write(
            &path,
            r#"{"bind_addr": "127.0.0.1:9000", "rates": {"tax_rate_per_tonne": 2500},
                "blockchain": {"blockchain_enabled": true, "network": "sepolia"}}"#,
        )
        .unwrap();

        let config = AppConfig::load_with(lookup(&[(CONFIG_PATH_ENV, &path)])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.rates.tax_rate_per_tonne, 2500.0);
        assert_eq!(config.rates.credit_rate_per_tonne, 1680.0);
        assert!(config.blockchain.blockchain_enabled);
        assert_eq!(config.blockchain.network, "sepolia");
        assert_eq!(config.blockchain.ipfs_gateway, "https://ipfs.io/ipfs/");
    }

    #[test]
    fn env_overrides_win() {
        let (_dir, path) = missing_file();
        let config = AppConfig::load_with(lookup(&[
            (CONFIG_PATH_ENV, &path),
            ("CARBONSENSE_DATA_DIR", "/var/lib/carbonsense"),
            ("CARBONSENSE_BIND", "127.0.0.1:0"),
            ("CARBONSENSE_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/carbonsense"));
        assert_eq!(config.event_log, PathBuf::from("/var/lib/carbonsense/registry_events.jsonl"));
        assert_eq!(config.bind_addr, "127.0.0.1:0");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn bad_log_format_is_reported() {
        let (_dir, path) = missing_file();
        let err = AppConfig::load_with(lookup(&[(CONFIG_PATH_ENV, &path), ("CARBONSENSE_LOG_FORMAT", "xml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "CARBONSENSE_LOG_FORMAT", .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let (_dir, path) = missing_file();
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            AppConfig::from_file(Path::new(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn private_key_is_never_serialized() {
        let mut config = AppConfig::default();
        config.blockchain.private_key = "0xsecret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("0xsecret"));
    }
}
