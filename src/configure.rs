use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub chain: ChainConfig,
    pub settlement: SettlementConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub db_path: String,
    pub flush_on_write: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Hex-encoded signing key. Empty means submissions are rejected.
    pub private_key: String,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub use_mock: bool,
    pub default_nft_address: String,
}

impl ChainConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn signing_key(&self) -> Option<&str> {
        let key = self.private_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Write asset and funding transaction in one storage transaction.
    pub atomic_investment: bool,
    pub max_page_size: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            atomic_investment: false,
            max_page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        // Set defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("storage.db_path", "data/ledger")?
        .set_default("storage.flush_on_write", true)?
        .set_default("chain.rpc_url", "https://evmtestnet.confluxrpc.com")?
        .set_default("chain.chain_id", 71)?
        .set_default("chain.private_key", "")?
        .set_default("chain.confirmation_timeout_secs", 60)?
        .set_default("chain.poll_interval_ms", 1000)?
        .set_default("chain.use_mock", false)?
        .set_default("chain.default_nft_address", "")?
        .set_default("settlement.atomic_investment", false)?
        .set_default("settlement.max_page_size", 50)?
        .set_default("log.level", "info")?
        .set_default("log.log_to_file", false)?
        .set_default("log.log_file", "log/settlement.log")
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config/settlement")
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    let s = builder_with_defaults()?
        // Add configuration from a file
        .add_source(File::with_name(path).required(false))
        // Add configuration from environment variables, e.g. APP__CHAIN__PRIVATE_KEY
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    s.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = load_config_from("config/does-not-exist").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.chain.confirmation_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.settlement.max_page_size, 50);
        assert!(!cfg.settlement.atomic_investment);
    }

    #[test]
    fn test_signing_key_blank_is_unconfigured() {
        let mut chain = load_config_from("config/does-not-exist").unwrap().chain;
        chain.private_key = "   ".to_string();
        assert!(chain.signing_key().is_none());
        chain.private_key = "0x01".to_string();
        assert_eq!(chain.signing_key(), Some("0x01"));
    }
}
