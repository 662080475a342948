//! Configuration for the launchpad service
//!
//! Loaded in layers: built-in defaults, then an optional TOML file, then
//! `LAUNCHPAD__SECTION__KEY` environment variables (a `.env` file is read
//! first when present). [`Config::validate`] runs after every load.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{net::SocketAddr, time::Duration};
use thiserror::Error;

use crate::{
    launch_flow::ExplorerConfig,
    task_queue::TaskQueueConfig,
    tx_builder::{FeeSchedule, LaunchSettings},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub bonding_curve: BondingCurveConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub uploads: UploadConfig,

    #[serde(default)]
    pub explorer: ExplorerConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.devnet.solana.com".to_string(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_base_fee")]
    pub base_lamports: u64,

    #[serde(default = "default_per_authority_fee")]
    pub per_authority_lamports: u64,

    /// Referrer share of the total, in basis points
    #[serde(default = "default_referrer_bps")]
    pub referrer_share_bps: u16,

    /// Platform fee recipient (base58); no platform transfer when unset
    #[serde(default)]
    pub platform_wallet: Option<String>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            base_lamports: default_base_fee(),
            per_authority_lamports: default_per_authority_fee(),
            referrer_share_bps: default_referrer_bps(),
            platform_wallet: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BondingCurveConfig {
    /// Pool configuration id (base58)
    #[serde(default)]
    pub pool_config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload backend base URL; uploads are skipped when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    #[serde(default)]
    pub queue: TaskQueueConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_upload_timeout(),
            max_image_bytes: default_max_image_bytes(),
            queue: TaskQueueConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// `tracing` filter directive
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_rpc_timeout() -> u64 { 30 }
fn default_base_fee() -> u64 { crate::tx_builder::fees::DEFAULT_BASE_FEE_LAMPORTS }
fn default_per_authority_fee() -> u64 { crate::tx_builder::fees::DEFAULT_PER_AUTHORITY_FEE_LAMPORTS }
fn default_referrer_bps() -> u16 { crate::tx_builder::fees::DEFAULT_REFERRER_SHARE_BPS }
fn default_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_upload_timeout() -> u64 { 60 }
fn default_max_image_bytes() -> usize { 5 * 1024 * 1024 }
fn default_log_filter() -> String { "launchpad=info".to_string() }

fn parse_pubkey(field: &'static str, value: &Option<String>) -> Result<Option<Pubkey>, ConfigError> {
    value
        .as_deref()
        .map(|raw| {
            raw.parse::<Pubkey>()
                .map_err(|e| ConfigError::invalid(field, e.to_string()))
        })
        .transpose()
}

impl Config {
    /// Load defaults, then `path` (if given), then environment overrides
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("LAUNCHPAD")
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document over the defaults, without the environment
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("rpc.endpoint", "must not be empty"));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::invalid("rpc.timeout_secs", "must be positive"));
        }
        if self.fees.referrer_share_bps > 10_000 {
            return Err(ConfigError::invalid(
                "fees.referrer_share_bps",
                format!("{} exceeds 10000", self.fees.referrer_share_bps),
            ));
        }
        parse_pubkey("fees.platform_wallet", &self.fees.platform_wallet)?;
        parse_pubkey("bonding_curve.pool_config", &self.bonding_curve.pool_config)?;
        self.bind_addr()?;
        if self.uploads.queue.max_concurrency == 0 {
            return Err(ConfigError::invalid("uploads.queue.max_concurrency", "must be positive"));
        }
        if self.uploads.queue.requests_per_second == 0 {
            return Err(ConfigError::invalid(
                "uploads.queue.requests_per_second",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::invalid("server.bind", e.to_string()))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.uploads.timeout_secs)
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            base_lamports: self.fees.base_lamports,
            per_authority_lamports: self.fees.per_authority_lamports,
            referrer_share_bps: self.fees.referrer_share_bps,
        }
    }

    pub fn launch_settings(&self) -> Result<LaunchSettings, ConfigError> {
        Ok(LaunchSettings {
            fees: self.fee_schedule(),
            platform_wallet: parse_pubkey("fees.platform_wallet", &self.fees.platform_wallet)?,
            pool_config: parse_pubkey("bonding_curve.pool_config", &self.bonding_curve.pool_config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fee_schedule(), FeeSchedule::default());
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let wallet = Pubkey::new_unique();
        let config = Config::from_toml_str(&format!(
            r#"
            [rpc]
            endpoint = "http://localhost:8899"

            [fees]
            base_lamports = 50000000
            platform_wallet = "{wallet}"

            [uploads.queue]
            max_retries = 1
            "#
        ))
        .unwrap();

        assert_eq!(config.rpc.endpoint, "http://localhost:8899");
        assert_eq!(config.rpc.timeout_secs, 30);
        assert_eq!(config.fees.base_lamports, 50_000_000);
        assert_eq!(config.fees.per_authority_lamports, 100_000_000);
        assert_eq!(config.uploads.queue.max_retries, 1);
        assert_eq!(config.launch_settings().unwrap().platform_wallet, Some(wallet));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.fees.referrer_share_bps = 10_001;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "fees.referrer_share_bps", .. })));

        let mut config = Config::default();
        config.fees.platform_wallet = Some("not-a-key".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.bind = "localhost".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_renders_as_toml() {
        let rendered = Config::default().to_toml_string().unwrap();
        assert!(rendered.contains("[rpc]"));
        assert!(rendered.contains("referrer_share_bps = 5500"));
    }
}
