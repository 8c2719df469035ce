//! FeeSweep configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};
use crate::types::Address;

/// Environment variable that overrides `price_api.api_key`.
pub const API_KEY_ENV: &str = "FEESWEEP_API_KEY";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeSweepConfig {
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub price_api: PriceApiConfig,
}

impl FeeSweepConfig {
    /// Load config from the default path (~/.feesweep/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            return Self::load_from(&path);
        }
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SweepError::Config(format!("Failed to read config: {e}")))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| SweepError::Config(format!("Failed to parse config: {e}")))?;
        config.apply_env();
        Ok(config)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SweepError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".feesweep")
            .join("config.toml")
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.price_api.api_key = key;
            }
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.job.name.trim().is_empty() {
            return Err(SweepError::Config("job.name must not be empty".into()));
        }
        if self.job.schedule.trim().is_empty() {
            return Err(SweepError::Config("job.schedule must not be empty".into()));
        }
        if self.job.chunk_size == 0 {
            return Err(SweepError::Config("job.chunk_size must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SweepError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.backoff == BackoffKind::Exponential && self.retry.multiplier < 1.0 {
            return Err(SweepError::Config(
                "retry.multiplier must be >= 1.0 for exponential backoff".into(),
            ));
        }
        if self.chain.destination.is_zero() {
            return Err(SweepError::Config("chain.destination is not set".into()));
        }
        if self.chain.holder.is_zero() {
            return Err(SweepError::Config("chain.holder is not set".into()));
        }
        if self.chain.rpc_url.is_empty() {
            return Err(SweepError::Config("chain.rpc_url is not set".into()));
        }
        Ok(())
    }
}

/// The recurring job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_job_name")]
    pub name: String,
    /// Cron expression (`MIN HOUR DOM MON DOW`) or `@every 30s`.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Gas price ceiling in wei. Above this the whole tick is skipped.
    #[serde(default = "default_fee_threshold")]
    pub fee_threshold: u64,
}

fn default_job_name() -> String { "router-transfer".into() }
fn default_schedule() -> String { "*/5 * * * *".into() }
fn default_chunk_size() -> usize { 50 }
fn default_confirmations() -> u64 { 1 }
fn default_fee_threshold() -> u64 { 50_000_000_000 }

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: default_job_name(),
            schedule: default_schedule(),
            chunk_size: default_chunk_size(),
            confirmations: default_confirmations(),
            fee_threshold: default_fee_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Per-operation retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_delay_ms() -> u64 { 1000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_max_delay_ms() -> u64 { 30_000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: BackoffKind::default(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Chain endpoint and the accounts involved in a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Account whose token balances are swept.
    #[serde(default)]
    pub holder: Address,
    /// Fee collector receiving the swept balances.
    #[serde(default)]
    pub destination: Address,
    /// Node-managed account used as transaction sender.
    #[serde(default)]
    pub sender: Address,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
}

fn default_rpc_url() -> String { "http://127.0.0.1:8545".into() }
fn default_chain_id() -> u64 { 80084 }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_receipt_poll_ms() -> u64 { 1000 }

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            holder: Address::ZERO,
            destination: Address::ZERO,
            sender: Address::ZERO,
            request_timeout_secs: default_request_timeout_secs(),
            receipt_poll_ms: default_receipt_poll_ms(),
        }
    }
}

/// Pricing / swap HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceApiConfig {
    #[serde(default = "default_price_api_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_price_api_timeout")]
    pub timeout_secs: u64,
}

fn default_price_api_url() -> String { "https://bartio.api.oogabooga.io".into() }
fn default_price_api_timeout() -> u64 { 15 }

impl Default for PriceApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_price_api_url(),
            api_key: String::new(),
            timeout_secs: default_price_api_timeout(),
        }
    }
}
