//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reminder_lead_days: u32,
    pub reminder_sweep_seconds: u64,
    pub cycle_provision_seconds: u64,
    pub billing_sync_seconds: u64,
    pub billing_max_retries: u64,
    pub billing_retry_backoff_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置；所有变量均有默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        let reminder_lead_days = read_u32_with_default("MRC_REMINDER_LEAD_DAYS", 3)?;
        let reminder_sweep_seconds = read_u64_with_default("MRC_REMINDER_SWEEP_SECONDS", 3600)?;
        let cycle_provision_seconds =
            read_u64_with_default("MRC_CYCLE_PROVISION_SECONDS", 86_400)?;
        let billing_sync_seconds = read_u64_with_default("MRC_BILLING_SYNC_SECONDS", 86_400)?;
        let billing_max_retries = read_u64_with_default("MRC_BILLING_MAX_RETRIES", 2)?;
        let billing_retry_backoff_ms =
            read_u64_with_default("MRC_BILLING_RETRY_BACKOFF_MS", 200)?;

        Ok(Self {
            reminder_lead_days,
            reminder_sweep_seconds,
            cycle_provision_seconds,
            billing_sync_seconds,
            billing_max_retries,
            billing_retry_backoff_ms,
        })
    }
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
