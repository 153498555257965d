//! Global configuration types for Solace.
//!
//! `GlobalConfig` represents the top-level `config.toml`. Every section and
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::admission::{AdmissionConfig, Bucket};
use crate::error::ConfigError;
use crate::retry::{RetryConfig, RetryPolicy};

/// Top-level configuration, loaded from `~/.solace/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub admission: AdmissionConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Stream coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Hard cap on bytes accumulated for persistence per response.
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,
}

fn default_capacity_bytes() -> usize {
    64 * 1024
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
        }
    }
}

/// Upstream text-generation endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used when a request does not name one.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the upstream API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "SOLACE_UPSTREAM_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GlobalConfig {
    /// Reject values that parse but would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for bucket in [Bucket::Default, Bucket::Api, Bucket::Chat] {
            let limit = self.admission.buckets.get(bucket);
            if limit.max_requests == 0 {
                return Err(ConfigError::Invalid(format!(
                    "admission.buckets.{bucket}.max_requests must be > 0"
                )));
            }
            if limit.window_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "admission.buckets.{bucket}.window_ms must be > 0"
                )));
            }
        }
        if self.admission.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "admission.max_concurrent must be > 0".to_string(),
            ));
        }
        if self.admission.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "admission.sweep_interval_ms must be > 0".to_string(),
            ));
        }
        validate_retry("retry.rate_limit", &self.retry.rate_limit)?;
        validate_retry("retry.transient", &self.retry.transient)?;
        if self.stream.capacity_bytes == 0 {
            return Err(ConfigError::Invalid(
                "stream.capacity_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_retry(section: &str, config: &RetryConfig) -> Result<(), ConfigError> {
    if config.backoff_multiplier.is_nan() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Invalid(format!(
            "{section}.backoff_multiplier must be >= 1.0"
        )));
    }
    if config.initial_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Invalid(format!(
            "{section}.initial_delay_ms must not exceed max_delay_ms"
        )));
    }
    Ok(())
}
