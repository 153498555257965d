//! Retry configuration and error classification types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backoff parameters for one class of failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed after the initial attempt.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    /// Scale each delay by a uniform factor in `[0.5, 1.0]`.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl RetryConfig {
    /// Preset for rate-limit failures: more attempts, longer waits.
    pub fn rate_limit() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: default_multiplier(),
            jitter: true,
        }
    }

    /// Preset for generic transient failures: fewer attempts, short waits.
    pub fn transient() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

/// The pair of presets used by the retry loop, selected per error category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "RetryConfig::rate_limit")]
    pub rate_limit: RetryConfig,
    #[serde(default = "RetryConfig::transient")]
    pub transient: RetryConfig,
}

impl RetryPolicy {
    /// Use the same configuration for every category.
    pub fn uniform(config: RetryConfig) -> Self {
        Self {
            rate_limit: config.clone(),
            transient: config,
        }
    }

    pub fn config_for(&self, category: ErrorCategory) -> &RetryConfig {
        match category {
            ErrorCategory::RateLimited => &self.rate_limit,
            _ => &self.transient,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit: RetryConfig::rate_limit(),
            transient: RetryConfig::transient(),
        }
    }
}

/// Coarse failure category driving retry and admission decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    RateLimited,
    TransientServer,
    Client,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::RateLimited => write!(f, "rate_limited"),
            ErrorCategory::TransientServer => write!(f, "transient_server"),
            ErrorCategory::Client => write!(f, "client"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Output of the error classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub retryable: bool,
    pub category: ErrorCategory,
}

impl Classification {
    pub const fn retryable(category: ErrorCategory) -> Self {
        Self {
            retryable: true,
            category,
        }
    }

    pub const fn fatal(category: ErrorCategory) -> Self {
        Self {
            retryable: false,
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_by_category() {
        let policy = RetryPolicy::default();
        let rl = policy.config_for(ErrorCategory::RateLimited);
        let tr = policy.config_for(ErrorCategory::Network);
        assert!(rl.max_attempts > tr.max_attempts);
        assert!(rl.max_delay_ms > tr.max_delay_ms);
        assert_eq!(policy.config_for(ErrorCategory::TransientServer), tr);
    }

    #[test]
    fn retry_config_defaults_from_toml() {
        let toml_str = r#"
max_attempts = 4
initial_delay_ms = 100
max_delay_ms = 1000
"#;
        let config: RetryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_attempts, 4);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(config.jitter);
    }
}
