//! Admission control types: traffic buckets, limits, and decisions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Traffic class with its own request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Default,
    Api,
    Chat,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Default => write!(f, "default"),
            Bucket::Api => write!(f, "api"),
            Bucket::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Bucket::Default),
            "api" => Ok(Bucket::Api),
            "chat" => Ok(Bucket::Chat),
            other => Err(format!("invalid bucket: '{other}'")),
        }
    }
}

/// Request budget for one bucket: `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl WindowLimit {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

/// Per-bucket window limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLimits {
    #[serde(default = "default_bucket_limit")]
    pub default: WindowLimit,
    #[serde(default = "api_bucket_limit")]
    pub api: WindowLimit,
    #[serde(default = "chat_bucket_limit")]
    pub chat: WindowLimit,
}

fn default_bucket_limit() -> WindowLimit {
    WindowLimit::new(100, 60_000)
}

fn api_bucket_limit() -> WindowLimit {
    WindowLimit::new(60, 60_000)
}

fn chat_bucket_limit() -> WindowLimit {
    WindowLimit::new(20, 60_000)
}

impl BucketLimits {
    pub fn get(&self, bucket: Bucket) -> WindowLimit {
        match bucket {
            Bucket::Default => self.default,
            Bucket::Api => self.api,
            Bucket::Chat => self.chat,
        }
    }

    pub fn set(&mut self, bucket: Bucket, limit: WindowLimit) {
        match bucket {
            Bucket::Default => self.default = limit,
            Bucket::Api => self.api = limit,
            Bucket::Chat => self.chat = limit,
        }
    }
}

impl Default for BucketLimits {
    fn default() -> Self {
        Self {
            default: default_bucket_limit(),
            api: api_bucket_limit(),
            chat: chat_bucket_limit(),
        }
    }
}

/// Admission controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub buckets: BucketLimits,

    /// Maximum concurrently streaming requests per identity.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Retry hint returned when the concurrency gate denies.
    #[serde(default = "default_concurrency_retry_after_secs")]
    pub concurrency_retry_after_secs: u64,

    /// Interval between background sweeps of expired state.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// How long an idle, zero-count in-flight entry survives the sweep.
    #[serde(default = "default_in_flight_idle_ms")]
    pub in_flight_idle_ms: u64,

    /// Key identities on `X-Forwarded-For` / `X-Real-IP`. Only enable behind
    /// a proxy that overwrites these headers; otherwise the socket peer is used.
    #[serde(default)]
    pub trust_forwarded_headers: bool,

    /// Key identities on the presented API key. Only enable when an upstream
    /// gateway has already validated the key.
    #[serde(default)]
    pub trust_api_key_identity: bool,
}

fn default_max_concurrent() -> u32 {
    3
}

fn default_concurrency_retry_after_secs() -> u64 {
    1
}

fn default_sweep_interval_ms() -> u64 {
    5_000
}

fn default_in_flight_idle_ms() -> u64 {
    600_000
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            buckets: BucketLimits::default(),
            max_concurrent: default_max_concurrent(),
            concurrency_retry_after_secs: default_concurrency_retry_after_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
            in_flight_idle_ms: default_in_flight_idle_ms(),
            trust_forwarded_headers: false,
            trust_api_key_identity: false,
        }
    }
}

/// Which gate rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    WindowExceeded,
    ConcurrencyExceeded,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::WindowExceeded => write!(f, "window_exceeded"),
            DenyReason::ConcurrencyExceeded => write!(f, "concurrency_exceeded"),
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allowed,
    Denied {
        retry_after_secs: u64,
        reason: DenyReason,
    },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allowed)
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AdmissionDecision::Allowed => None,
            AdmissionDecision::Denied {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
        }
    }
}

/// Point-in-time view of the controller's tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub tracked_windows: usize,
    pub tracked_identities: usize,
    pub total_in_flight: u64,
}
