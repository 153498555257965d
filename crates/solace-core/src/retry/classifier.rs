//! Decides whether an upstream failure is worth retrying.
//!
//! Checks run in a fixed order and the first match wins:
//! 1. an explicit `retryable` flag set by the generator
//! 2. client-error wording in the message (beats any status code)
//! 3. status code: 408, 429, 5xx
//! 4. rate-limit wording, then network wording
//! 5. any other 4xx is a client error; everything else is unknown

use solace_types::llm::UpstreamError;
use solace_types::retry::{Classification, ErrorCategory};

const CLIENT_PATTERNS: &[&str] = &[
    "invalid",
    "unauthorized",
    "forbidden",
    "not found",
    "validation",
];

const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "rate-limit", "too many requests"];

const NETWORK_PATTERNS: &[&str] = &[
    "connection reset",
    "connection refused",
    "timed out",
    "timeout",
    "dns",
    "socket",
    "broken pipe",
    "econnreset",
    "econnrefused",
    "network",
];

pub fn classify(error: &UpstreamError) -> Classification {
    let message = error.message.to_lowercase();

    if let Some(retryable) = error.retryable {
        let category = category_hint(error.status, &message);
        return Classification {
            retryable,
            category,
        };
    }

    if contains_any(&message, CLIENT_PATTERNS) {
        return Classification::fatal(ErrorCategory::Client);
    }

    match error.status {
        Some(408) => return Classification::retryable(ErrorCategory::Network),
        Some(429) => return Classification::retryable(ErrorCategory::RateLimited),
        Some(500..=599) => return Classification::retryable(ErrorCategory::TransientServer),
        _ => {}
    }

    if contains_any(&message, RATE_LIMIT_PATTERNS) {
        return Classification::retryable(ErrorCategory::RateLimited);
    }
    if contains_any(&message, NETWORK_PATTERNS) {
        return Classification::retryable(ErrorCategory::Network);
    }

    match error.status {
        Some(400..=499) => Classification::fatal(ErrorCategory::Client),
        _ => Classification::fatal(ErrorCategory::Unknown),
    }
}

/// Best-effort category for errors whose retryability was set explicitly.
fn category_hint(status: Option<u16>, message: &str) -> ErrorCategory {
    match status {
        Some(408) => ErrorCategory::Network,
        Some(429) => ErrorCategory::RateLimited,
        Some(500..=599) => ErrorCategory::TransientServer,
        Some(400..=499) => ErrorCategory::Client,
        _ if contains_any(message, RATE_LIMIT_PATTERNS) => ErrorCategory::RateLimited,
        _ if contains_any(message, NETWORK_PATTERNS) => ErrorCategory::Network,
        _ => ErrorCategory::Unknown,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
