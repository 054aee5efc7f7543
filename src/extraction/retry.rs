//! Retry/backoff policy for extraction calls

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::traits::ExtractionError;

/// Messages that indicate the service is temporarily unable to answer
const TEMPORARY_FAILURE_MARKERS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "too many requests",
    "temporarily unavailable",
    "try again later",
    "overloaded",
];

/// HTTP status codes that signal rate limiting when quoted as a word
const RATE_LIMIT_STATUS_CODES: &[&str] = &["429"];

fn has_status_code(message: &str) -> bool {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| RATE_LIMIT_STATUS_CODES.contains(&word))
}

/// How a failed extraction call is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Service asked us to slow down; retried with exponential backoff
    RateLimited,
    /// No response at all; retried immediately, a limited number of times
    Network,
    /// Anything else; never retried
    Fatal,
}

impl FailureClass {
    /// Classify a well-formed error body
    pub fn of(error: &ExtractionError) -> Self {
        if error.rate_limited {
            return FailureClass::RateLimited;
        }
        let message = error.message.to_lowercase();
        if TEMPORARY_FAILURE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
            || has_status_code(&message)
        {
            FailureClass::RateLimited
        } else {
            FailureClass::Fatal
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Stop,
}

/// Retry limits and backoff shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed for rate-limited failures
    pub max_rate_limit_retries: u32,
    /// First backoff delay; doubles on every further retry
    pub base_delay_ms: u64,
    /// Immediate retries allowed for network failures
    pub network_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            base_delay_ms: 1000,
            network_retries: 1,
        }
    }
}

impl RetryPolicy {
    /// Decide whether to retry.
    ///
    /// `retries_so_far` counts previous retries of the same failure class.
    pub fn decide(&self, class: FailureClass, retries_so_far: u32) -> RetryDecision {
        match class {
            FailureClass::RateLimited if retries_so_far < self.max_rate_limit_retries => {
                RetryDecision::Retry {
                    delay: self.backoff_delay(retries_so_far),
                }
            }
            FailureClass::Network if retries_so_far < self.network_retries => {
                RetryDecision::Retry {
                    delay: Duration::ZERO,
                }
            }
            _ => RetryDecision::Stop,
        }
    }

    /// Delay before retry number `retry_index` (0-based): base, 2*base, 4*base...
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_index).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str, rate_limited: bool) -> ExtractionError {
        ExtractionError {
            message: message.to_string(),
            rate_limited,
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            FailureClass::of(&error("whatever", true)),
            FailureClass::RateLimited
        );
        assert_eq!(
            FailureClass::of(&error("Service Temporarily Unavailable", false)),
            FailureClass::RateLimited
        );
        assert_eq!(
            FailureClass::of(&error("item text is empty", false)),
            FailureClass::Fatal
        );
        assert_eq!(
            FailureClass::of(&error("HTTP 429: slow down", false)),
            FailureClass::RateLimited
        );
        assert_eq!(
            FailureClass::of(&error("SKU 14290 not found in catalogue", false)),
            FailureClass::Fatal
        );
        assert_eq!(
            FailureClass::of(&error("order 4291 rejected", false)),
            FailureClass::Fatal
        );
    }

    #[test]
    fn test_rate_limit_backoff_sequence() {
        let policy = RetryPolicy::default();
        let delays: Vec<RetryDecision> = (0..4)
            .map(|n| policy.decide(FailureClass::RateLimited, n))
            .collect();

        assert_eq!(
            delays,
            vec![
                RetryDecision::Retry {
                    delay: Duration::from_millis(1000)
                },
                RetryDecision::Retry {
                    delay: Duration::from_millis(2000)
                },
                RetryDecision::Retry {
                    delay: Duration::from_millis(4000)
                },
                RetryDecision::Stop,
            ]
        );
    }

    #[test]
    fn test_network_retried_once_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(FailureClass::Network, 0),
            RetryDecision::Retry {
                delay: Duration::ZERO
            }
        );
        assert_eq!(policy.decide(FailureClass::Network, 1), RetryDecision::Stop);
    }

    #[test]
    fn test_fatal_never_retried() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(FailureClass::Fatal, 0), RetryDecision::Stop);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy {
            max_rate_limit_retries: 100,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(80), Duration::from_millis(u64::MAX));
    }
}
