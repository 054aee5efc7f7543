//! Engine configuration
//!
//! Environment variables (all optional):
//! - `RECON_POOL_LIMIT`: transactions fetched per candidate search (default: 200)
//! - `RECON_AMOUNT_TOLERANCE`: absolute amount tolerance (default: 0.01)
//! - `RECON_RATE_LIMIT_RETRIES`: retries on rate-limited extraction (default: 3)
//! - `RECON_BACKOFF_BASE_MS`: first backoff delay in milliseconds (default: 1000)

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::extraction::RetryPolicy;
use crate::types::*;

/// Settings for [`crate::ReconciliationEngine`] and [`crate::ExtractionWorkflow`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of transactions fetched for a pool-wide candidate search
    pub pool_limit: usize,
    /// Amounts closer than this are considered equal
    pub amount_tolerance: BigDecimal,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_limit: 200,
            amount_tolerance: default_tolerance(),
            retry: RetryPolicy::default(),
        }
    }
}

/// 0.01 currency units
pub fn default_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

impl EngineConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> ReconResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ReconResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("RECON_POOL_LIMIT") {
            config.pool_limit = parse_value("RECON_POOL_LIMIT", &value)?;
            if config.pool_limit == 0 {
                return Err(ReconError::Validation(
                    "RECON_POOL_LIMIT must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(value) = lookup("RECON_AMOUNT_TOLERANCE") {
            config.amount_tolerance = parse_value("RECON_AMOUNT_TOLERANCE", &value)?;
            if config.amount_tolerance <= BigDecimal::from(0) {
                return Err(ReconError::Validation(
                    "RECON_AMOUNT_TOLERANCE must be positive".to_string(),
                ));
            }
        }
        if let Some(value) = lookup("RECON_RATE_LIMIT_RETRIES") {
            config.retry.max_rate_limit_retries = parse_value("RECON_RATE_LIMIT_RETRIES", &value)?;
        }
        if let Some(value) = lookup("RECON_BACKOFF_BASE_MS") {
            config.retry.base_delay_ms = parse_value("RECON_BACKOFF_BASE_MS", &value)?;
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> ReconResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ReconError::Validation(format!("Invalid value for {}: '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_limit, 200);
        assert_eq!(config.amount_tolerance, BigDecimal::from_str("0.01").unwrap());
        assert_eq!(config.retry.max_rate_limit_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.network_retries, 1);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RECON_POOL_LIMIT", "500"),
            ("RECON_RATE_LIMIT_RETRIES", "5"),
            ("RECON_AMOUNT_TOLERANCE", "0.05"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.pool_limit, 500);
        assert_eq!(config.retry.max_rate_limit_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.amount_tolerance, BigDecimal::from_str("0.05").unwrap());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = EngineConfig::from_lookup(|k| {
            (k == "RECON_BACKOFF_BASE_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ReconError::Validation(_))));

        let result =
            EngineConfig::from_lookup(|k| (k == "RECON_POOL_LIMIT").then(|| "0".to_string()));
        assert!(matches!(result, Err(ReconError::Validation(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(r#"{"pool_limit": 300}"#).unwrap();
        assert_eq!(config.pool_limit, 300);
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
