use std::time::Duration;

use catalog_resolver_core::contract::{CATEGORY_INDEX_NAME, MAX_LIST_LIMIT};
use thiserror::Error;

use crate::handlers::resolver::{ResolverSettings, RetryPolicy, DEFAULT_LIST_LIMIT};

pub const PRODUCT_TABLE_ENV: &str = "PRODUCT_TABLE";
pub const CATEGORY_INDEX_ENV: &str = "PRODUCT_CATEGORY_INDEX";
pub const OPERATION_TIMEOUT_ENV: &str = "STORE_OPERATION_TIMEOUT_MS";
pub const MAX_RETRIES_ENV: &str = "STORE_MAX_RETRIES";
pub const RETRY_BASE_DELAY_ENV: &str = "STORE_RETRY_BASE_DELAY_MS";
pub const LIST_DEFAULT_LIMIT_ENV: &str = "LIST_DEFAULT_LIMIT";

const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
/// Upper bound on retries so backoff stays well inside the function timeout.
pub const MAX_STORE_RETRIES: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Cold-start configuration read from the function environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub table_name: String,
    pub category_index: String,
    pub operation_timeout: Duration,
    pub retry: RetryPolicy,
    pub default_list_limit: u32,
}

impl ResolverConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let table_name = read(PRODUCT_TABLE_ENV).ok_or(ConfigError::Missing(PRODUCT_TABLE_ENV))?;
        let category_index =
            read(CATEGORY_INDEX_ENV).unwrap_or_else(|| CATEGORY_INDEX_NAME.to_string());

        let operation_timeout_ms = parse_or(
            OPERATION_TIMEOUT_ENV,
            read(OPERATION_TIMEOUT_ENV),
            DEFAULT_OPERATION_TIMEOUT_MS,
        )?;
        if operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: OPERATION_TIMEOUT_ENV,
                expected: "a positive integer",
                value: operation_timeout_ms.to_string(),
            });
        }

        let max_retries = parse_or(MAX_RETRIES_ENV, read(MAX_RETRIES_ENV), DEFAULT_MAX_RETRIES)?;
        if max_retries > MAX_STORE_RETRIES {
            return Err(ConfigError::Invalid {
                name: MAX_RETRIES_ENV,
                expected: "at most 5",
                value: max_retries.to_string(),
            });
        }
        let base_delay_ms = parse_or(
            RETRY_BASE_DELAY_ENV,
            read(RETRY_BASE_DELAY_ENV),
            DEFAULT_RETRY_BASE_DELAY_MS,
        )?;

        let default_list_limit = parse_or(
            LIST_DEFAULT_LIMIT_ENV,
            read(LIST_DEFAULT_LIMIT_ENV),
            DEFAULT_LIST_LIMIT,
        )?;
        if !(1..=MAX_LIST_LIMIT).contains(&default_list_limit) {
            return Err(ConfigError::Invalid {
                name: LIST_DEFAULT_LIMIT_ENV,
                expected: "between 1 and 1000",
                value: default_list_limit.to_string(),
            });
        }

        Ok(Self {
            table_name,
            category_index,
            operation_timeout: Duration::from_millis(operation_timeout_ms),
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(base_delay_ms),
            },
            default_list_limit,
        })
    }

    pub fn settings(&self) -> ResolverSettings {
        ResolverSettings {
            category_index: self.category_index.clone(),
            default_list_limit: self.default_list_limit,
            retry: self.retry,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a non-negative integer",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ResolverConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        ResolverConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn table_binding_is_required() {
        assert_eq!(
            config_from(&[]),
            Err(ConfigError::Missing(PRODUCT_TABLE_ENV))
        );
        assert_eq!(
            config_from(&[(PRODUCT_TABLE_ENV, "   ")]),
            Err(ConfigError::Missing(PRODUCT_TABLE_ENV))
        );
        assert_eq!(
            ConfigError::Missing(PRODUCT_TABLE_ENV).to_string(),
            "PRODUCT_TABLE must be configured"
        );
    }

    #[test]
    fn defaults_apply_when_only_table_is_set() {
        let config =
            config_from(&[(PRODUCT_TABLE_ENV, "CDKProductTable-123")]).expect("config should load");

        assert_eq!(config.table_name, "CDKProductTable-123");
        assert_eq!(config.category_index, "productsByCategory");
        assert_eq!(config.operation_timeout, Duration::from_millis(3_000));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.default_list_limit, 100);
        assert_eq!(config.settings(), ResolverSettings::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            (PRODUCT_TABLE_ENV, "products"),
            (CATEGORY_INDEX_ENV, "byCategory"),
            (OPERATION_TIMEOUT_ENV, "750"),
            (MAX_RETRIES_ENV, "0"),
            (RETRY_BASE_DELAY_ENV, "10"),
            (LIST_DEFAULT_LIMIT_ENV, "25"),
        ])
        .expect("config should load");

        assert_eq!(config.category_index, "byCategory");
        assert_eq!(config.operation_timeout, Duration::from_millis(750));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.settings().default_list_limit, 25);
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let error = config_from(&[(PRODUCT_TABLE_ENV, "products"), (MAX_RETRIES_ENV, "many")])
            .expect_err("non-numeric retries should fail");
        assert_eq!(
            error.to_string(),
            "STORE_MAX_RETRIES must be a non-negative integer, got 'many'"
        );

        assert!(matches!(
            config_from(&[(PRODUCT_TABLE_ENV, "products"), (OPERATION_TIMEOUT_ENV, "0")]),
            Err(ConfigError::Invalid { name: OPERATION_TIMEOUT_ENV, .. })
        ));
        assert!(matches!(
            config_from(&[(PRODUCT_TABLE_ENV, "products"), (LIST_DEFAULT_LIMIT_ENV, "5000")]),
            Err(ConfigError::Invalid { name: LIST_DEFAULT_LIMIT_ENV, .. })
        ));
    }

    #[test]
    fn retry_count_is_capped() {
        let capped = config_from(&[(PRODUCT_TABLE_ENV, "products"), (MAX_RETRIES_ENV, "5")])
            .expect("cap itself is allowed");
        assert_eq!(capped.retry.max_retries, MAX_STORE_RETRIES);

        let error = config_from(&[(PRODUCT_TABLE_ENV, "products"), (MAX_RETRIES_ENV, "4000000000")])
            .expect_err("huge retry count should fail");
        assert_eq!(
            error.to_string(),
            "STORE_MAX_RETRIES must be at most 5, got '4000000000'"
        );
    }
}
