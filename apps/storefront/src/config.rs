//! Storefront configuration module.
//!
//! Configuration is loaded from `ARCADE_*` environment variables with
//! fallback to defaults.
//!
//! | Variable                          | Default                       |
//! |-----------------------------------|-------------------------------|
//! | `ARCADE_DB_PATH`                  | platform data dir `arcade.db` |
//! | `ARCADE_DB_MAX_CONNECTIONS`       | 5                             |
//! | `ARCADE_CATALOG_CACHE_TTL_SECS`   | 60                            |
//! | `ARCADE_PROFILE_CACHE_TTL_SECS`   | 30                            |
//! | `ARCADE_OWNED_PURCHASE_POLICY`    | `allow`                       |
//! | `ARCADE_DISCOUNT_USAGE_MODE`      | `after_commit`                |
//! | `ARCADE_COMMIT_MAX_RETRIES`       | 3                             |
//! | `ARCADE_COMMIT_RETRY_INITIAL_MS`  | 20                            |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use arcade_core::{DiscountUsageMode, OwnedPurchasePolicy};
use arcade_db::{DbConfig, SettlementOptions};
use directories::ProjectDirs;
use serde::Serialize;

/// Storefront configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorefrontConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Connection pool size
    pub db_max_connections: u32,

    /// TTL of cached catalog listings
    pub catalog_cache_ttl: Duration,

    /// TTL of cached profile and login lookups
    pub profile_cache_ttl: Duration,

    /// What a direct purchase of an owned game does
    pub owned_purchase_policy: OwnedPurchasePolicy,

    /// Where discount usage is recorded relative to the settlement commit
    pub discount_usage_mode: DiscountUsageMode,

    /// Retries of the settlement transaction after a busy abort
    pub commit_max_retries: u32,

    /// First backoff interval between those retries
    pub commit_retry_initial: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match lookup("ARCADE_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let config = StorefrontConfig {
            db_path,
            db_max_connections: parse_or(&lookup, "ARCADE_DB_MAX_CONNECTIONS", 5)?,
            catalog_cache_ttl: Duration::from_secs(parse_or(&lookup, "ARCADE_CATALOG_CACHE_TTL_SECS", 60)?),
            profile_cache_ttl: Duration::from_secs(parse_or(&lookup, "ARCADE_PROFILE_CACHE_TTL_SECS", 30)?),
            owned_purchase_policy: parse_or(
                &lookup,
                "ARCADE_OWNED_PURCHASE_POLICY",
                OwnedPurchasePolicy::default(),
            )?,
            discount_usage_mode: parse_or(
                &lookup,
                "ARCADE_DISCOUNT_USAGE_MODE",
                DiscountUsageMode::default(),
            )?,
            commit_max_retries: parse_or(&lookup, "ARCADE_COMMIT_MAX_RETRIES", 3)?,
            commit_retry_initial: Duration::from_millis(parse_or(&lookup, "ARCADE_COMMIT_RETRY_INITIAL_MS", 20)?),
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("ARCADE_DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Pool configuration for this storefront.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path).max_connections(self.db_max_connections)
    }

    /// Settlement behaviour for this storefront.
    pub fn settlement_options(&self) -> SettlementOptions {
        SettlementOptions {
            owned_purchase_policy: self.owned_purchase_policy,
            discount_usage_mode: self.discount_usage_mode,
            max_commit_retries: self.commit_max_retries,
            initial_retry_backoff: self.commit_retry_initial,
            ..SettlementOptions::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Platform data directory.
///
/// - **macOS**: `~/Library/Application Support/com.arcade.storefront/arcade.db`
/// - **Windows**: `%APPDATA%\arcade\storefront\data\arcade.db`
/// - **Linux**: `~/.local/share/storefront/arcade.db`
fn default_db_path() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("com", "arcade", "storefront").ok_or(ConfigError::NoDataDirectory)?;
    Ok(dirs.data_dir().join("arcade.db"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Could not determine the app data directory; set ARCADE_DB_PATH")]
    NoDataDirectory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::from_lookup(lookup(&[("ARCADE_DB_PATH", "/tmp/a.db")])).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/a.db"));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.profile_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.owned_purchase_policy, OwnedPurchasePolicy::AllowRepurchase);
        assert_eq!(config.discount_usage_mode, DiscountUsageMode::AfterCommit);
        assert_eq!(config.commit_max_retries, 3);
    }

    #[test]
    fn test_overrides() {
        let config = StorefrontConfig::from_lookup(lookup(&[
            ("ARCADE_DB_PATH", "/tmp/a.db"),
            ("ARCADE_OWNED_PURCHASE_POLICY", "reject"),
            ("ARCADE_DISCOUNT_USAGE_MODE", "reserve-first"),
            ("ARCADE_COMMIT_RETRY_INITIAL_MS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.owned_purchase_policy, OwnedPurchasePolicy::Reject);
        assert_eq!(config.discount_usage_mode, DiscountUsageMode::ReserveFirst);

        let options = config.settlement_options();
        assert_eq!(options.owned_purchase_policy, OwnedPurchasePolicy::Reject);
        assert_eq!(options.initial_retry_backoff, Duration::from_millis(5));
    }

    #[test]
    fn test_invalid_values() {
        let err = StorefrontConfig::from_lookup(lookup(&[
            ("ARCADE_DB_PATH", "/tmp/a.db"),
            ("ARCADE_DISCOUNT_USAGE_MODE", "whenever"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name) if name == "ARCADE_DISCOUNT_USAGE_MODE"));

        let err = StorefrontConfig::from_lookup(lookup(&[
            ("ARCADE_DB_PATH", "/tmp/a.db"),
            ("ARCADE_DB_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
