//! Configuration module for the selection admin.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;
use crate::sync::FailurePolicy;

/// Default strftime pattern for dates shown in rows.
pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the store API to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// How link synchronisation reacts to a failed call
    pub sync_policy: FailurePolicy,
    /// strftime pattern used for row dates
    pub date_format: String,
}

/// The part of the configuration the view layer consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    pub sync_policy: FailurePolicy,
    pub date_format: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            sync_policy: FailurePolicy::AttemptAll,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("SELECTION_DB_PATH")
            .unwrap_or_else(|_| "./data/selection.sqlite".to_string())
            .into();

        let bind_addr = env::var("SELECTION_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr.parse().map_err(|_| {
            AppError::Config(format!("Invalid SELECTION_BIND_ADDR: {}", bind_addr))
        })?;

        let log_level = env::var("SELECTION_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let sync_policy = match env::var("SELECTION_SYNC_POLICY") {
            Ok(raw) => FailurePolicy::parse(&raw).ok_or_else(|| {
                AppError::Config(format!("Invalid SELECTION_SYNC_POLICY: {}", raw))
            })?,
            Err(_) => FailurePolicy::AttemptAll,
        };

        let date_format = env::var("SELECTION_DATE_FORMAT")
            .unwrap_or_else(|_| DEFAULT_DATE_FORMAT.to_string());

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            sync_policy,
            date_format,
        })
    }

    /// Settings handed to the root view-model.
    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            sync_policy: self.sync_policy,
            date_format: self.date_format.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases touch the same variables, so they run in one test.
    #[test]
    fn test_config_from_env() {
        env::remove_var("SELECTION_DB_PATH");
        env::remove_var("SELECTION_BIND_ADDR");
        env::remove_var("SELECTION_LOG_LEVEL");
        env::remove_var("SELECTION_SYNC_POLICY");
        env::remove_var("SELECTION_DATE_FORMAT");

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/selection.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sync_policy, FailurePolicy::AttemptAll);
        assert_eq!(config.view_settings(), ViewSettings::default());

        env::set_var("SELECTION_SYNC_POLICY", "fail-fast");
        let config = Config::from_env().unwrap();
        assert_eq!(config.sync_policy, FailurePolicy::FailFast);

        env::set_var("SELECTION_SYNC_POLICY", "sometimes");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        env::remove_var("SELECTION_SYNC_POLICY");
    }
}
