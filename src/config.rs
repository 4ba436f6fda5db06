// Service configuration
// Defaults mirror the production marketplace; override from JSON or HOMESTAY_* environment variables.

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cancellation_window_hours: i64,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub public_profile_listing_limit: usize,
    pub dashboard_recent_limit: usize,
    pub dashboard_upcoming_limit: usize,
    pub dashboard_history_months: u32,
    pub default_cancel_reason: String,
    pub max_comment_length: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cancellation_window_hours: 24,
            default_page_size: 10,
            max_page_size: 100,
            public_profile_listing_limit: 6,
            dashboard_recent_limit: 5,
            dashboard_upcoming_limit: 3,
            dashboard_history_months: 6,
            default_cancel_reason: "Cancelled by user".to_string(),
            max_comment_length: 500,
        }
    }
}

pub const ENV_PREFIX: &str = "HOMESTAY_";

impl ServiceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Split out from from_env so tests don't have to touch the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServiceConfig::default();
        override_from(&lookup, "CANCELLATION_WINDOW_HOURS", &mut config.cancellation_window_hours)?;
        override_from(&lookup, "DEFAULT_PAGE_SIZE", &mut config.default_page_size)?;
        override_from(&lookup, "MAX_PAGE_SIZE", &mut config.max_page_size)?;
        override_from(
            &lookup,
            "PUBLIC_PROFILE_LISTING_LIMIT",
            &mut config.public_profile_listing_limit,
        )?;
        override_from(&lookup, "DASHBOARD_RECENT_LIMIT", &mut config.dashboard_recent_limit)?;
        override_from(&lookup, "DASHBOARD_UPCOMING_LIMIT", &mut config.dashboard_upcoming_limit)?;
        override_from(&lookup, "DASHBOARD_HISTORY_MONTHS", &mut config.dashboard_history_months)?;
        override_from(&lookup, "DEFAULT_CANCEL_REASON", &mut config.default_cancel_reason)?;
        override_from(&lookup, "MAX_COMMENT_LENGTH", &mut config.max_comment_length)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cancellation_window_hours < 0 {
            return Err(invalid("cancellation_window_hours", "must not be negative"));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(invalid("default_page_size", "page sizes must be positive"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                "must not exceed max_page_size",
            ));
        }
        if self.max_comment_length == 0 {
            return Err(invalid("max_comment_length", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn override_from<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    if let Some(raw) = lookup(&key) {
        *target = raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cancellation_window_hours, 24);
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ServiceConfig::from_json_str(r#"{"cancellation_window_hours": 48}"#).unwrap();
        assert_eq!(config.cancellation_window_hours, 48);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_json_rejects_inconsistent_page_sizes() {
        let result = ServiceConfig::from_json_str(r#"{"default_page_size": 50, "max_page_size": 20}"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HOMESTAY_MAX_PAGE_SIZE", "25"),
            ("HOMESTAY_DEFAULT_CANCEL_REASON", "Guest request"),
        ]
        .into_iter()
        .collect();
        let config =
            ServiceConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.max_page_size, 25);
        assert_eq!(config.default_cancel_reason, "Guest request");
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let result = ServiceConfig::from_lookup(|key| {
            (key == "HOMESTAY_CANCELLATION_WINDOW_HOURS").then(|| "soon".to_string())
        });
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "HOMESTAY_CANCELLATION_WINDOW_HOURS")
            }
            other => panic!("Expected invalid value error, got {:?}", other),
        }
    }
}
