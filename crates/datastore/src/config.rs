//! Datastore configuration
//!
//! Values are loaded from defaults, environment variables prefixed with
//! `ELIF_DATASTORE_`, or a YAML document. The deadline and read policy are
//! opaque to the model layer and handed to every storage call unchanged.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Consistency requested from range scans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    #[default]
    Strong,
    Eventual,
}

impl FromStr for ReadPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strong" => Ok(ReadPolicy::Strong),
            "eventual" => Ok(ReadPolicy::Eventual),
            _ => Err(ConfigError::invalid_value("read_policy", s, "strong or eventual")),
        }
    }
}

/// Datastore configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Deadline for each storage call, in milliseconds
    pub deadline_ms: Option<u64>,
    /// Read consistency for queries
    pub read_policy: ReadPolicy,
    /// Retries the transaction runner performs on contention
    pub transaction_retries: u32,
    /// Let a later schema replace an earlier one registered under the same kind
    pub allow_kind_redefinition: bool,
    /// Upper bound on the sub-queries a disjunctive query may fan out into
    pub max_query_sets: usize,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            deadline_ms: None,
            read_policy: ReadPolicy::Strong,
            transaction_retries: 3,
            allow_kind_redefinition: false,
            max_query_sets: 30,
        }
    }
}

impl DatastoreConfig {
    const ENV_PREFIX: &'static str = "ELIF_DATASTORE_";

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = Self::env_var("DEADLINE_MS") {
            let deadline = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid_value("deadline_ms", &raw, "milliseconds as an integer"))?;
            config.deadline_ms = Some(deadline);
        }
        if let Some(raw) = Self::env_var("READ_POLICY") {
            config.read_policy = raw.parse()?;
        }
        if let Some(raw) = Self::env_var("TRANSACTION_RETRIES") {
            config.transaction_retries = raw
                .parse()
                .map_err(|_| ConfigError::invalid_value("transaction_retries", &raw, "a non-negative integer"))?;
        }
        if let Some(raw) = Self::env_var("ALLOW_KIND_REDEFINITION") {
            config.allow_kind_redefinition = parse_bool("allow_kind_redefinition", &raw)?;
        }
        if let Some(raw) = Self::env_var("MAX_QUERY_SETS") {
            config.max_query_sets = raw
                .parse()
                .map_err(|_| ConfigError::invalid_value("max_query_sets", &raw, "a positive integer"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_query_sets == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "max_query_sets must be at least 1".to_string(),
            });
        }
        if self.deadline_ms == Some(0) {
            return Err(ConfigError::ValidationFailed {
                message: "deadline_ms must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    fn env_var(name: &str) -> Option<String> {
        env::var(format!("{}{}", Self::ENV_PREFIX, name)).ok()
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, raw, "a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DatastoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transaction_retries, 3);
        assert_eq!(config.max_query_sets, 30);
        assert!(config.deadline().is_none());
    }

    #[test]
    fn test_yaml_overrides() {
        let config = DatastoreConfig::from_yaml_str(
            "deadline_ms: 250\nread_policy: eventual\nallow_kind_redefinition: true\n",
        )
        .unwrap();

        assert_eq!(config.deadline(), Some(Duration::from_millis(250)));
        assert_eq!(config.read_policy, ReadPolicy::Eventual);
        assert!(config.allow_kind_redefinition);
        assert_eq!(config.transaction_retries, 3);
    }

    #[test]
    fn test_invalid_yaml_values() {
        assert!(DatastoreConfig::from_yaml_str("max_query_sets: 0\n").is_err());
        assert!(DatastoreConfig::from_yaml_str("read_policy: sometimes\n").is_err());
    }

    #[test]
    fn test_read_policy_parsing() {
        assert_eq!("STRONG".parse::<ReadPolicy>().unwrap(), ReadPolicy::Strong);
        assert!("weak".parse::<ReadPolicy>().is_err());
        assert!(parse_bool("flag", "maybe").is_err());
        assert!(parse_bool("flag", "Yes").unwrap());
    }
}
