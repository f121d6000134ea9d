// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::compression::{Compression, CompressionPreference};
use crate::error::ConfigError;
use std::env;
use std::time::Duration;

pub const DEFAULT_TOKEN_PARAMETER: &str = "/grafana/token";
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(10);

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Runtime configuration for the report pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote-write endpoint receiving the pushes
    pub push_url: String,
    /// Basic-auth user identifier paired with the fetched token
    pub user_id: String,
    /// Name of the secret-store parameter holding the push token
    pub token_parameter: String,
    /// Timeout for a single push
    pub push_timeout: Duration,
    /// Codec negotiated once for the process lifetime
    pub compression: Compression,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            push_url: String::new(),
            user_id: String::new(),
            token_parameter: DEFAULT_TOKEN_PARAMETER.to_string(),
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            compression: Compression::negotiate(CompressionPreference::Auto),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let push_url = lookup("GRAFANA_PUSH_URL").ok_or(ConfigError::Missing("GRAFANA_PUSH_URL"))?;
        let user_id = lookup("GRAFANA_USER_ID").ok_or(ConfigError::Missing("GRAFANA_USER_ID"))?;
        let token_parameter = lookup("GRAFANA_TOKEN_PARAMETER")
            .unwrap_or_else(|| DEFAULT_TOKEN_PARAMETER.to_string());
        let push_timeout = match lookup("DMARC_PUSH_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| {
                    ConfigError::Invalid(format!("DMARC_PUSH_TIMEOUT_SECS '{raw}': {e}"))
                })?,
            None => DEFAULT_PUSH_TIMEOUT,
        };
        let preference = lookup("DMARC_COMPRESSION")
            .map(|raw| raw.parse::<CompressionPreference>())
            .transpose()
            .map_err(ConfigError::Invalid)?
            .unwrap_or_default();
        let log_level = lookup("DMARC_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        let config = Self {
            push_url,
            user_id,
            token_parameter,
            push_timeout,
            compression: Compression::negotiate(preference),
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.push_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "GRAFANA_PUSH_URL must be an http(s) URL, got '{url}'"
            )));
        }

        if self.user_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "GRAFANA_USER_ID cannot be empty".to_string(),
            ));
        }

        if self.token_parameter.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "GRAFANA_TOKEN_PARAMETER cannot be empty".to_string(),
            ));
        }

        if self.push_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "DMARC_PUSH_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
