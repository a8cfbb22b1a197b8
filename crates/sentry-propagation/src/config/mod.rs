// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration of trace propagation and sampling.
//!
//! # Sources
//!
//! - **Environment**: [`Config::from_env`] reads `SENTRY_TRACES_SAMPLE_RATE`,
//!   `SENTRY_PROPAGATE_TRACES` and `SENTRY_LOG_LEVEL`
//! - **Structured data**: `Config` deserializes from any serde format, with
//!   lenient parsing of numbers and booleans given as strings
//! - **Programmatically**: `Config { traces_sample_rate: Some(0.5), ..Default::default() }`
//!
//! # Defaults
//!
//! No sample rate (every root transaction is unsampled), propagation on, log
//! level `WARN`.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_aux::prelude::deserialize_bool_from_anything;
use serde_json::Value;
use tracing::error;

use crate::error::ConfigError;
use log_level::LogLevel;

pub mod log_level;

pub const TRACES_SAMPLE_RATE_ENV: &str = "SENTRY_TRACES_SAMPLE_RATE";
pub const PROPAGATE_TRACES_ENV: &str = "SENTRY_PROPAGATE_TRACES";
pub const LOG_LEVEL_ENV: &str = "SENTRY_LOG_LEVEL";

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rate applied to root transactions, in `[0, 1]`.
    #[serde(deserialize_with = "deserialize_optional_sample_rate")]
    pub traces_sample_rate: Option<f64>,
    /// Whether outgoing requests receive `sentry-trace` and `baggage`.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub propagate_traces: bool,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            traces_sample_rate: None,
            propagate_traces: true,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from environment variables.
    ///
    /// Unset variables keep their default. A set variable that cannot be
    /// parsed is an error rather than being silently ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(rate) = env::var(TRACES_SAMPLE_RATE_ENV) {
            let rate = rate.trim();
            if !rate.is_empty() {
                let parsed = rate
                    .parse::<f64>()
                    .map_err(|_| invalid_value(TRACES_SAMPLE_RATE_ENV, rate))?;
                config.traces_sample_rate = Some(parsed);
            }
        }

        if let Ok(propagate) = env::var(PROPAGATE_TRACES_ENV) {
            config.propagate_traces =
                deserialize_bool_from_anything(Value::String(propagate.trim().to_lowercase()))
                    .map_err(|_| invalid_value(PROPAGATE_TRACES_ENV, &propagate))?;
        }

        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            config.log_level =
                LogLevel::from_str(&level).map_err(|_| invalid_value(LOG_LEVEL_ENV, &level))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.traces_sample_rate {
            Some(rate) if !(0.0..=1.0).contains(&rate) => {
                Err(ConfigError::InvalidSampleRate(rate))
            }
            _ => Ok(()),
        }
    }
}

fn invalid_value(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

/// Accepts a number or a numeric string; anything else is logged and ignored.
pub fn deserialize_optional_sample_rate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(rate) => Ok(Some(rate)),
            Err(_) => {
                error!("Failed to parse sample rate `{s}`, ignoring");
                Ok(None)
            }
        },
        other => {
            error!(
                "Failed to parse value, expected a number or a string, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}
