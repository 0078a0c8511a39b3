use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset};
use serde::Deserialize;
use thiserror::Error;

use crate::metrics::{utc_offset, MetricsConfig, DEFAULT_STAY_MINUTES};

pub const DEFAULT_CONFIG_PATH: &str = "condo-dashboard.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsSection {
    /// Fixed UTC offset such as "-05:00"; defaults to UTC.
    pub utc_offset: Option<String>,
    pub placeholder_stay_minutes: Option<i64>,
    /// Enables entry/exit pairing for the average stay.
    pub pair_stays_within_hours: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseSection {
    pub max_connections: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid UTC offset {0:?}, expected +HH:MM, -HH:MM or UTC")]
    InvalidOffset(String),
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

/// Loads an explicit config file, or the default one when it exists.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_from_path(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return Ok(utc_offset());
    }

    let invalid = || ConfigError::InvalidOffset(value.to_string());
    let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

impl Config {
    pub fn max_connections(&self) -> u32 {
        self.database
            .max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// Builds the aggregator settings. `offset_override` comes from the command line.
    pub fn metrics_config(&self, offset_override: Option<&str>) -> Result<MetricsConfig, ConfigError> {
        let offset = match offset_override.or(self.metrics.utc_offset.as_deref()) {
            Some(value) => parse_utc_offset(value)?,
            None => utc_offset(),
        };

        Ok(MetricsConfig {
            offset,
            placeholder_stay_minutes: self
                .metrics
                .placeholder_stay_minutes
                .unwrap_or(DEFAULT_STAY_MINUTES),
            stay_pairing_window: self
                .metrics
                .pair_stays_within_hours
                .map(|hours| Duration::hours(i64::from(hours))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_utc_offset("UTC").unwrap(), utc_offset());
        assert_eq!(parse_utc_offset("Z").unwrap(), utc_offset());
        assert_eq!(
            parse_utc_offset("-05:00").unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
        assert_eq!(
            parse_utc_offset("+05:30").unwrap(),
            FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
        );
    }

    #[test]
    fn rejects_malformed_offsets() {
        for value in ["", "05:00", "+5:00", "+05", "+25:00", "+05:75", "America/Bogota"] {
            assert!(
                matches!(parse_utc_offset(value), Err(ConfigError::InvalidOffset(_))),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.max_connections(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.metrics_config(None).unwrap(), MetricsConfig::default());
    }

    #[test]
    fn metrics_section_and_override() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "debug"

            [metrics]
            utc_offset = "-05:00"
            placeholder_stay_minutes = 30
            pair_stays_within_hours = 12

            [database]
            max_connections = 2
            "#,
        )
        .unwrap();

        let metrics = config.metrics_config(None).unwrap();
        assert_eq!(metrics.offset, FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(metrics.placeholder_stay_minutes, 30);
        assert_eq!(metrics.stay_pairing_window, Some(Duration::hours(12)));
        assert_eq!(config.max_connections(), 2);

        let overridden = config.metrics_config(Some("+02:00")).unwrap();
        assert_eq!(overridden.offset, FixedOffset::east_opt(2 * 3600).unwrap());
    }
}
