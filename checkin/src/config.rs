//! Configuration management for the check-in tool.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The binary calls `dotenvy::dotenv()` first, so a `.env` file next to the
//! working directory works too.

use crate::error::ConfigError;
use crate::reducer::DEFAULT_FEEDBACK_CLEAR;
use crate::scanner::DEFAULT_SCAN_COOLDOWN;
use crate::types::InputSource;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// JSON file listing valid codes (`TURNSTILE_TICKETS_PATH`)
    pub tickets_path: PathBuf,
    /// Directory of the key-value store (`TURNSTILE_DATA_DIR`)
    pub data_dir: PathBuf,
    /// How plain console lines are treated (`TURNSTILE_INPUT_MODE`)
    pub input_mode: InputSource,
    /// Minimum interval between accepted scans (`TURNSTILE_SCAN_COOLDOWN_MS`)
    pub scan_cooldown: Duration,
    /// How long a banner stays up (`TURNSTILE_FEEDBACK_CLEAR_MS`)
    pub feedback_clear_after: Duration,
    /// Retries for a failed used-ticket write (`TURNSTILE_PERSIST_RETRIES`)
    pub persist_retries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tickets_path: PathBuf::from("tickets.json"),
            data_dir: PathBuf::from(".turnstile"),
            input_mode: InputSource::Manual,
            scan_cooldown: DEFAULT_SCAN_COOLDOWN,
            feedback_clear_after: DEFAULT_FEEDBACK_CLEAR,
            persist_retries: 2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set to
    /// something unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set to
    /// something unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            tickets_path: get("TURNSTILE_TICKETS_PATH").map_or(defaults.tickets_path, PathBuf::from),
            data_dir: get("TURNSTILE_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            input_mode: get("TURNSTILE_INPUT_MODE")
                .map(|value| parse_input_mode(&value))
                .transpose()?
                .unwrap_or(defaults.input_mode),
            scan_cooldown: get("TURNSTILE_SCAN_COOLDOWN_MS")
                .map(|value| parse_number::<u64>("TURNSTILE_SCAN_COOLDOWN_MS", &value))
                .transpose()?
                .map_or(defaults.scan_cooldown, Duration::from_millis),
            feedback_clear_after: get("TURNSTILE_FEEDBACK_CLEAR_MS")
                .map(|value| parse_number::<u64>("TURNSTILE_FEEDBACK_CLEAR_MS", &value))
                .transpose()?
                .map_or(defaults.feedback_clear_after, Duration::from_millis),
            persist_retries: get("TURNSTILE_PERSIST_RETRIES")
                .map(|value| parse_number::<usize>("TURNSTILE_PERSIST_RETRIES", &value))
                .transpose()?
                .unwrap_or(defaults.persist_retries),
        })
    }
}

fn parse_input_mode(value: &str) -> Result<InputSource, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "manual" => Ok(InputSource::Manual),
        "scan" => Ok(InputSource::Scan),
        _ => Err(ConfigError::InvalidValue {
            var: "TURNSTILE_INPUT_MODE",
            value: value.to_string(),
            reason: "expected manual or scan".to_string(),
        }),
    }
}

fn parse_number<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scan_cooldown, Duration::from_millis(1500));
        assert_eq!(config.persist_retries, 2);
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("TURNSTILE_TICKETS_PATH", "/srv/event/tickets.json"),
            ("TURNSTILE_DATA_DIR", "/var/lib/turnstile"),
            ("TURNSTILE_INPUT_MODE", " Scan "),
            ("TURNSTILE_SCAN_COOLDOWN_MS", "800"),
            ("TURNSTILE_FEEDBACK_CLEAR_MS", "3000"),
            ("TURNSTILE_PERSIST_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.tickets_path, PathBuf::from("/srv/event/tickets.json"));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/turnstile"));
        assert_eq!(config.input_mode, InputSource::Scan);
        assert_eq!(config.scan_cooldown, Duration::from_millis(800));
        assert_eq!(config.feedback_clear_after, Duration::from_secs(3));
        assert_eq!(config.persist_retries, 0);
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("TURNSTILE_INPUT_MODE", "  ")])).unwrap();
        assert_eq!(config.input_mode, InputSource::Manual);
    }

    #[test]
    fn rejects_unknown_input_mode() {
        let err = Config::from_lookup(lookup(&[("TURNSTILE_INPUT_MODE", "camera")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var: "TURNSTILE_INPUT_MODE", .. }
        ));
    }

    #[test]
    fn rejects_non_numeric_durations() {
        let err =
            Config::from_lookup(lookup(&[("TURNSTILE_SCAN_COOLDOWN_MS", "fast")])).unwrap_err();
        assert!(err.to_string().contains("TURNSTILE_SCAN_COOLDOWN_MS"));

        assert!(Config::from_lookup(lookup(&[("TURNSTILE_PERSIST_RETRIES", "-1")])).is_err());
    }
}
