use crate::engine::LongestStreakPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "data/habits.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HABITS_LONGEST_STREAK: {0}")]
    LongestStreak(String),
    #[error("HABITS_BUSY_TIMEOUT_MS: expected milliseconds, got '{0}'")]
    BusyTimeout(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub longest_streak: LongestStreakPolicy,
    pub busy_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = lookup("HABITS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let longest_streak = match lookup("HABITS_LONGEST_STREAK") {
            Some(value) => value
                .parse::<LongestStreakPolicy>()
                .map_err(ConfigError::LongestStreak)?,
            None => LongestStreakPolicy::default(),
        };

        let busy_timeout = match lookup("HABITS_BUSY_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::BusyTimeout(value.clone()))?,
            None => Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };

        Ok(Self {
            port,
            db_path,
            longest_streak,
            busy_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("data/habits.sqlite3"));
        assert_eq!(config.longest_streak, LongestStreakPolicy::ExtensionOnly);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("HABITS_DB_PATH", "/tmp/h.sqlite3"),
            ("HABITS_LONGEST_STREAK", "monotonic"),
            ("HABITS_BUSY_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/h.sqlite3"));
        assert_eq!(config.longest_streak, LongestStreakPolicy::Monotonic);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = config_from(&[("HABITS_LONGEST_STREAK", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::LongestStreak(_)));
        assert!(config_from(&[("HABITS_BUSY_TIMEOUT_MS", "soon")]).is_err());
    }
}
