// Runtime configuration
//
// Defaults live under ~/.ir-manager; environment variables override them.

use crate::error::{IrError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const STORE_PATH_ENV: &str = "IR_MANAGER_DB";
pub const TIMEOUT_ENV: &str = "IR_MANAGER_TIMEOUT";

const DATA_DIR: &str = ".ir-manager";
const STORE_FILE: &str = "ir_codes.json";

/// Seconds a learning session waits for a capture
pub const DEFAULT_LEARNING_TIMEOUT: u64 = 30;
/// Seconds between polls of the capture device
pub const DEFAULT_POLL_INTERVAL: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub store_path: PathBuf,
    #[serde(with = "seconds")]
    pub learning_timeout: Duration,
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
}

impl Config {
    /// Defaults, with the store in the user's home directory
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| IrError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_store_path(home.join(DATA_DIR).join(STORE_FILE)))
    }

    pub fn with_store_path(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            learning_timeout: Duration::from_secs(DEFAULT_LEARNING_TIMEOUT),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
        }
    }

    /// Defaults overridden by `IR_MANAGER_DB` and `IR_MANAGER_TIMEOUT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(STORE_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => Self::with_store_path(path.trim()),
            _ => Self::new()?,
        };

        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            let secs: u64 = timeout.trim().parse().map_err(|_| {
                IrError::Config(format!("{} must be whole seconds, got '{}'", TIMEOUT_ENV, timeout))
            })?;
            if secs == 0 {
                return Err(IrError::Config(format!("{} must be positive", TIMEOUT_ENV)));
            }
            config.learning_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            (STORE_PATH_ENV, "/tmp/codes.json"),
            (TIMEOUT_ENV, "45"),
        ]))
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/tmp/codes.json"));
        assert_eq!(config.learning_timeout, Duration::from_secs(45));
        assert_eq!(config.poll_interval, Duration::from_secs(DEFAULT_POLL_INTERVAL));
    }

    #[test]
    fn test_bad_timeout() {
        for bad in ["soon", "0", "-3"] {
            let result = Config::from_lookup(lookup(&[
                (STORE_PATH_ENV, "/tmp/codes.json"),
                (TIMEOUT_ENV, bad),
            ]));
            match result {
                Err(IrError::Config(_)) => {}
                other => panic!("Expected Config error for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::with_store_path("codes.json");
        assert_eq!(config.learning_timeout, Duration::from_secs(30));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["learning_timeout"], 30);
        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
