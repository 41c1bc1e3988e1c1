//! Configuration for the station statistics service.
//!
//! The configuration is read once at startup and handed to whatever needs
//! it; nothing below this layer caches or re-reads it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store snapshot file
    pub data_path: PathBuf,

    /// Time series length used when a query does not ask for one
    pub output_points: usize,

    /// Upper bound for requested time series lengths
    pub max_output_points: usize,

    /// How long data is kept before `prune` removes it
    #[serde(with = "duration_serde")]
    pub retention: Duration,

    /// Port for the HTTP server
    pub server_port: u16,

    /// Log filter used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anemometer-stats");

        Self {
            data_path: data_dir.join("store.json"),
            output_points: 100,
            max_output_points: 1000,
            retention: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            server_port: 8080,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, using defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anemometer-stats")
            .join("config.json")
    }

    /// Clamp a requested series length, falling back to the default.
    pub fn output_points(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.output_points)
            .min(self.max_output_points)
    }

    /// Timestamp (ms) before which data is outside the retention window.
    pub fn retention_cutoff(&self, now_ms: i64) -> i64 {
        now_ms - self.retention.as_millis() as i64
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_points, 100);
        assert_eq!(config.retention, Duration::from_secs(2_592_000));
        assert!(config.data_path.ends_with("store.json"));
    }

    #[test]
    fn test_output_points_clamped() {
        let config = Config::default();
        assert_eq!(config.output_points(None), 100);
        assert_eq!(config.output_points(Some(20)), 20);
        assert_eq!(config.output_points(Some(50_000)), 1000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!(
            "anemometer-stats-config-test-{}",
            std::process::id()
        ));
        let path = dir.join("nested").join("config.json");

        let config = Config {
            output_points: 250,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            server_port: 9090,
            log_level: "debug".to_string(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("anemometer-stats-no-such-config.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"output_points": 42, "retention": 60}"#).unwrap();
        assert_eq!(config.output_points, 42);
        assert_eq!(config.retention, Duration::from_secs(60));
        assert_eq!(config.retention_cutoff(100_000), 40_000);
        assert_eq!(config.max_output_points, 1000);
    }
}
