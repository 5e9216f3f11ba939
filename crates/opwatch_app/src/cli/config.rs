use std::fs;
use std::path::Path;
use std::time::Duration;

use opwatch_core::PollCadence;
use opwatch_engine::EngineSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;

pub(crate) const DEFAULT_CONFIG_FILENAME: &str = "opwatch.ron";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// On-disk settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub base_url: String,
    pub read_deadline_ms: u64,
    pub connect_timeout_ms: u64,
    pub active_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub fresh_window_ms: u64,
    pub log_destination: LogDestination,
    /// Show a terminal notification when a job finishes while watching.
    pub notify: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cadence = PollCadence::default();
        Self {
            base_url: "http://127.0.0.1:5005".to_string(),
            read_deadline_ms: duration_ms(EngineSettings::DEFAULT_READ_DEADLINE),
            connect_timeout_ms: 5_000,
            active_interval_ms: duration_ms(cadence.active_interval),
            idle_interval_ms: duration_ms(cadence.idle_interval),
            fresh_window_ms: duration_ms(cadence.fresh_window),
            log_destination: LogDestination::Terminal,
            notify: true,
        }
    }
}

impl AppConfig {
    pub(crate) fn to_settings(&self) -> Result<EngineSettings, url::ParseError> {
        let mut settings = EngineSettings::parse(&self.base_url)?;
        settings.read_deadline = Duration::from_millis(self.read_deadline_ms);
        settings.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        settings.cadence = PollCadence {
            active_interval: Duration::from_millis(self.active_interval_ms),
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            fresh_window: Duration::from_millis(self.fresh_window_ms),
        };
        Ok(settings)
    }
}

/// Loads the config file. A missing file yields defaults.
pub(crate) fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };

    ron::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join(DEFAULT_CONFIG_FILENAME)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.read_deadline_ms, 12_000);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(base_url: "http://nas.local:5005", idle_interval_ms: 10000, log_destination: Both)"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.base_url, "http://nas.local:5005");
        assert_eq!(config.idle_interval_ms, 10_000);
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.active_interval_ms, 1_500);

        let settings = config.to_settings().unwrap();
        assert_eq!(settings.cadence.idle_interval, Duration::from_secs(10));
        assert_eq!(settings.base_url.as_str(), "http://nas.local:5005/");
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&path, "base_url = 'toml is not ron'").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = AppConfig {
            base_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(config.to_settings().is_err());
    }
}
