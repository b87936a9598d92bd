use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_interval", with = "humantime_duration")]
    pub interval: Duration,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub report_url: String,
    #[serde(default)]
    pub heartbeat_url: String,
    #[serde(default = "default_report_interval", with = "humantime_duration")]
    pub report_interval: Duration,
    #[serde(default = "default_heartbeat_interval", with = "humantime_duration")]
    pub heartbeat_interval: Duration,
    #[serde(default = "default_timeout", with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            report_url: String::new(),
            heartbeat_url: String::new(),
            report_interval: default_report_interval(),
            heartbeat_interval: default_heartbeat_interval(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("конфигурация {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("конфигурация {}: некорректный YAML: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("некорректная конфигурация: {0}")]
    Validation(String),
}

impl Config {
    /// Reads, parses and validates a YAML config; missing keys take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|text| {
                serde_yaml::from_str::<Config>(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval < Duration::from_millis(100) {
            return Err(ConfigError::Validation(
                "interval должен быть >= 100ms".to_string(),
            ));
        }
        validate_reporting(&self.reporting)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_reporting(cfg: &ReportingConfig) -> Result<(), ConfigError> {
    if !cfg.enabled {
        return Ok(());
    }

    for (field, url) in [
        ("report_url", &cfg.report_url),
        ("heartbeat_url", &cfg.heartbeat_url),
    ] {
        if url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "reporting.{field} обязателен при reporting.enabled = true"
            )));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "reporting.{field} должен начинаться с http:// или https://"
            )));
        }
    }
    if cfg.report_interval < Duration::from_secs(1) {
        return Err(ConfigError::Validation(
            "reporting.report_interval должен быть >= 1s".to_string(),
        ));
    }
    if cfg.heartbeat_interval < Duration::from_secs(1) {
        return Err(ConfigError::Validation(
            "reporting.heartbeat_interval должен быть >= 1s".to_string(),
        ));
    }
    if cfg.timeout.is_zero() {
        return Err(ConfigError::Validation(
            "reporting.timeout должен быть > 0".to_string(),
        ));
    }

    Ok(())
}

const fn default_interval() -> Duration {
    Duration::from_secs(1)
}

const fn default_report_interval() -> Duration {
    Duration::from_secs(60)
}

const fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
