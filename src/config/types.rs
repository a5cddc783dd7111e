//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::validation::validate;
use super::{AutoTriggerConfig, CardsConfig, FlowRateConfig, IrcConfig, ValidationError};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server connection and identity.
    pub irc: IrcConfig,
    /// Card data and lookup behaviour.
    pub cards: CardsConfig,
    /// Implicit card-mention detection.
    #[serde(default)]
    pub auto_trigger: AutoTriggerConfig,
    /// Per-sender flood control.
    #[serde(default)]
    pub flow_rate: FlowRateConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r##"
        [irc]
        host = "irc.example.net"
        nick = "hsbot"
        channels = ["#hearthstone"]

        [cards]
        source = "cardxml0.unity3d"
    "##;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.irc.port, 6667);
        assert_eq!(config.irc.username(), "hsbot");
        assert_eq!(config.cards.command_prefix, "!card ");
        assert_eq!(config.cards.language, "enUS");
        assert_eq!(config.auto_trigger.threshold_percent, 0);
        assert_eq!(config.flow_rate.max_messages, 3);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.irc.host, "irc.example.net");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = Config::from_toml("[irc\nhost=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_reported_together() {
        let toml = MINIMAL.replace("nick = \"hsbot\"", "nick = \"\"")
            + "\n[auto_trigger]\nthreshold_percent = 150\n";
        let err = Config::from_toml(&toml).unwrap_err();
        let ConfigError::Invalid(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 2);
    }
}
