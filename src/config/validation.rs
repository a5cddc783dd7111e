//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("irc.host is required")]
    MissingHost,
    #[error("irc.nick is required")]
    MissingNick,
    #[error("cards.command_prefix must not be empty")]
    EmptyCommandPrefix,
    #[error("cards.inline_pattern is not a valid regex: {0}")]
    InvalidInlinePattern(String),
    #[error("cards.inline_pattern needs one capture group")]
    InlinePatternWithoutGroup,
    #[error("cards.{0} must be within 0.0..=1.0, got {1}")]
    ScoreOutOfRange(&'static str, f64),
    #[error("auto_trigger.threshold_percent must be at most 100, got {0}")]
    ThresholdOutOfRange(u8),
    #[error("flow_rate.max_messages must be at least 1")]
    ZeroFlowRate,
    #[error("irc.timeout_seconds must be at least 1")]
    ZeroTimeout,
    #[error("cards.reload_poll_seconds must be at least 1")]
    ZeroPollInterval,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.irc.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.irc.nick.trim().is_empty() {
        errors.push(ValidationError::MissingNick);
    }
    // Both drive tokio intervals, which reject a zero period.
    if config.irc.timeout_seconds == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.cards.reload_poll_seconds == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    let cards = &config.cards;
    if cards.command_prefix.trim().is_empty() {
        errors.push(ValidationError::EmptyCommandPrefix);
    }
    match regex::Regex::new(&cards.inline_pattern) {
        Ok(re) if re.captures_len() < 2 => {
            errors.push(ValidationError::InlinePatternWithoutGroup);
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidInlinePattern(e.to_string())),
    }
    for (name, value) in [
        ("high_confidence", cards.high_confidence),
        ("min_match", cards.min_match),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::ScoreOutOfRange(name, value));
        }
    }

    if config.auto_trigger.threshold_percent > 100 {
        errors.push(ValidationError::ThresholdOutOfRange(
            config.auto_trigger.threshold_percent,
        ));
    }
    if config.flow_rate.max_messages == 0 {
        errors.push(ValidationError::ZeroFlowRate);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        toml::from_str(
            r#"
            [irc]
            host = "irc.example.net"
            nick = "hsbot"
            [cards]
            source = "x"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&base()).is_ok());
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        let mut config = base();
        config.cards.inline_pattern = r"\[[^\]]+\]".to_string();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InlinePatternWithoutGroup));
    }

    #[test]
    fn broken_pattern_is_rejected() {
        let mut config = base();
        config.cards.inline_pattern = "([".to_string();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidInlinePattern(_)));
    }

    #[test]
    fn scores_must_be_fractions() {
        let mut config = base();
        config.cards.high_confidence = 75.0;
        config.flow_rate.max_messages = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = base();
        config.irc.timeout_seconds = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::ZeroTimeout));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = base();
        config.cards.reload_poll_seconds = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::ZeroPollInterval));
    }
}
