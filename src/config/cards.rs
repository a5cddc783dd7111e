//! Card lookup, auto-trigger and flow-rate configuration.

use serde::Deserialize;
use std::path::PathBuf;

use super::irc::default_true;

/// Card data source and lookup behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct CardsConfig {
    /// Path of the asset blob holding the card definitions.
    pub source: PathBuf,
    /// Localization to read names and text from (default: "enUS").
    #[serde(default = "default_language")]
    pub language: String,
    /// Explicit command prefix, trailing space included (default: "!card ").
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Longest query accepted, in characters (default: 50).
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
    /// Most lookups answered for one line (default: 2).
    #[serde(default = "default_max_matches_per_line")]
    pub max_matches_per_line: usize,
    /// Inline trigger regex; capture group 1 is the query.
    #[serde(default = "default_inline_pattern")]
    pub inline_pattern: String,
    /// Score at or above which a match is answered outright (default: 0.75).
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    /// Lowest score kept as a candidate at all (default: 0.4).
    #[serde(default = "default_min_match")]
    pub min_match: f64,
    /// Colour card names by rarity with mIRC control codes.
    #[serde(default)]
    pub control_codes: bool,
    /// How often the source file is checked for changes, in seconds
    /// (default: 10).
    #[serde(default = "default_reload_poll_seconds")]
    pub reload_poll_seconds: u64,
    /// Delay between attempts while the source file can't be read, in
    /// seconds (default: 5).
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

/// Implicit card-mention detection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoTriggerConfig {
    /// Minimum phrase score, in percent. 0 disables auto-triggering.
    #[serde(default)]
    pub threshold_percent: u8,
}

impl AutoTriggerConfig {
    /// Threshold as a fraction, or `None` when disabled.
    pub fn threshold(&self) -> Option<f64> {
        (self.threshold_percent > 0).then(|| f64::from(self.threshold_percent) / 100.0)
    }
}

/// Per-sender leaky-bucket limits.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowRateConfig {
    /// Lookups a host may have outstanding before being ignored (default: 3).
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    /// Idle time after which one unit drains, in seconds (default: 10).
    #[serde(default = "default_decay_seconds")]
    pub decay_seconds: u64,
    /// Whether limiting is enforced at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FlowRateConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            decay_seconds: default_decay_seconds(),
            enabled: true,
        }
    }
}

fn default_language() -> String {
    "enUS".to_string()
}

fn default_command_prefix() -> String {
    "!card ".to_string()
}

fn default_max_query_length() -> usize {
    50
}

fn default_max_matches_per_line() -> usize {
    2
}

fn default_inline_pattern() -> String {
    r"\[([^\[\]]+)\]".to_string()
}

fn default_high_confidence() -> f64 {
    0.75
}

fn default_min_match() -> f64 {
    0.4
}

fn default_reload_poll_seconds() -> u64 {
    10
}

fn default_retry_delay_seconds() -> u64 {
    5
}

fn default_max_messages() -> u32 {
    3
}

fn default_decay_seconds() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_trigger_zero_is_disabled() {
        assert_eq!(AutoTriggerConfig::default().threshold(), None);
        let enabled = AutoTriggerConfig {
            threshold_percent: 85,
        };
        assert_eq!(enabled.threshold(), Some(0.85));
    }

    #[test]
    fn cards_defaults() {
        let config: CardsConfig = toml::from_str("source = \"cards.bin\"").unwrap();
        assert_eq!(config.max_matches_per_line, 2);
        assert_eq!(config.max_query_length, 50);
        assert_eq!(config.high_confidence, 0.75);
        assert!(!config.control_codes);
    }

    #[test]
    fn flow_rate_defaults() {
        let config = FlowRateConfig::default();
        assert_eq!(config.max_messages, 3);
        assert_eq!(config.decay_seconds, 10);
        assert!(config.enabled);
    }
}
