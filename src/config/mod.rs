//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: the top-level [`Config`] and its loader
//! - [`irc`]: server connection and identity ([`IrcConfig`])
//! - [`cards`]: card lookup, auto-trigger and flow-rate settings
//! - [`validation`]: startup sanity checks

mod cards;
mod irc;
mod types;
mod validation;

pub use cards::{AutoTriggerConfig, CardsConfig, FlowRateConfig};
pub use irc::IrcConfig;
pub use types::{Config, ConfigError};
pub use validation::ValidationError;
