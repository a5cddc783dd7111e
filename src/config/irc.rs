//! IRC server and identity configuration.

use serde::Deserialize;

/// Where to connect and who to be.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    /// Server host name.
    pub host: String,
    /// Server port (default: 6667).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Nickname.
    pub nick: String,
    /// Username (ident). Defaults to the nick.
    #[serde(default)]
    pub user: String,
    /// Real name (default: "HearthBot").
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Server password, sent as PASS.
    #[serde(default)]
    pub password: Option<String>,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Raw line sent after registration, before joining (e.g. a NickServ
    /// identify).
    #[serde(default)]
    pub on_connect: Option<String>,
    /// Fixed delay between reconnect attempts, in seconds (default: 30).
    #[serde(default = "default_reconnect_seconds")]
    pub reconnect_seconds: u64,
    /// Silence after which the connection is considered dead, in seconds
    /// (default: 300).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Outgoing lines remembered for duplicate suppression (default: 50).
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Drop a reply identical to the previous one (default: true).
    #[serde(default = "default_true")]
    pub no_duplicates: bool,
    /// QUIT message used on shutdown.
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
}

impl IrcConfig {
    /// Username to register with; falls back to the nick.
    pub fn username(&self) -> &str {
        if self.user.is_empty() {
            &self.nick
        } else {
            &self.user
        }
    }
}

fn default_port() -> u16 {
    6667
}

fn default_realname() -> String {
    "HearthBot".to_string()
}

fn default_reconnect_seconds() -> u64 {
    30
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_history_size() -> usize {
    50
}

pub(super) fn default_true() -> bool {
    true
}

fn default_quit_message() -> String {
    "Be right back!".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_falls_back_to_nick() {
        let mut config: IrcConfig =
            toml::from_str("host = \"h\"\nnick = \"hsbot\"").unwrap();
        assert_eq!(config.username(), "hsbot");
        config.user = "ident".to_string();
        assert_eq!(config.username(), "ident");
    }

    #[test]
    fn defaults_match_documented_values() {
        let config: IrcConfig = toml::from_str("host = \"h\"\nnick = \"n\"").unwrap();
        assert_eq!(config.reconnect_seconds, 30);
        assert_eq!(config.timeout_seconds, 300);
        assert_eq!(config.history_size, 50);
        assert!(config.no_duplicates);
        assert!(config.password.is_none());
    }
}
