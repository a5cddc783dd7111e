//! Channel and member records.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::casemap::fold;
use crate::isupport::PrefixTable;

/// A member of a channel as seen by the bot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelUser {
    /// Current nickname.
    pub nick: String,
    /// Username, when known (JOIN lines carry it, NAMES usually doesn't).
    pub user: String,
    /// Hostname, when known.
    pub host: String,
    prefixes: SmallVec<[char; 4]>,
}

impl ChannelUser {
    /// Create a member with no prefixes.
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
            prefixes: SmallVec::new(),
        }
    }

    /// Prefix symbols, most powerful first (`@+`).
    pub fn prefixes(&self) -> String {
        self.prefixes.iter().collect()
    }

    /// Highest prefix symbol held, if any.
    pub fn highest_prefix(&self) -> Option<char> {
        self.prefixes.first().copied()
    }

    /// Insert `symbol` keeping the server's priority order. No-op if held.
    pub fn add_prefix(&mut self, symbol: char, table: &PrefixTable) {
        if self.prefixes.contains(&symbol) {
            return;
        }
        let rank = table.rank(symbol);
        let pos = self
            .prefixes
            .iter()
            .position(|held| table.rank(*held) > rank)
            .unwrap_or(self.prefixes.len());
        self.prefixes.insert(pos, symbol);
    }

    /// Drop `symbol` if held.
    pub fn remove_prefix(&mut self, symbol: char) {
        self.prefixes.retain(|held| *held != symbol);
    }
}

/// A channel the bot is in, with members keyed by folded nick.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    /// Channel name as first seen.
    pub name: String,
    users: HashMap<String, ChannelUser>,
}

impl Channel {
    /// Create an empty channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: HashMap::new(),
        }
    }

    /// Look up a member by nick (case-insensitive).
    pub fn user(&self, nick: &str) -> Option<&ChannelUser> {
        self.users.get(&fold(nick))
    }

    pub(crate) fn user_mut(&mut self, nick: &str) -> Option<&mut ChannelUser> {
        self.users.get_mut(&fold(nick))
    }

    /// Whether `nick` is currently in the channel.
    pub fn contains(&self, nick: &str) -> bool {
        self.users.contains_key(&fold(nick))
    }

    /// Iterate over members in no particular order.
    pub fn users(&self) -> impl Iterator<Item = &ChannelUser> {
        self.users.values()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the channel has no known members.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Add or replace a member. Returns the previous record if the nick was
    /// already present.
    pub(crate) fn insert(&mut self, user: ChannelUser) -> Option<ChannelUser> {
        self.users.insert(fold(&user.nick), user)
    }

    pub(crate) fn remove(&mut self, nick: &str) -> Option<ChannelUser> {
        self.users.remove(&fold(nick))
    }
}
