//! Sans-IO channel state tracking.
//!
//! [`ChannelTracker`] consumes parsed [`Event`]s and keeps the set of
//! channels the bot is in, their members and member prefixes. It does no
//! I/O, so the client drives it from its read loop and tests drive it
//! directly.

use std::collections::HashMap;

use tracing::debug;

use crate::casemap::{fold, fold_eq};
use crate::channel::{Channel, ChannelUser};
use crate::isupport::ServerCapabilities;
use crate::message::{Event, Source};

/// `RPL_WELCOME`
pub const RPL_WELCOME: u16 = 1;
/// `RPL_ISUPPORT`
pub const RPL_ISUPPORT: u16 = 5;
/// `RPL_NAMREPLY`
pub const RPL_NAMREPLY: u16 = 353;

/// Channel, member and own-nick bookkeeping for one connection.
#[derive(Clone, Debug, Default)]
pub struct ChannelTracker {
    nick: String,
    capabilities: ServerCapabilities,
    channels: HashMap<String, Channel>,
}

impl ChannelTracker {
    /// Create a tracker for a connection registering as `nick`.
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Self::default()
        }
    }

    /// The bot's current nickname.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Capabilities advertised by the server so far.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Look up a channel by name (case-insensitive).
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&fold(name))
    }

    /// Iterate over all tracked channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Whether `nick` is a member of `channel`.
    pub fn is_member(&self, channel: &str, nick: &str) -> bool {
        self.channel(channel).is_some_and(|c| c.contains(nick))
    }

    fn is_me(&self, nick: &str) -> bool {
        fold_eq(nick, &self.nick)
    }

    /// Apply one event. Events the tracker doesn't care about are ignored.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Numeric {
                code: RPL_WELCOME,
                target,
                ..
            } => {
                // The server has the final word on our nick.
                self.nick = target.clone();
            }
            Event::Numeric {
                code: RPL_ISUPPORT,
                params,
                ..
            } => {
                self.capabilities
                    .apply_tokens(params.iter().map(String::as_str));
            }
            Event::Numeric {
                code: RPL_NAMREPLY,
                params,
                ..
            } => {
                // params: [symbol, channel, names]
                if let [_, channel, names] = params.as_slice() {
                    self.apply_names(channel, names);
                }
            }
            Event::Join { source, channel } => self.apply_join(source, channel),
            Event::Part {
                source, channel, ..
            } => {
                if let Some(nick) = source.nick() {
                    self.remove_from(channel, nick);
                }
            }
            Event::Kick { channel, nick, .. } => self.remove_from(channel, nick),
            Event::Quit { source, .. } => {
                if let Some(nick) = source.nick() {
                    for chan in self.channels.values_mut() {
                        chan.remove(nick);
                    }
                }
            }
            Event::Nick { source, nick } => {
                if let Some(old) = source.nick() {
                    self.rename(old, nick);
                }
            }
            Event::Mode {
                target, changes, ..
            } => self.apply_mode(target, changes),
            _ => {}
        }
    }

    fn apply_join(&mut self, source: &Source, channel: &str) {
        let Source::User { nick, user, host } = source else {
            return;
        };
        if self.is_me(nick) {
            self.channels
                .insert(fold(channel), Channel::new(channel.to_string()));
        }
        let Some(chan) = self.channels.get_mut(&fold(channel)) else {
            return;
        };
        if chan
            .insert(ChannelUser::new(nick.clone(), user.clone(), host.clone()))
            .is_some()
        {
            debug!(channel = %channel, nick = %nick, "JOIN for a nick already in channel");
        }
    }

    fn apply_names(&mut self, channel: &str, names: &str) {
        let prefix_table = self.capabilities.prefix.clone();
        let chan = self
            .channels
            .entry(fold(channel))
            .or_insert_with(|| Channel::new(channel.to_string()));

        for entry in names.split(' ').filter(|e| !e.is_empty()) {
            let symbols_end = entry
                .char_indices()
                .find(|(_, c)| !prefix_table.is_symbol(*c))
                .map(|(i, _)| i)
                .unwrap_or(entry.len());
            let (symbols, mask) = entry.split_at(symbols_end);
            if mask.is_empty() {
                continue;
            }

            // userhost-in-names servers send full masks here.
            let mut user = match Source::parse(mask) {
                Source::User { nick, user, host } => ChannelUser::new(nick, user, host),
                Source::Server(name) => ChannelUser::new(name, "", ""),
            };
            if let Some(existing) = chan.user(&user.nick) {
                if user.host.is_empty() {
                    user.user = existing.user.clone();
                    user.host = existing.host.clone();
                }
            }
            for symbol in symbols.chars() {
                user.add_prefix(symbol, &prefix_table);
            }
            chan.insert(user);
        }
    }

    fn remove_from(&mut self, channel: &str, nick: &str) {
        if self.is_me(nick) {
            self.channels.remove(&fold(channel));
        } else if let Some(chan) = self.channels.get_mut(&fold(channel)) {
            chan.remove(nick);
        }
    }

    fn rename(&mut self, old: &str, new: &str) {
        if self.is_me(old) {
            self.nick = new.to_string();
        }
        for chan in self.channels.values_mut() {
            if let Some(mut user) = chan.remove(old) {
                user.nick = new.to_string();
                chan.insert(user);
            }
        }
    }

    fn apply_mode(&mut self, target: &str, changes: &[String]) {
        let Some((modes, args)) = changes.split_first() else {
            return;
        };
        let caps = &self.capabilities;
        let Some(chan) = self.channels.get_mut(&fold(target)) else {
            // User modes and unknown channels.
            return;
        };

        let mut args = args.iter();
        let mut adding = true;
        for mode in modes.chars() {
            match mode {
                '+' => adding = true,
                '-' => adding = false,
                _ => {
                    if !caps.takes_param(mode, adding) {
                        continue;
                    }
                    let Some(arg) = args.next() else {
                        return;
                    };
                    let Some(symbol) = caps.prefix.symbol_for_mode(mode) else {
                        continue;
                    };
                    if let Some(user) = chan.user_mut(arg) {
                        if adding {
                            user.add_prefix(symbol, &caps.prefix);
                        } else {
                            user.remove_prefix(symbol);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut ChannelTracker, lines: &[&str]) {
        for line in lines {
            if let Some(ev) = Event::parse(line) {
                tracker.apply(&ev);
            }
        }
    }

    fn joined() -> ChannelTracker {
        let mut t = ChannelTracker::new("hsbot");
        feed(
            &mut t,
            &[
                ":srv 001 hsbot :Welcome",
                ":srv 005 hsbot PREFIX=(qov)~@+ CHANMODES=b,k,l,nt :are supported",
                ":hsbot!bot@bot.host JOIN #hs",
                ":srv 353 hsbot = #hs :hsbot @Op +Voice ~@Owner plain",
            ],
        );
        t
    }

    #[test]
    fn names_reply_populates_with_prefixes() {
        let t = joined();
        let chan = t.channel("#HS").unwrap();
        assert_eq!(chan.len(), 5);
        assert_eq!(chan.user("op").unwrap().prefixes(), "@");
        assert_eq!(chan.user("owner").unwrap().prefixes(), "~@");
        assert_eq!(chan.user("plain").unwrap().prefixes(), "");
        // NAMES doesn't wipe what JOIN told us.
        assert_eq!(chan.user("hsbot").unwrap().host, "bot.host");
    }

    #[test]
    fn join_part_kick_quit_manage_members() {
        let mut t = joined();
        feed(&mut t, &[":new!n@h JOIN #hs"]);
        assert!(t.is_member("#hs", "NEW"));

        feed(&mut t, &[":new!n@h PART #hs :bye"]);
        assert!(!t.is_member("#hs", "new"));

        feed(&mut t, &[":Op!o@h KICK #hs plain :out"]);
        assert!(!t.is_member("#hs", "plain"));

        feed(&mut t, &[":Voice!v@h QUIT :gone"]);
        assert!(!t.is_member("#hs", "voice"));
    }

    #[test]
    fn own_part_or_kick_removes_channel() {
        let mut t = joined();
        feed(&mut t, &[":hsbot!bot@bot.host PART #hs"]);
        assert!(t.channel("#hs").is_none());

        let mut t = joined();
        feed(&mut t, &[":Op!o@h KICK #hs HSBot :bye"]);
        assert!(t.channel("#hs").is_none());
    }

    #[test]
    fn nick_change_renames_everywhere_and_tracks_self() {
        let mut t = joined();
        feed(
            &mut t,
            &[
                ":hsbot!bot@bot.host JOIN #other",
                ":Op!o@h JOIN #other",
                ":Op!o@h NICK :Boss",
            ],
        );
        assert!(t.is_member("#hs", "boss"));
        assert!(t.is_member("#other", "boss"));
        assert!(!t.is_member("#hs", "op"));
        assert_eq!(t.channel("#hs").unwrap().user("boss").unwrap().prefixes(), "@");

        feed(&mut t, &[":hsbot!bot@bot.host NICK hsbot_"]);
        assert_eq!(t.nick(), "hsbot_");
        assert!(t.is_member("#hs", "hsbot_"));
    }

    #[test]
    fn mode_deltas_consume_params_by_arity() {
        let mut t = joined();
        // k takes a param, l takes one on set, n takes none, b is a list mode.
        feed(
            &mut t,
            &[":Op!o@h MODE #hs +kolnbv key plain 10 *!*@bad Voice"],
        );
        let chan = t.channel("#hs").unwrap();
        assert_eq!(chan.user("plain").unwrap().prefixes(), "@");
        assert_eq!(chan.user("voice").unwrap().prefixes(), "+");

        feed(&mut t, &[":Op!o@h MODE #hs -lo+q plain Voice"]);
        let chan = t.channel("#hs").unwrap();
        assert_eq!(chan.user("plain").unwrap().prefixes(), "");
        assert_eq!(chan.user("voice").unwrap().prefixes(), "~+");
    }

    #[test]
    fn mode_with_missing_args_is_ignored() {
        let mut t = joined();
        feed(&mut t, &[":Op!o@h MODE #hs +o"]);
        assert_eq!(t.channel("#hs").unwrap().user("plain").unwrap().prefixes(), "");
    }

    #[test]
    fn events_for_unknown_channels_are_ignored() {
        let mut t = joined();
        feed(&mut t, &[":x!y@z JOIN #elsewhere", ":x!y@z MODE #elsewhere +o x"]);
        assert!(t.channel("#elsewhere").is_none());
    }
}
