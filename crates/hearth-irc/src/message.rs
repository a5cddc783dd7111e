//! Raw line parsing into structured events.
//!
//! Only the commands the engine acts on are modeled. Every parser is lenient:
//! a line with the wrong shape for its command yields `None` and is left for
//! raw observers, never an error.

use smallvec::SmallVec;

/// Origin of a message, taken from its `:prefix`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// A server name (contains a dot and no `!`/`@`).
    Server(String),
    /// A user mask `nick!user@host`. Missing parts are empty.
    User {
        /// Nickname.
        nick: String,
        /// Username (ident).
        user: String,
        /// Hostname.
        host: String,
    },
}

impl Source {
    /// Parse a prefix without its leading colon.
    pub fn parse(s: &str) -> Self {
        let (name_user, host) = match s.split_once('@') {
            Some((left, host)) => (left, Some(host)),
            None => (s, None),
        };
        let (nick, user) = match name_user.split_once('!') {
            Some((nick, user)) => (nick, Some(user)),
            None => (name_user, None),
        };

        if user.is_none() && host.is_none() && nick.contains('.') {
            return Source::Server(nick.to_string());
        }

        Source::User {
            nick: nick.to_string(),
            user: user.unwrap_or_default().to_string(),
            host: host.unwrap_or_default().to_string(),
        }
    }

    /// Nickname, if this is a user source.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Source::User { nick, .. } if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }

    /// Hostname for users, name for servers.
    pub fn host(&self) -> Option<&str> {
        match self {
            Source::Server(name) => Some(name),
            Source::User { host, .. } if !host.is_empty() => Some(host),
            Source::User { .. } => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Server(name) => f.write_str(name),
            Source::User { nick, user, host } => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

/// A line split into prefix, command and parameters.
///
/// The trailing parameter (after ` :`) is the last element of `params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// Prefix without the leading colon.
    pub prefix: Option<&'a str>,
    /// Command word or three-digit numeric.
    pub command: &'a str,
    /// Middle parameters followed by the trailing one, if any.
    pub params: SmallVec<[&'a str; 8]>,
}

impl<'a> RawLine<'a> {
    /// Split a line. Returns `None` for blank lines or lines without a command.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // IRCv3 tags are not used by the engine.
        if rest.starts_with('@') {
            rest = rest.split_once(' ')?.1.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, remainder) = stripped.split_once(' ')?;
            prefix = Some(p);
            rest = remainder.trim_start_matches(' ');
        }

        let (middle, trailing) = match rest.find(" :") {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 2..])),
            None => (rest, None),
        };

        let mut words = middle.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?;
        let mut params: SmallVec<[&'a str; 8]> = words.collect();
        if let Some(trailing) = trailing {
            params.push(trailing);
        }

        Some(RawLine {
            prefix,
            command,
            params,
        })
    }

    /// Parsed source, if the line had a prefix.
    pub fn source(&self) -> Option<Source> {
        self.prefix.map(Source::parse)
    }
}

/// Structured events the engine understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// `PING :token`
    Ping(String),
    /// `ERROR :reason`
    Error(String),
    /// A three-digit reply. `params` excludes the target.
    Numeric {
        /// Sending server.
        source: Option<Source>,
        /// Reply code, e.g. 1, 5, 353.
        code: u16,
        /// First parameter, normally our own nick.
        target: String,
        /// Remaining parameters, trailing last.
        params: Vec<String>,
    },
    /// `PRIVMSG target :text`
    Privmsg {
        /// Sender.
        source: Source,
        /// Channel or nick the message was addressed to.
        target: String,
        /// Message body.
        text: String,
    },
    /// `JOIN #channel`
    Join {
        /// Joining user.
        source: Source,
        /// Channel joined.
        channel: String,
    },
    /// `PART #channel [:reason]`
    Part {
        /// Leaving user.
        source: Source,
        /// Channel left.
        channel: String,
        /// Optional part message.
        reason: Option<String>,
    },
    /// `KICK #channel nick [:reason]`
    Kick {
        /// Kicker.
        source: Source,
        /// Channel.
        channel: String,
        /// Kicked nick.
        nick: String,
        /// Optional reason.
        reason: Option<String>,
    },
    /// `MODE target modes [args...]`
    Mode {
        /// Who changed the mode.
        source: Source,
        /// Channel or nick.
        target: String,
        /// Mode string followed by its arguments.
        changes: Vec<String>,
    },
    /// `NICK :newnick`
    Nick {
        /// User before the change.
        source: Source,
        /// New nickname.
        nick: String,
    },
    /// `QUIT [:reason]`
    Quit {
        /// Quitting user.
        source: Source,
        /// Optional quit message.
        reason: Option<String>,
    },
}

impl Event {
    /// Parse a raw line into an event, or `None` if it is not modeled or
    /// does not have the expected shape.
    pub fn parse(line: &str) -> Option<Self> {
        let raw = RawLine::parse(line)?;
        let params = &raw.params;
        let command = raw.command;

        if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
            let code = command.parse().ok()?;
            let (target, rest) = params.split_first()?;
            return Some(Event::Numeric {
                source: raw.source(),
                code,
                target: target.to_string(),
                params: rest.iter().map(|p| p.to_string()).collect(),
            });
        }

        if command.eq_ignore_ascii_case("PING") {
            return Some(Event::Ping(params.first().unwrap_or(&"").to_string()));
        }
        if command.eq_ignore_ascii_case("ERROR") {
            return Some(Event::Error(params.first().unwrap_or(&"").to_string()));
        }

        let source = raw.source()?;
        let event = match command.to_ascii_uppercase().as_str() {
            "PRIVMSG" if params.len() >= 2 => Event::Privmsg {
                source,
                target: params[0].to_string(),
                text: params[1].to_string(),
            },
            "JOIN" if !params.is_empty() => Event::Join {
                source,
                channel: params[0].to_string(),
            },
            "PART" if !params.is_empty() => Event::Part {
                source,
                channel: params[0].to_string(),
                reason: params.get(1).map(|r| r.to_string()),
            },
            "KICK" if params.len() >= 2 => Event::Kick {
                source,
                channel: params[0].to_string(),
                nick: params[1].to_string(),
                reason: params.get(2).map(|r| r.to_string()),
            },
            "MODE" if params.len() >= 2 => Event::Mode {
                source,
                target: params[0].to_string(),
                changes: params[1..].iter().map(|p| p.to_string()).collect(),
            },
            "NICK" if !params.is_empty() => Event::Nick {
                source,
                nick: params[0].to_string(),
            },
            "QUIT" => Event::Quit {
                source,
                reason: params.first().map(|r| r.to_string()),
            },
            _ => return None,
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_parses_full_mask() {
        let src = Source::parse("Ben!~ben@host.example.com");
        assert_eq!(src.nick(), Some("Ben"));
        assert_eq!(src.host(), Some("host.example.com"));
        assert_eq!(src.to_string(), "Ben!~ben@host.example.com");
    }

    #[test]
    fn source_detects_server_names() {
        assert_eq!(
            Source::parse("irc.example.net"),
            Source::Server("irc.example.net".to_string())
        );
        assert_eq!(Source::parse("nick").nick(), Some("nick"));
        assert_eq!(Source::parse("nick").host(), None);
    }

    #[test]
    fn raw_line_splits_trailing() {
        let raw = RawLine::parse(":a!b@c PRIVMSG #chan :hello there :)").unwrap();
        assert_eq!(raw.prefix, Some("a!b@c"));
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params.as_slice(), &["#chan", "hello there :)"]);
    }

    #[test]
    fn raw_line_skips_tags() {
        let raw = RawLine::parse("@time=2020 :srv 001 bot :Welcome").unwrap();
        assert_eq!(raw.command, "001");
        assert_eq!(raw.params.as_slice(), &["bot", "Welcome"]);
    }

    #[test]
    fn raw_line_rejects_blank() {
        assert!(RawLine::parse("").is_none());
        assert!(RawLine::parse(":onlyprefix").is_none());
    }

    #[test]
    fn parses_privmsg() {
        let ev = Event::parse(":nick!u@h PRIVMSG #hs :!card the coin").unwrap();
        match ev {
            Event::Privmsg { source, target, text } => {
                assert_eq!(source.nick(), Some("nick"));
                assert_eq!(target, "#hs");
                assert_eq!(text, "!card the coin");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_numeric_with_target() {
        let ev = Event::parse(":srv 353 bot = #hs :@op +voice plain").unwrap();
        assert_eq!(
            ev,
            Event::Numeric {
                source: Some(Source::parse("srv")),
                code: 353,
                target: "bot".to_string(),
                params: vec!["=".into(), "#hs".into(), "@op +voice plain".into()],
            }
        );
    }

    #[test]
    fn parses_ping_and_error() {
        assert_eq!(Event::parse("PING :12345"), Some(Event::Ping("12345".into())));
        assert_eq!(
            Event::parse("ERROR :Closing Link"),
            Some(Event::Error("Closing Link".into()))
        );
    }

    #[test]
    fn parses_channel_membership_commands() {
        assert!(matches!(
            Event::parse(":a!b@c JOIN :#hs"),
            Some(Event::Join { channel, .. }) if channel == "#hs"
        ));
        assert!(matches!(
            Event::parse(":a!b@c KICK #hs victim :bye"),
            Some(Event::Kick { nick, reason: Some(r), .. }) if nick == "victim" && r == "bye"
        ));
        assert!(matches!(
            Event::parse(":a!b@c MODE #hs +ov x y"),
            Some(Event::Mode { changes, .. }) if changes == ["+ov", "x", "y"]
        ));
        assert!(matches!(
            Event::parse(":a!b@c QUIT"),
            Some(Event::Quit { reason: None, .. })
        ));
    }

    #[test]
    fn malformed_lines_are_ignored() {
        assert_eq!(Event::parse(":a!b@c PRIVMSG #only"), None);
        assert_eq!(Event::parse(":a!b@c KICK #hs"), None);
        assert_eq!(Event::parse(":a!b@c NOTICE #hs :hi"), None);
        assert_eq!(Event::parse("PRIVMSG #hs :no prefix"), None);
    }
}
