//! `RPL_ISUPPORT` (005) capability tracking.
//!
//! Only `PREFIX` and `CHANMODES` are kept; together they say which mode
//! letters carry a parameter, which is what MODE delta parsing needs.

/// Parsed `PREFIX` token, e.g. `(qaohv)~&@%+`.
///
/// Letters and symbols are stored most powerful first, in server order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixTable {
    modes: Vec<char>,
    symbols: Vec<char>,
}

impl PrefixTable {
    /// Parse a `PREFIX` value. Returns `None` when letters and symbols
    /// don't pair up.
    pub fn parse(value: &str) -> Option<Self> {
        let inner = value.strip_prefix('(')?;
        let (modes, symbols) = inner.split_once(')')?;
        let modes: Vec<char> = modes.chars().collect();
        let symbols: Vec<char> = symbols.chars().collect();
        if modes.len() != symbols.len() {
            return None;
        }
        Some(Self { modes, symbols })
    }

    /// Symbol shown for a mode letter (`o` -> `@`).
    pub fn symbol_for_mode(&self, mode: char) -> Option<char> {
        let idx = self.modes.iter().position(|m| *m == mode)?;
        self.symbols.get(idx).copied()
    }

    /// Whether `c` is one of the advertised display symbols.
    pub fn is_symbol(&self, c: char) -> bool {
        self.symbols.contains(&c)
    }

    /// Whether `mode` is a membership prefix mode.
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.modes.contains(&mode)
    }

    /// Rank of a symbol; lower is more powerful. Unknown symbols sort last.
    pub fn rank(&self, symbol: char) -> usize {
        self.symbols
            .iter()
            .position(|s| *s == symbol)
            .unwrap_or(usize::MAX)
    }
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self {
            modes: vec!['o', 'v'],
            symbols: vec!['@', '+'],
        }
    }
}

/// Parsed `CHANMODES` token: four comma-separated arity groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChanModes {
    /// Type A: list modes, always take a parameter.
    pub list: String,
    /// Type B: always take a parameter.
    pub always: String,
    /// Type C: take a parameter only when set.
    pub set_only: String,
    /// Type D: never take a parameter.
    pub never: String,
}

impl ChanModes {
    /// Parse `b,k,l,imnpst`. Extra groups beyond four are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        let mut groups = value.split(',');
        Some(Self {
            list: groups.next()?.to_string(),
            always: groups.next()?.to_string(),
            set_only: groups.next()?.to_string(),
            never: groups.next()?.to_string(),
        })
    }
}

impl Default for ChanModes {
    fn default() -> Self {
        Self {
            list: "beI".to_string(),
            always: "k".to_string(),
            set_only: "l".to_string(),
            never: "imnpst".to_string(),
        }
    }
}

/// Server capabilities relevant to channel tracking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerCapabilities {
    /// Membership prefixes.
    pub prefix: PrefixTable,
    /// Channel mode arity groups.
    pub chanmodes: ChanModes,
}

impl ServerCapabilities {
    /// Absorb the tokens of one 005 line. Unknown tokens are ignored and
    /// malformed values keep the previous setting.
    pub fn apply_tokens<'a, I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for token in tokens {
            // The human-readable trailer ("are supported by this server").
            if token.contains(' ') {
                continue;
            }
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            if key.eq_ignore_ascii_case("PREFIX") {
                if let Some(prefix) = PrefixTable::parse(value) {
                    self.prefix = prefix;
                }
            } else if key.eq_ignore_ascii_case("CHANMODES") {
                if let Some(chanmodes) = ChanModes::parse(value) {
                    self.chanmodes = chanmodes;
                }
            }
        }
    }

    /// Whether `mode` consumes a parameter in a MODE delta with the given
    /// direction.
    pub fn takes_param(&self, mode: char, adding: bool) -> bool {
        let cm = &self.chanmodes;
        if self.prefix.is_prefix_mode(mode) || cm.list.contains(mode) || cm.always.contains(mode)
        {
            return true;
        }
        adding && cm.set_only.contains(mode)
    }
}
