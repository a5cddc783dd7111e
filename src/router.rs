//! Turns channel and private messages into card replies.
//!
//! A message is checked for, in order:
//!
//! 1. an explicit command (`!card <name>`), which answers and stops;
//! 2. inline triggers (`[name]`), skipping ones that are really nicks or
//!    times;
//! 3. bare card names in the text, when auto-triggering is enabled.
//!
//! Every lookup is charged to the sender's flow-rate bucket first. The
//! router doesn't touch the network: it returns the lines to send.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveTime;
use hearth_irc::Source;
use hearth_irc::casemap::fold_eq;
use regex::Regex;
use tracing::debug;

use crate::cards::{CardSet, Catalog, CatalogMap, fold_name};
use crate::config::Config;
use crate::flow_rate::{FlowRateLimiter, key_for};
use crate::matcher::{find_phrases, lookup};

/// Most alternatives offered in a "did you mean" reply or follow-up notice.
const MAX_SUGGESTIONS: usize = 3;

/// Who is where, as far as the connection knows.
pub trait Roster {
    /// The bot's current nick.
    fn own_nick(&self) -> String;
    /// Whether `nick` is currently in `channel`.
    fn is_member(&self, channel: &str, nick: &str) -> bool;
}

/// A line the router wants sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Privmsg { target: String, text: String },
    Notice { target: String, text: String },
}

impl Reply {
    fn privmsg(target: &str, text: impl Into<String>) -> Self {
        Reply::Privmsg {
            target: target.to_string(),
            text: text.into(),
        }
    }

    fn notice(target: &str, text: impl Into<String>) -> Self {
        Reply::Notice {
            target: target.to_string(),
            text: text.into(),
        }
    }
}

/// Trigger and reply settings, resolved from the config.
#[derive(Clone, Debug)]
pub struct RouterSettings {
    /// Text that starts an explicit lookup, matched ignoring ASCII case.
    pub command_prefix: String,
    /// Longest query answered, in characters.
    pub max_query_length: usize,
    /// Most inline and auto-triggered lookups answered per message.
    pub max_matches_per_line: usize,
    /// Inline trigger; capture group 1 is the query.
    pub inline_pattern: Regex,
    /// Score at or above which a lookup is answered outright.
    pub high_confidence: f64,
    /// Score below which candidates aren't considered at all.
    pub min_match: f64,
    /// Minimum score for a bare card name in chat. `None` disables
    /// auto-triggering.
    pub auto_threshold: Option<f64>,
    /// Colour and bold card text with IRC control codes.
    pub control_codes: bool,
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Result<Self, regex::Error> {
        let cards = &config.cards;
        Ok(Self {
            command_prefix: cards.command_prefix.clone(),
            max_query_length: cards.max_query_length,
            max_matches_per_line: cards.max_matches_per_line,
            inline_pattern: Regex::new(&cards.inline_pattern)?,
            high_confidence: cards.high_confidence,
            min_match: cards.min_match,
            auto_threshold: config.auto_trigger.threshold(),
            control_codes: cards.control_codes,
        })
    }
}

/// Split a trailing ` N` variant selector off a query.
fn split_variant_index(query: &str) -> (&str, Option<usize>) {
    let query = query.trim();
    if let Some((head, tail)) = query.rsplit_once(' ') {
        let head = head.trim_end();
        if let Some(digit) = single_digit(tail).filter(|_| !head.is_empty()) {
            return (head, Some(digit));
        }
    }
    (query, None)
}

fn single_digit(s: &str) -> Option<usize> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).map(|d| d as usize),
        _ => None,
    }
}

/// Bracketed times like `[12:34]` or `[9:05:10 PM]` are chat-log pastes.
fn looks_like_timestamp(s: &str) -> bool {
    const FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];
    let s = s.trim();
    FORMATS
        .iter()
        .any(|f| NaiveTime::parse_from_str(s, f).is_ok())
}

/// Routes messages to card lookups.
pub struct Router {
    catalog: Arc<Catalog>,
    limiter: Arc<FlowRateLimiter>,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        catalog: Arc<Catalog>,
        limiter: Arc<FlowRateLimiter>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            catalog,
            limiter,
            settings,
        }
    }

    /// Handle one PRIVMSG and return the replies to send.
    pub fn handle(
        &self,
        roster: &dyn Roster,
        source: &Source,
        target: &str,
        text: &str,
    ) -> Vec<Reply> {
        let mut out = Vec::new();
        let Some(sender) = source.nick() else {
            return out;
        };
        let own = roster.own_nick();
        if fold_eq(sender, &own) {
            return out;
        }

        let direct = fold_eq(target, &own);
        let reply_to = if direct { sender } else { target };
        let channel = (!direct).then_some(target);
        let key = key_for(source);
        let catalog = self.catalog.snapshot();

        if let Some(query) = self.command_query(text) {
            if query.is_empty() || query.chars().count() > self.settings.max_query_length {
                return out;
            }
            if self.limiter.allow(&key) {
                self.answer(&catalog, query, reply_to, sender, &mut out);
            }
            return out;
        }

        let mut budget = self.settings.max_matches_per_line;
        let mut seen = HashSet::new();
        let mut answered = HashSet::new();

        for caps in self.settings.inline_pattern.captures_iter(text) {
            if budget == 0 {
                break;
            }
            let Some(query) = caps.get(1).map(|m| m.as_str().trim()) else {
                continue;
            };
            if query.is_empty() || query.chars().count() > self.settings.max_query_length {
                continue;
            }
            if !seen.insert(fold_name(query)) {
                continue;
            }
            if self.is_false_positive(roster, channel, &own, query) {
                debug!(query, "Ignoring inline trigger that names a user or a time");
                continue;
            }
            if !self.limiter.allow(&key) {
                return out;
            }
            budget -= 1;
            if let Some(card) = self.answer(&catalog, query, reply_to, sender, &mut out) {
                answered.insert(card);
            }
        }

        let Some(threshold) = self.settings.auto_threshold else {
            return out;
        };
        for phrase in find_phrases(&catalog, text, threshold) {
            if budget == 0 {
                break;
            }
            if answered.contains(&phrase.candidate.key)
                || self.is_false_positive(roster, channel, &own, &phrase.phrase)
            {
                continue;
            }
            if !self.limiter.allow(&key) {
                return out;
            }
            budget -= 1;
            debug!(
                phrase = %phrase.phrase,
                card = %phrase.candidate.key,
                score = phrase.candidate.score,
                "Auto-triggered card"
            );
            if let Some(text) = self.card_text(&phrase.candidate.set, None) {
                out.push(Reply::privmsg(reply_to, text));
            }
            answered.insert(phrase.candidate.key);
        }
        out
    }

    /// The query after the command prefix, if `text` is a command.
    fn command_query<'t>(&self, text: &'t str) -> Option<&'t str> {
        let prefix = self.settings.command_prefix.as_str();
        let head = text.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix)
            .then(|| text[prefix.len()..].trim())
    }

    fn is_false_positive(
        &self,
        roster: &dyn Roster,
        channel: Option<&str>,
        own: &str,
        text: &str,
    ) -> bool {
        fold_eq(text, own)
            || channel.is_some_and(|c| roster.is_member(c, text))
            || looks_like_timestamp(text)
    }

    /// Reply text for one print of `set`, noting its position when the set
    /// has several.
    fn card_text(&self, set: &CardSet, index: Option<usize>) -> Option<String> {
        let (position, card) = set.select(index)?;
        let mut text = card.full_text(self.settings.control_codes);
        if set.len() > 1 {
            text.push_str(&format!(" ({position} of {} in the set)", set.len()));
        }
        Some(text)
    }

    /// Look `raw_query` up and push the reply. Returns the catalog key of the
    /// card that was answered, if one was.
    fn answer(
        &self,
        catalog: &CatalogMap,
        raw_query: &str,
        reply_to: &str,
        sender: &str,
        out: &mut Vec<Reply>,
    ) -> Option<String> {
        let (query, index) = split_variant_index(raw_query);
        let result = lookup(catalog, query, self.settings.min_match);

        let Some(best) = result.best() else {
            out.push(Reply::privmsg(
                reply_to,
                format!("The card \"{query}\" was not found."),
            ));
            return None;
        };

        if best.score < self.settings.high_confidence {
            let names: Vec<&str> = result
                .iter()
                .take(MAX_SUGGESTIONS)
                .map(|c| c.set.name())
                .collect();
            out.push(Reply::privmsg(reply_to, did_you_mean(query, &names)));
            return None;
        }

        let text = self.card_text(&best.set, index)?;
        out.push(Reply::privmsg(reply_to, text));
        debug!(
            query,
            card = %best.key,
            score = best.score,
            substring = best.contains_query,
            "Answered card lookup"
        );

        if !best.is_exact() {
            let others: Vec<&str> = result
                .iter()
                .skip(1)
                .filter(|c| c.score >= self.settings.high_confidence)
                .take(MAX_SUGGESTIONS)
                .map(|c| c.set.name())
                .collect();
            if !others.is_empty() {
                out.push(Reply::notice(
                    sender,
                    format!("Other matches for \"{query}\": {}", others.join(", ")),
                ));
            }
        }
        Some(best.key.clone())
    }
}

fn did_you_mean(query: &str, names: &[&str]) -> String {
    match names {
        [] => format!("The card \"{query}\" was not found."),
        [only] => format!("The card \"{query}\" was not found. Did you mean {only}?"),
        [first, rest @ ..] => format!(
            "The card \"{query}\" was not found. Did you mean {first} (or {})?",
            rest.join(", ")
        ),
    }
}
