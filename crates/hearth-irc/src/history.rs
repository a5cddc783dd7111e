//! Bounded history of outgoing lines with consecutive-duplicate suppression.

use std::collections::VecDeque;

/// Default number of lines remembered.
pub const DEFAULT_HISTORY_SIZE: usize = 50;

/// Ring buffer of lines written to the server.
#[derive(Clone, Debug)]
pub struct OutgoingHistory {
    lines: VecDeque<String>,
    capacity: usize,
    no_duplicates: bool,
}

/// PONG replies are recorded but never compared or suppressed.
fn is_keepalive(line: &str) -> bool {
    let command = line.split(' ').next().unwrap_or_default();
    command.eq_ignore_ascii_case("PONG")
}

impl OutgoingHistory {
    /// Create a history holding at most `capacity` lines.
    pub fn new(capacity: usize, no_duplicates: bool) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            no_duplicates,
        }
    }

    /// Record `line` unless it repeats the last non-keepalive line while
    /// duplicate suppression is on. Returns whether the line should go out.
    pub fn record(&mut self, line: &str) -> bool {
        if self.no_duplicates && !is_keepalive(line) && self.last_non_keepalive() == Some(line) {
            return false;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
        true
    }

    fn last_non_keepalive(&self) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .map(String::as_str)
            .find(|l| !is_keepalive(l))
    }

    /// Oldest-first view of what was sent.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of remembered lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has been sent yet.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for OutgoingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE, true)
    }
}
