//! Card mentions in free text, without any trigger syntax.
//!
//! Every word is a seed. A seed grows one word to the left or right while
//! doing so strictly improves its best catalog score, and stops at the first
//! local maximum. Phrases that end above the threshold are reported once per
//! card.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::{Candidate, best_match};
use crate::cards::CatalogMap;

/// A run of words that resolved to a card.
#[derive(Clone, Debug)]
pub struct PhraseMatch {
    /// Word span `[start, end)` within the message.
    pub start: usize,
    pub end: usize,
    pub phrase: String,
    pub candidate: Candidate,
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation() && c != '\''))
        .filter(|w| !w.is_empty())
        .collect()
}

struct Scorer<'a> {
    catalog: &'a CatalogMap,
    words: Vec<&'a str>,
    memo: HashMap<(usize, usize), Option<Candidate>>,
}

impl Scorer<'_> {
    fn score(&mut self, start: usize, end: usize) -> Option<Candidate> {
        match self.memo.entry((start, end)) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let phrase = self.words[start..end].join(" ");
                e.insert(best_match(self.catalog, &phrase)).clone()
            }
        }
    }

    fn value(&mut self, start: usize, end: usize) -> f64 {
        self.score(start, end).map_or(0.0, |c| c.score)
    }

    /// Hill-climb from the single word at `seed`.
    fn climb(&mut self, seed: usize) -> (usize, usize) {
        let (mut start, mut end) = (seed, seed + 1);
        let mut current = self.value(start, end);
        loop {
            let left = (start > 0).then(|| (start - 1, end));
            let right = (end < self.words.len()).then(|| (start, end + 1));

            let mut next: Option<((usize, usize), f64)> = None;
            for span in [left, right].into_iter().flatten() {
                let v = self.value(span.0, span.1);
                if v > current && next.is_none_or(|(_, best)| v > best) {
                    next = Some((span, v));
                }
            }
            match next {
                Some(((s, e), v)) => {
                    start = s;
                    end = e;
                    current = v;
                }
                None => return (start, end),
            }
        }
    }
}

/// Card mentions in `text` scoring at least `threshold`, best first, one
/// per card.
pub fn find_phrases(catalog: &CatalogMap, text: &str, threshold: f64) -> Vec<PhraseMatch> {
    let mut scorer = Scorer {
        catalog,
        words: words(text),
        memo: HashMap::new(),
    };

    let mut by_card: HashMap<String, PhraseMatch> = HashMap::new();
    for seed in 0..scorer.words.len() {
        let (start, end) = scorer.climb(seed);
        let Some(candidate) = scorer.score(start, end) else {
            continue;
        };
        if candidate.score < threshold {
            continue;
        }
        let found = PhraseMatch {
            start,
            end,
            phrase: scorer.words[start..end].join(" "),
            candidate,
        };
        match by_card.entry(found.candidate.key.clone()) {
            Entry::Occupied(mut e) if e.get().candidate.score < found.candidate.score => {
                e.insert(found);
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(e) => {
                e.insert(found);
            }
        }
    }

    let mut found: Vec<PhraseMatch> = by_card.into_values().collect();
    found.sort_by(|a, b| {
        b.candidate
            .score
            .total_cmp(&a.candidate.score)
            .then_with(|| a.start.cmp(&b.start))
    });
    found
}
