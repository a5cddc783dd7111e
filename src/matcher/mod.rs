//! Fuzzy card-name lookup.
//!
//! Queries are scored against every catalog name word by word: the best
//! remaining (query word, name word) pair is matched first, both words are
//! consumed, and the pair's similarity is weighted by how much of the query
//! and of the name those words make up. Word order doesn't matter, and
//! missing filler words ("mark wild" for "Mark of the Wild") cost little.

mod distance;
mod phrase;

use std::sync::Arc;

pub use distance::similarity;
pub use phrase::find_phrases;

use crate::cards::{CardSet, CatalogMap, fold_name};

/// Weight of the query-side word fraction.
const QUERY_WEIGHT: f64 = 0.75;
/// Weight of the candidate-side word fraction.
const CANDIDATE_WEIGHT: f64 = 0.25;
/// Best score a fuzzy match can reach. 1.0 is kept for exact names.
pub const FUZZY_CAP: f64 = 0.99;

/// One catalog entry that matched a query.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Catalog key (case-folded name).
    pub key: String,
    pub set: Arc<CardSet>,
    /// Match score in `[0, 1]`.
    pub score: f64,
    /// Whether the query appears verbatim inside the name. Informational.
    pub contains_query: bool,
}

impl Candidate {
    pub fn is_exact(&self) -> bool {
        self.score >= 1.0
    }
}

/// Candidates ordered best first. Equal scores are ordered by name so the
/// result is deterministic; none are dropped.
#[derive(Clone, Debug, Default)]
pub struct MatchResult {
    candidates: Vec<Candidate>,
}

impl MatchResult {
    fn from_unsorted(mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.key.cmp(&b.key))
        });
        Self { candidates }
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Find catalog entries for `query`, scoring at least `min_match`.
pub fn lookup(catalog: &CatalogMap, query: &str, min_match: f64) -> MatchResult {
    let folded = fold_name(query);
    if folded.is_empty() {
        return MatchResult::default();
    }
    if let Some(set) = catalog.get(&folded) {
        return MatchResult {
            candidates: vec![Candidate {
                key: folded,
                set: Arc::clone(set),
                score: 1.0,
                contains_query: true,
            }],
        };
    }

    let query_words: Vec<&str> = folded.split_whitespace().collect();
    let candidates = catalog
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .filter_map(|(key, set)| {
            let score = word_score(&query_words, key).min(FUZZY_CAP);
            (score >= min_match).then(|| Candidate {
                key: key.clone(),
                set: Arc::clone(set),
                score,
                contains_query: key.contains(folded.as_str()),
            })
        })
        .collect();
    MatchResult::from_unsorted(candidates)
}

/// Best single candidate for `query`, if any scores above zero.
pub fn best_match(catalog: &CatalogMap, query: &str) -> Option<Candidate> {
    lookup(catalog, query, f64::MIN_POSITIVE).best().cloned()
}

/// Uncapped word-aligned score of already folded query words against a
/// folded candidate name.
pub fn word_score(query_words: &[&str], candidate: &str) -> f64 {
    let candidate_words: Vec<&str> = candidate.split_whitespace().collect();
    let query_total: usize = query_words.iter().map(|w| w.chars().count()).sum();
    let candidate_total: usize = candidate_words.iter().map(|w| w.chars().count()).sum();
    if query_total == 0 || candidate_total == 0 {
        return 0.0;
    }

    let mut query_left: Vec<Option<&str>> = query_words.iter().copied().map(Some).collect();
    let mut candidate_left: Vec<Option<&str>> = candidate_words.into_iter().map(Some).collect();
    let pairs = query_left.len().min(candidate_left.len());

    let mut score = 0.0;
    for _ in 0..pairs {
        let mut best: Option<(usize, usize, f64)> = None;
        for (qi, q) in query_left.iter().enumerate() {
            let Some(q) = q else { continue };
            for (ci, c) in candidate_left.iter().enumerate() {
                let Some(c) = c else { continue };
                let sim = similarity(q, c);
                if best.is_none_or(|(_, _, s)| sim > s) {
                    best = Some((qi, ci, sim));
                }
            }
        }
        let Some((qi, ci, sim)) = best else { break };
        let (Some(q), Some(c)) = (query_left[qi].take(), candidate_left[ci].take()) else {
            break;
        };
        let query_fraction = q.chars().count() as f64 / query_total as f64;
        let candidate_fraction = c.chars().count() as f64 / candidate_total as f64;
        score += sim * (QUERY_WEIGHT * query_fraction + CANDIDATE_WEIGHT * candidate_fraction);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Catalog, CardVariant};

    fn catalog(names: &[&str]) -> Arc<CatalogMap> {
        Catalog::from_cards(names.iter().enumerate().map(|(i, n)| CardVariant {
            id: format!("T_{i}"),
            name: n.to_string(),
            ..CardVariant::default()
        }))
        .snapshot()
    }

    fn score(query: &str, candidate: &str) -> f64 {
        let q = fold_name(query);
        let words: Vec<&str> = q.split_whitespace().collect();
        word_score(&words, &fold_name(candidate))
    }

    #[test]
    fn exact_name_short_circuits_to_one() {
        let cards = catalog(&["The Coin", "Coin Purse"]);
        let result = lookup(&cards, "THE coin", 0.4);
        assert_eq!(result.len(), 1);
        let best = result.best().unwrap();
        assert_eq!(best.score, 1.0);
        assert!(best.is_exact());
        assert_eq!(best.set.name(), "The Coin");
    }

    #[test]
    fn reordered_and_partial_words_score_high() {
        let s = score("mark wild", "Mark of the Wild");
        // 2 x 1.0 x (0.75 x 4/8 + 0.25 x 4/13)
        assert!((s - (0.75 + 0.5 * 4.0 / 13.0)).abs() < 1e-9);
        assert!(score("wild mark", "Mark of the Wild") == s);
    }

    #[test]
    fn typos_are_tolerated() {
        let cards = catalog(&["Do Nothing", "Doomsayer", "Nightblade"]);
        let result = lookup(&cards, "doo nothng", 0.4);
        let best = result.best().unwrap();
        assert_eq!(best.set.name(), "Do Nothing");
        assert!(best.score >= 0.5);
        assert!(best.score < 1.0);
    }

    #[test]
    fn fuzzy_scores_are_capped_below_one() {
        // All query words match perfectly but the name isn't an exact hit.
        let s = score("wild of mark the", "Mark of the Wild");
        assert!(s >= 0.99);
        let cards = catalog(&["Mark of the Wild"]);
        let result = lookup(&cards, "wild of mark the", 0.4);
        assert_eq!(result.best().unwrap().score, FUZZY_CAP);
    }

    #[test]
    fn results_below_minimum_are_dropped() {
        let cards = catalog(&["Ragnaros the Firelord", "Wisp"]);
        let result = lookup(&cards, "wisp", 0.4);
        assert_eq!(result.len(), 1);
        assert!(lookup(&cards, "zzzz", 0.4).is_empty());
        assert!(lookup(&cards, "   ", 0.0).is_empty());
    }

    #[test]
    fn equal_scores_are_kept_and_ordered_by_name() {
        let cards = catalog(&["Frost Bolt", "Frost Nova", "Frost Shock"]);
        let result = lookup(&cards, "frost", 0.1);
        let keys: Vec<&str> = result.iter().map(|c| c.key.as_str()).collect();
        // "bolt" and "nova" tie; "frost" is a smaller share of "frost shock".
        assert_eq!(keys, ["frost bolt", "frost nova", "frost shock"]);
    }

    #[test]
    fn substring_containment_is_reported_but_not_boosted() {
        let cards = catalog(&["Firelands Portal"]);
        let result = lookup(&cards, "lands port", 0.0);
        let best = result.best().unwrap();
        assert!(best.contains_query);
        assert_eq!(best.score, score("lands port", "Firelands Portal"));
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(word_score(&[], "wisp"), 0.0);
        assert_eq!(word_score(&["wisp"], ""), 0.0);
    }
}
