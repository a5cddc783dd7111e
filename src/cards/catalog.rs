//! The live card catalog.
//!
//! Readers take a cheap snapshot (`Arc` clone under a read lock). Reloads
//! build a complete new map off to the side and swap it in under the write
//! lock, so nobody ever sees a half-built catalog.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{CardSet, CardSource, CardVariant};
use crate::error::CatalogError;

/// Case-folded card name to its prints.
pub type CatalogMap = HashMap<String, Arc<CardSet>>;

/// Catalog key for a display name.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Thread-safe card catalog.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: RwLock<Arc<CatalogMap>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-populated with `cards`.
    pub fn from_cards(cards: impl IntoIterator<Item = CardVariant>) -> Self {
        Self {
            entries: RwLock::new(Arc::new(build(cards))),
        }
    }

    /// Rebuild from `source`. On error the current catalog is left untouched.
    /// Returns the number of distinct names now loaded.
    pub fn reload(&self, source: &dyn CardSource, language: &str) -> Result<usize, CatalogError> {
        let cards = source.load(language)?;
        let count = cards.len();
        let map = build(cards);
        let names = map.len();
        self.replace(map);
        info!(cards = count, names, language, "Card catalog reloaded");
        Ok(names)
    }

    /// Swap in a fully built map.
    pub fn replace(&self, map: CatalogMap) {
        *self.entries.write() = Arc::new(map);
    }

    /// Look up a card by exact name, ignoring case.
    pub fn get(&self, name: &str) -> Option<Arc<CardSet>> {
        self.entries.read().get(&fold_name(name)).cloned()
    }

    /// Every entry as of now. Later reloads don't affect the snapshot.
    pub fn snapshot(&self) -> Arc<CatalogMap> {
        Arc::clone(&*self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Group cards into sets by folded name. Same-named cards merge.
fn build(cards: impl IntoIterator<Item = CardVariant>) -> CatalogMap {
    let mut sets: HashMap<String, CardSet> = HashMap::new();
    for card in cards {
        let key = fold_name(&card.name);
        if key.is_empty() {
            continue;
        }
        sets.entry(key).or_default().insert(card);
    }
    sets.into_iter().map(|(k, v)| (k, Arc::new(v))).collect()
}
