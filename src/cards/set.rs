//! Same-named card prints, richest first.

use std::sync::Arc;

use super::CardVariant;

/// How much text a print carries. Higher ranks surface first.
fn richness(card: &CardVariant) -> u8 {
    if card.has_flavor() {
        2
    } else if card.has_description() {
        1
    } else {
        0
    }
}

/// Ordered group of variants sharing one case-folded name.
///
/// Prints with flavor text come before prints with only rules text, which
/// come before bare prints. Within a rank, insertion order is kept.
#[derive(Clone, Debug, Default)]
pub struct CardSet {
    variants: Vec<Arc<CardVariant>>,
}

impl CardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variant before the first sibling that carries less text.
    pub fn insert(&mut self, card: CardVariant) {
        let rank = richness(&card);
        let at = self
            .variants
            .iter()
            .position(|v| richness(v) < rank)
            .unwrap_or(self.variants.len());
        self.variants.insert(at, Arc::new(card));
    }

    /// The primary print.
    pub fn primary(&self) -> Option<&Arc<CardVariant>> {
        self.variants.first()
    }

    /// Variant by 1-based index, falling back to the primary print when the
    /// index is missing or out of range.
    pub fn select(&self, index: Option<usize>) -> Option<(usize, &Arc<CardVariant>)> {
        match index {
            Some(i) if (1..=self.variants.len()).contains(&i) => Some((i, &self.variants[i - 1])),
            _ => self.primary().map(|v| (1, v)),
        }
    }

    /// Display name of the primary print.
    pub fn name(&self) -> &str {
        self.primary().map(|v| v.name.as_str()).unwrap_or_default()
    }

    pub fn variants(&self) -> &[Arc<CardVariant>] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, description: &str, flavor: Option<&str>) -> CardVariant {
        CardVariant {
            id: id.into(),
            name: "Mark of the Wild".into(),
            description: description.into(),
            flavor: flavor.map(Into::into),
            ..CardVariant::default()
        }
    }

    fn ids(set: &CardSet) -> Vec<&str> {
        set.variants().iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn flavored_print_moves_ahead_of_plain_ones() {
        let mut set = CardSet::new();
        set.insert(card("plain", "", None));
        set.insert(card("flavored", "Give a minion Taunt.", Some("Not a real mark.")));
        assert_eq!(ids(&set), ["flavored", "plain"]);
    }

    #[test]
    fn three_tiers_keep_insertion_order_within_a_tier() {
        let mut set = CardSet::new();
        set.insert(card("bare1", "", None));
        set.insert(card("desc1", "text", None));
        set.insert(card("flav1", "text", Some("f")));
        set.insert(card("desc2", "text", None));
        set.insert(card("bare2", "", None));
        set.insert(card("flav2", "", Some("f")));
        assert_eq!(
            ids(&set),
            ["flav1", "flav2", "desc1", "desc2", "bare1", "bare2"]
        );
    }

    #[test]
    fn blank_flavor_counts_as_none() {
        let mut set = CardSet::new();
        set.insert(card("desc", "text", None));
        set.insert(card("blank", "", Some("   ")));
        assert_eq!(ids(&set), ["desc", "blank"]);
    }

    #[test]
    fn select_is_one_based_with_primary_fallback() {
        let mut set = CardSet::new();
        set.insert(card("a", "text", Some("f")));
        set.insert(card("b", "", None));

        assert_eq!(set.select(Some(2)).map(|(i, v)| (i, v.id.as_str())), Some((2, "b")));
        assert_eq!(set.select(Some(1)).map(|(i, v)| (i, v.id.as_str())), Some((1, "a")));
        assert_eq!(set.select(Some(0)).map(|(i, _)| i), Some(1));
        assert_eq!(set.select(Some(9)).map(|(i, _)| i), Some(1));
        assert_eq!(set.select(None).map(|(i, _)| i), Some(1));
        assert_eq!(set.name(), "Mark of the Wild");
    }
}
