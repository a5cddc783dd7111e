//! Card definitions pulled out of the game's asset bundle.
//!
//! The bundle is an opaque binary blob with one small XML document per card
//! embedded in it. Each document starts with `<?xml` and runs to the next
//! NUL byte:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Entity version="2" CardID="EX1_169">
//!   <Tag name="CardName" enumID="185" type="String">
//!     <enUS>Innervate</enUS>
//!     <frFR>Innervation</frFR>
//!   </Tag>
//!   <Tag name="Cost" enumID="48" type="Number" value="0"/>
//! </Entity>
//! ```

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::{CardClass, CardType, CardVariant, Family, Rarity};
use crate::error::{CardParseError, CatalogError};

const XML_START: &[u8] = b"<?xml";

const NUMBER_TAGS: &[&str] = &[
    "Cost",
    "Atk",
    "Health",
    "Durability",
    "Class",
    "Rarity",
    "Race",
    "CardType",
];

/// Supplies the card definitions for one catalog reload.
pub trait CardSource: Send + Sync {
    /// Every usable card in `language`. Individual malformed cards are
    /// skipped; an error means nothing usable could be produced.
    fn load(&self, language: &str) -> Result<Vec<CardVariant>, CatalogError>;
}

/// Reads cards out of the asset bundle on disk.
#[derive(Clone, Debug)]
pub struct AssetSource {
    path: PathBuf,
}

impl AssetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CardSource for AssetSource {
    fn load(&self, language: &str) -> Result<Vec<CardVariant>, CatalogError> {
        let bytes = std::fs::read(&self.path).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })?;
        cards_from_bytes(&bytes, language).map_err(|reason| CatalogError::Extraction {
            path: self.path.clone(),
            reason,
        })
    }
}

/// Extract and parse every embedded card document in `bytes`.
pub fn cards_from_bytes(bytes: &[u8], language: &str) -> Result<Vec<CardVariant>, String> {
    let documents = extract_documents(bytes);
    if documents.is_empty() {
        return Err("no embedded XML documents".to_string());
    }

    let mut cards = Vec::with_capacity(documents.len());
    let mut skipped = 0usize;
    for doc in &documents {
        let text = String::from_utf8_lossy(doc);
        match parse_card(&text, language) {
            Ok(Some(card)) => cards.push(card),
            Ok(None) => skipped += 1,
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping card definition");
            }
        }
    }

    debug!(
        documents = documents.len(),
        cards = cards.len(),
        skipped,
        "Extracted card documents"
    );

    if cards.is_empty() {
        return Err(format!("no cards with a {language} name"));
    }
    Ok(cards)
}

/// Slice out each `<?xml ... \0` run.
pub fn extract_documents(bytes: &[u8]) -> Vec<&[u8]> {
    let mut docs = Vec::new();
    let mut rest = bytes;
    while let Some(start) = find(rest, XML_START) {
        let doc = &rest[start..];
        let end = doc.iter().position(|&b| b == 0).unwrap_or(doc.len());
        docs.push(&doc[..end]);
        rest = &doc[end..];
    }
    docs
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn xml_err(e: impl std::fmt::Display) -> CardParseError {
    CardParseError::Xml(e.to_string())
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, CardParseError> {
    match e.try_get_attribute(name).map_err(xml_err)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_err)?.into_owned())),
        None => Ok(None),
    }
}

/// Accumulates tags while walking one document.
#[derive(Default)]
struct Draft {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    flavor: Option<String>,
    cost: i32,
    attack: i32,
    health: i32,
    class: i32,
    rarity: i32,
    card_type: Option<i32>,
    race: i32,
}

impl Draft {
    fn set_number(&mut self, tag: &str, value: &str) -> Result<(), CardParseError> {
        if !NUMBER_TAGS.contains(&tag) {
            return Ok(());
        }
        let n: i32 = value.trim().parse().map_err(|_| CardParseError::BadNumber {
            id: self.id.clone().unwrap_or_default(),
            tag: tag.to_string(),
            value: value.to_string(),
        })?;
        match tag {
            "Cost" => self.cost = n,
            "Atk" => self.attack = n,
            "Health" | "Durability" => self.health = n,
            "Class" => self.class = n,
            "Rarity" => self.rarity = n,
            "Race" => self.race = n,
            _ => self.card_type = Some(n),
        }
        Ok(())
    }

    fn set_text(&mut self, tag: &str, text: &str) {
        let slot = match tag {
            "CardName" => &mut self.name,
            "CardTextInHand" => &mut self.description,
            "FlavorText" => &mut self.flavor,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }
}

/// Record a `Tag`'s numeric value, if it has one, and return its name.
fn read_tag(draft: &mut Draft, e: &BytesStart<'_>) -> Result<String, CardParseError> {
    let name = attribute(e, "name")?.unwrap_or_default();
    if let Some(value) = attribute(e, "value")? {
        draft.set_number(&name, &value)?;
    }
    Ok(name)
}

/// Parse one card document. `Ok(None)` means the entity is valid but not a
/// card worth answering for (heroes, enchantments, debug entities, unknown
/// card types).
pub fn parse_card(xml: &str, language: &str) -> Result<Option<CardVariant>, CardParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut draft = Draft::default();
    let mut tag: Option<String> = None;
    let mut in_language = false;

    loop {
        match reader.read_event().map_err(|e| {
            CardParseError::Xml(format!("at byte {}: {e}", reader.buffer_position()))
        })? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Entity" => {
                draft.id = attribute(&e, "CardID")?;
            }
            Event::Start(e) if e.name().as_ref() == b"Tag" => {
                tag = Some(read_tag(&mut draft, &e)?);
            }
            Event::Empty(e) if e.name().as_ref() == b"Tag" => {
                read_tag(&mut draft, &e)?;
            }
            Event::Start(e) => {
                in_language = tag.is_some() && e.name().as_ref() == language.as_bytes();
            }
            Event::Text(e) if in_language => {
                if let Some(tag) = tag.as_deref() {
                    draft.set_text(tag, &e.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(e) if in_language => {
                if let Some(tag) = tag.as_deref() {
                    draft.set_text(tag, &String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"Tag" {
                    tag = None;
                }
                in_language = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let id = draft.id.take().ok_or(CardParseError::MissingId)?;
    if id.starts_with("XXX_") {
        return Ok(None);
    }

    let card_type = match draft.card_type.and_then(CardType::from_tag) {
        Some(CardType::Hero | CardType::Effect) | None => return Ok(None),
        Some(t) => t,
    };

    let name = draft
        .name
        .take()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| CardParseError::MissingName(id.clone()))?;

    Ok(Some(CardVariant {
        id,
        name,
        cost: draft.cost,
        attack: draft.attack,
        health: draft.health,
        class: CardClass::from_tag(draft.class),
        rarity: Rarity::from_tag(draft.rarity),
        card_type,
        family: Family::from_tag(draft.race),
        description: draft.description.unwrap_or_default(),
        flavor: draft.flavor,
        markup: xml.to_string(),
    }))
}
