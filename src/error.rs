//! Error hierarchy for the bot.
//!
//! Nothing here is ever shown to IRC users: lookups that find nothing are
//! ordinary replies, and catalog failures leave the previous catalog live.

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Catalog Errors (reload)
// ============================================================================

/// A catalog reload failed; the previous catalog stays authoritative.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The source file couldn't be read. Usually transient: the game client
    /// holds the file locked while patching.
    #[error("failed to read card source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but held no usable card data.
    #[error("no card data could be extracted from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },
}

impl CatalogError {
    /// Whether retrying the same file later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Extraction { .. } => "extraction",
        }
    }
}

// ============================================================================
// Card Errors (single definition)
// ============================================================================

/// One card definition couldn't be parsed. The card is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardParseError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("entity has no CardID")]
    MissingId,

    #[error("card {0} has no name in the requested language")]
    MissingName(String),

    #[error("card {id}: tag {tag} has non-numeric value {value:?}")]
    BadNumber {
        id: String,
        tag: String,
        value: String,
    },
}
