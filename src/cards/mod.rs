//! Card model, catalog and the asset source it is loaded from.

mod catalog;
mod set;
mod source;
mod variant;
mod watcher;

pub use catalog::{Catalog, CatalogMap, fold_name};
pub use set::CardSet;
pub use source::{AssetSource, CardSource};
pub use variant::{CardClass, CardType, CardVariant, Family, Rarity};
pub use watcher::CatalogWatcher;
