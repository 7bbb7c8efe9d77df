//! Mod curation engine: merges top-downloaded listings from a structured
//! REST catalog and a scraped web catalog into one canonical set, resolves
//! required dependencies to a bounded depth, audits shared optional
//! dependencies, and downloads the selected artifacts.

pub mod curator;
pub mod sources;

pub use curator::{
    CancelFlag, CuratedMod, CurationCache, CurationConfig, CurationEngine, CurationOutcome,
    CuratorError, SourceKind,
};
pub use sources::{CatalogSource, RestCatalogSource, ScrapedCatalogSource, SourceSet};
