// Catalog source adapters: the structured REST catalog and the scraped
// anti-bot-protected web catalog, behind one capability trait

pub mod rest;
pub mod scraped;
pub mod traits;

pub use rest::RestCatalogSource;
pub use scraped::{BrowserSession, PlainHttpSession, ScrapedCatalogSource};
pub use traits::{CatalogSource, SourceSet};
