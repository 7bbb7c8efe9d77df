// Cross-source merge and deduplication
//
// Combines candidate records from both catalogs into one canonical set,
// keyed by normalized title. Deterministic: the same input sequences always
// produce the same set and ordering, and feeding the sequences in
// incrementally gives the same result as feeding them at once.

use std::collections::HashMap;

use super::classifier;
use super::models::{CatalogRecord, CuratedMod};

/// Normalized merge key: case-folded, trimmed title
pub fn merge_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Incremental merger. Ingest records page by page, then `finish` for the
/// ordered canonical list.
#[derive(Debug, Default)]
pub struct Merger {
    // first-seen order lives in `mods`; `by_key` indexes into it
    by_key: HashMap<String, usize>,
    mods: Vec<CuratedMod>,
    skipped_libraries: usize,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one candidate. Libraries (per the classifier) are dropped
    /// here; required dependencies bypass the merger entirely and are
    /// materialized by the engine.
    pub fn ingest(&mut self, record: CatalogRecord) {
        if classifier::is_library(record.title.as_deref()) {
            self.skipped_libraries += 1;
            return;
        }
        // classifier guarantees a non-empty title past this point
        let key = merge_key(record.title.as_deref().unwrap_or_default());

        match self.by_key.get(&key) {
            Some(&idx) => self.mods[idx].absorb(record),
            None => {
                self.by_key.insert(key, self.mods.len());
                self.mods.push(CuratedMod::from_record(record));
            }
        }
    }

    pub fn ingest_all<I: IntoIterator<Item = CatalogRecord>>(&mut self, records: I) {
        for record in records {
            self.ingest(record);
        }
    }

    /// Candidates merged so far (libraries excluded)
    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// How many candidates the classifier dropped
    pub fn skipped_libraries(&self) -> usize {
        self.skipped_libraries
    }

    /// Finish the merge: stable sort by downloads descending, ties keep
    /// first-seen order.
    pub fn finish(mut self) -> Vec<CuratedMod> {
        self.mods
            .sort_by(|a, b| b.downloads.cmp(&a.downloads));
        self.mods
    }
}
