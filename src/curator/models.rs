// Common data models for the curation engine

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Which catalog a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Structured REST catalog (paginated JSON search API)
    Rest,
    /// Catalog scraped from an anti-bot-protected web front end
    Scraped,
}

impl SourceKind {
    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Scraped => "scraped",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Raw candidate produced by one catalog fetch. Created per page, consumed
/// by the merger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Source-local project id
    pub source_id: String,
    /// Canonical title; entries without a title are classified as libraries
    pub title: Option<String>,
    /// Total download count reported by the catalog
    pub downloads: u64,
    /// Short description
    pub description: String,
    /// Originating catalog
    pub source: SourceKind,
}

/// How a curated mod entered the canonical set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginFlag {
    /// Surfaced from the top-downloads scan
    TopDownloaded,
    /// Auto-materialized because a selected mod requires it
    RequiredDependency,
    /// Confirmed by more than one path: present in both catalogs, or a top
    /// result that also sits in a required closure
    Both,
}

impl OriginFlag {
    /// Flag after a second, independent discovery of the same mod
    pub fn confirmed(self) -> Self {
        Self::Both
    }

    pub fn is_required_dependency(&self) -> bool {
        matches!(self, Self::RequiredDependency | Self::Both)
    }
}

/// Canonical, merged entity: one per normalized identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedMod {
    /// Source-local ids, one per catalog that knows this mod
    pub ids: BTreeMap<SourceKind, String>,
    pub name: String,
    /// Max download count across sources
    pub downloads: u64,
    pub description: String,
    pub origin: OriginFlag,
    /// Required-dependency ids discovered while resolving this mod
    #[serde(default)]
    pub required_deps: BTreeSet<String>,
    /// Optional-dependency ids attached to this mod (never auto-installed)
    #[serde(default)]
    pub optional_deps: BTreeSet<String>,
}

impl CuratedMod {
    /// Create a curated entry from a top-downloads search record.
    ///
    /// Callers must have classified the record already; a record without a
    /// title never reaches this point on the top-downloaded path.
    pub fn from_record(record: CatalogRecord) -> Self {
        let mut ids = BTreeMap::new();
        let name = record.title.clone().unwrap_or_else(|| record.source_id.clone());
        ids.insert(record.source, record.source_id);
        Self {
            ids,
            name,
            downloads: record.downloads,
            description: record.description,
            origin: OriginFlag::TopDownloaded,
            required_deps: BTreeSet::new(),
            optional_deps: BTreeSet::new(),
        }
    }

    /// Fold a record from another source into this entry
    pub fn absorb(&mut self, record: CatalogRecord) {
        self.ids.entry(record.source).or_insert(record.source_id);
        if record.downloads > self.downloads {
            self.downloads = record.downloads;
        }
        if self.description.is_empty() && !record.description.is_empty() {
            self.description = record.description;
        }
        self.origin = self.origin.confirmed();
    }

    /// Preferred (kind, id) pair for dependency resolution and downloads.
    /// The REST catalog wins when both know the mod.
    pub fn primary_id(&self) -> Option<(SourceKind, &str)> {
        self.ids
            .get(&SourceKind::Rest)
            .map(|id| (SourceKind::Rest, id.as_str()))
            .or_else(|| {
                self.ids
                    .get(&SourceKind::Scraped)
                    .map(|id| (SourceKind::Scraped, id.as_str()))
            })
    }

    /// Whether any catalog knows this mod under `id`
    pub fn has_id(&self, id: &str) -> bool {
        self.ids.values().any(|v| v == id)
    }
}

/// Dependency relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Must be installed; resolved transitively
    Required,
    /// Tracked for the interop audit only, never auto-traversed
    Optional,
}

/// One edge of the dependency graph, as reported by a catalog
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: DependencyKind,
    pub source: SourceKind,
}

/// Optional-dependency audit entry. Grows only; a requester is appended at
/// most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub dependency_id: String,
    pub requested_by: Vec<String>,
}

impl AuditEntry {
    pub fn new(dependency_id: &str) -> Self {
        Self {
            dependency_id: dependency_id.to_string(),
            requested_by: Vec::new(),
        }
    }

    /// Append a requester unless it is already attributed
    pub fn push_requester(&mut self, requester: &str) {
        if !self.requested_by.iter().any(|r| r == requester) {
            self.requested_by.push(requester.to_string());
        }
    }
}

/// Minimal metadata used to materialize a required dependency that never
/// appeared in the top-downloads scan
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub id: String,
    pub title: Option<String>,
    pub downloads: u64,
    pub description: String,
}

/// Best-matching binary artifact for a target version + loader
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    pub url: String,
    pub filename: String,
    /// Declared size in bytes, when the catalog reports one
    pub size: Option<u64>,
}

/// Caller-driven pagination window
#[derive(Debug, Clone, Copy)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: SourceKind, id: &str, title: &str, downloads: u64) -> CatalogRecord {
        CatalogRecord {
            source_id: id.to_string(),
            title: Some(title.to_string()),
            downloads,
            description: String::new(),
            source,
        }
    }

    #[test]
    fn absorb_keeps_max_downloads_and_confirms_origin() {
        let mut m = CuratedMod::from_record(record(SourceKind::Rest, "a1", "Sodium", 1000));
        m.absorb(record(SourceKind::Scraped, "b1", "sodium", 1200));

        assert_eq!(m.downloads, 1200);
        assert_eq!(m.origin, OriginFlag::Both);
        assert_eq!(m.ids.len(), 2);
        assert_eq!(m.primary_id(), Some((SourceKind::Rest, "a1")));
    }

    #[test]
    fn audit_entry_appends_requester_once() {
        let mut e = AuditEntry::new("modmenu");
        e.push_requester("m1");
        e.push_requester("m1");
        e.push_requester("m2");
        assert_eq!(e.requested_by, vec!["m1".to_string(), "m2".to_string()]);
    }
}
