// Shared test double: an in-memory catalog source

use std::collections::HashMap;

use async_trait::async_trait;

use mod_curator::curator::{
    ArtifactRef, CatalogRecord, DependencyEdge, DependencyKind, PageWindow, ProjectSummary,
    SourceError, SourceKind,
};
use mod_curator::sources::CatalogSource;

/// Fully canned catalog. Search serves a fixed record list through the
/// pagination window; edges and summaries come from maps.
pub struct StaticCatalogSource {
    kind: SourceKind,
    records: Vec<CatalogRecord>,
    edges: HashMap<String, Vec<(String, DependencyKind)>>,
    summaries: HashMap<String, ProjectSummary>,
    fail_from_offset: Option<usize>,
}

impl StaticCatalogSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            edges: HashMap::new(),
            summaries: HashMap::new(),
            fail_from_offset: None,
        }
    }

    pub fn with_record(mut self, id: &str, title: Option<&str>, downloads: u64) -> Self {
        self.records.push(CatalogRecord {
            source_id: id.to_string(),
            title: title.map(str::to_string),
            downloads,
            description: format!("{id} description"),
            source: self.kind,
        });
        self
    }

    pub fn with_edge(mut self, from: &str, to: &str, kind: DependencyKind) -> Self {
        self.edges
            .entry(from.to_string())
            .or_default()
            .push((to.to_string(), kind));
        self
    }

    pub fn with_summary(mut self, id: &str, title: &str, downloads: u64) -> Self {
        self.summaries.insert(
            id.to_string(),
            ProjectSummary {
                id: id.to_string(),
                title: Some(title.to_string()),
                downloads,
                description: String::new(),
            },
        );
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_from_offset = Some(0);
        self
    }

    /// Serve search pages normally below `offset`, then error
    pub fn failing_from_offset(mut self, offset: usize) -> Self {
        self.fail_from_offset = Some(offset);
        self
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "static-catalog"
    }

    async fn search(
        &self,
        _version: &str,
        _loader: &str,
        window: PageWindow,
    ) -> Result<Vec<CatalogRecord>, SourceError> {
        if let Some(from) = self.fail_from_offset {
            if window.offset >= from {
                return Err(SourceError::Transport("canned outage".into()));
            }
        }
        let start = window.offset.min(self.records.len());
        let end = (window.offset + window.limit).min(self.records.len());
        Ok(self.records[start..end].to_vec())
    }

    async fn dependency_edges(
        &self,
        id: &str,
        _version: &str,
        _loader: &str,
    ) -> Result<Vec<DependencyEdge>, SourceError> {
        Ok(self
            .edges
            .get(id)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(to, kind)| DependencyEdge {
                        from: id.to_string(),
                        to: to.clone(),
                        kind: *kind,
                        source: self.kind,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn project_summary(&self, id: &str) -> Result<ProjectSummary, SourceError> {
        self.summaries
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    async fn best_artifact(
        &self,
        id: &str,
        _version: &str,
        _loader: &str,
    ) -> Result<ArtifactRef, SourceError> {
        Err(SourceError::NotFound(id.to_string()))
    }
}
