// CatalogSource contract shared by both catalog adapters

use std::sync::Arc;

use async_trait::async_trait;

use crate::curator::errors::SourceError;
use crate::curator::models::{
    ArtifactRef, CatalogRecord, DependencyEdge, PageWindow, ProjectSummary, SourceKind,
};

/// Capability interface over one catalog: top-downloads search, dependency
/// edges, minimal project metadata, and artifact resolution.
///
/// Implementations surface failures as [`SourceError`]; the engine is the
/// one that fails closed (logs the error, treats the call as empty) so a
/// flaky catalog never aborts a curation run.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Name of the source (for logging)
    fn name(&self) -> &'static str;

    /// One page of candidates for the target version + loader, ordered by
    /// descending download count within the page. Pagination is
    /// caller-driven: the engine walks increasing offsets until a short
    /// page or the requested scan size.
    async fn search(
        &self,
        version: &str,
        loader: &str,
        window: PageWindow,
    ) -> Result<Vec<CatalogRecord>, SourceError>;

    /// Dependency edge list for one project, best-matched to the target
    /// version + loader
    async fn dependency_edges(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<Vec<DependencyEdge>, SourceError>;

    /// Minimal metadata, used to materialize required dependencies that
    /// never appeared in the top-downloads scan
    async fn project_summary(&self, id: &str) -> Result<ProjectSummary, SourceError>;

    /// Best-matching binary artifact. Fallback order: exact loader+version
    /// match, then version-only, then most-recent version containing the
    /// target version, then most-recent available.
    async fn best_artifact(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<ArtifactRef, SourceError>;
}

/// The set of configured catalog sources for a run
#[derive(Clone, Default)]
pub struct SourceSet {
    sources: Vec<Arc<dyn CatalogSource>>,
}

impl SourceSet {
    pub fn new(sources: Vec<Arc<dyn CatalogSource>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Arc<dyn CatalogSource>) {
        self.sources.push(source);
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn CatalogSource>> {
        self.sources.iter().find(|s| s.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CatalogSource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
