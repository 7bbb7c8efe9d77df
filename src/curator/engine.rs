// Curation engine
//
// Orchestrates one curation run end to end: concurrent top-downloads scans
// over every configured catalog, cross-source merge, bounded dependency
// resolution, auto-materialization of required dependencies, the interop
// audit, and the cache write. Fails closed per source: a flaky catalog is
// logged and skipped, and the run only aborts when every source is down
// and nothing was found.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::audit::{self, AuditFinding};
use super::cache::CurationCache;
use super::download::{
    DownloadItem, DownloadOutcome, Downloader, HttpArtifactFetcher,
};
use super::errors::{CuratorError, SourceError};
use super::merge::{merge_key, Merger};
use super::models::{CatalogRecord, CuratedMod, OriginFlag, PageWindow, SourceKind};
use super::resolver::{DependencyResolver, ResolutionState, DEFAULT_MAX_DEPTH};
use crate::sources::{CatalogSource, SourceSet};

/// Cooperative cancellation handle. Cheap to clone; every long-running
/// stage checks it between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tunables for one curation run
#[derive(Debug, Clone)]
pub struct CurationConfig {
    pub game_version: String,
    pub loader: String,
    /// Size of the final curated list
    pub limit: usize,
    /// Scan depth: how many candidates to pull per source, as a multiple
    /// of `limit` (deduplication and library filtering thin the scan out)
    pub scan_multiplier: usize,
    /// Hard ceiling on the per-source scan, whatever the multiplier says
    pub scan_cap: usize,
    /// Page size for the paginated scans
    pub page_size: usize,
    pub max_depth: u8,
    pub include_optional_audit: bool,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            game_version: String::new(),
            loader: String::new(),
            limit: 100,
            scan_multiplier: 5,
            scan_cap: 500,
            page_size: 100,
            max_depth: DEFAULT_MAX_DEPTH,
            include_optional_audit: true,
        }
    }
}

impl CurationConfig {
    pub fn new(game_version: impl Into<String>, loader: impl Into<String>) -> Self {
        Self {
            game_version: game_version.into(),
            loader: loader.into(),
            ..Self::default()
        }
    }

    /// Candidates to pull from each source before merging
    pub fn scan_size(&self) -> usize {
        self.limit
            .saturating_mul(self.scan_multiplier)
            .min(self.scan_cap)
    }
}

/// Everything one curation run produced
#[derive(Debug)]
pub struct CurationOutcome {
    pub mods: Vec<CuratedMod>,
    pub findings: Vec<AuditFinding>,
    /// Required dependencies resolved across the whole run
    pub required_dep_count: usize,
    /// Candidates the classifier dropped during the merge
    pub skipped_libraries: usize,
    /// Sources that failed mid-scan; the run continued without them
    pub source_failures: Vec<(SourceKind, String)>,
    /// Cache persistence is best-effort; a failed write lands here instead
    /// of failing the run
    pub cache_write_error: Option<String>,
}

/// One engine per run configuration. Sources and cache are injected so
/// tests can run against doubles and a temp directory.
pub struct CurationEngine {
    sources: SourceSet,
    cache: CurationCache,
    config: CurationConfig,
    cancel: CancelFlag,
}

impl CurationEngine {
    pub fn new(sources: SourceSet, cache: CurationCache, config: CurationConfig) -> Self {
        Self {
            sources,
            cache,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the full pipeline: scan, merge, resolve, audit, cache.
    pub async fn curate(&self) -> Result<CurationOutcome, CuratorError> {
        let (records_by_kind, source_failures) = self.scan_all().await;

        let candidates: usize = records_by_kind.iter().map(|(_, r)| r.len()).sum();
        if candidates == 0 && source_failures.len() == self.sources.len() {
            return Err(CuratorError::AllSourcesUnavailable);
        }

        // feed the REST scan first so first-seen tie order is deterministic
        let mut merger = Merger::new();
        let mut ordered = records_by_kind;
        ordered.sort_by_key(|(kind, _)| *kind);
        for (_, records) in ordered {
            merger.ingest_all(records);
        }
        let skipped_libraries = merger.skipped_libraries();
        let mut mods = merger.finish();
        mods.truncate(self.config.limit);
        info!(
            target: "curator::engine",
            surfaced = mods.len(),
            skipped_libraries,
            "merged top-downloads scans"
        );

        let mut state = ResolutionState::new();
        self.resolve_all(&mut mods, &mut state).await;
        let selected: BTreeSet<String> = mods
            .iter()
            .filter_map(|m| m.primary_id().map(|(_, id)| id.to_string()))
            .collect();

        self.materialize_required(&mut mods, &state).await;

        // stable re-sort keeps first-seen order for equal download counts
        mods.sort_by(|a, b| b.downloads.cmp(&a.downloads));

        let findings = if self.config.include_optional_audit {
            audit::audit(&state.optional_audit, &selected)
        } else {
            Vec::new()
        };

        let cache_write_error = self
            .cache
            .save(
                &self.config.game_version,
                &self.config.loader,
                &mods,
                &state.optional_audit,
            )
            .err()
            .map(|e| {
                warn!(target: "curator::engine", error = %e, "cache write failed");
                e.to_string()
            });

        Ok(CurationOutcome {
            mods,
            findings,
            required_dep_count: state.resolved_required.len(),
            skipped_libraries,
            source_failures,
            cache_write_error,
        })
    }

    /// Scan every source concurrently. A failed page fetch ends that
    /// source's scan but keeps the pages it already returned; the failure
    /// is reported, never propagated.
    async fn scan_all(&self) -> (Vec<(SourceKind, Vec<CatalogRecord>)>, Vec<(SourceKind, String)>) {
        let scan_size = self.config.scan_size();
        let mut tasks: JoinSet<(SourceKind, Vec<CatalogRecord>, Option<SourceError>)> =
            JoinSet::new();

        for source in self.sources.iter() {
            let source = Arc::clone(source);
            let version = self.config.game_version.clone();
            let loader = self.config.loader.clone();
            let page_size = self.config.page_size;
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let kind = source.kind();
                let (records, failure) =
                    scan_source(source, &version, &loader, scan_size, page_size, cancel).await;
                (kind, records, failure)
            });
        }

        let mut records = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, page, failure)) => {
                    if let Some(e) = failure {
                        warn!(
                            target: "curator::engine",
                            source = %kind,
                            kept = page.len(),
                            error = %e,
                            "catalog scan failed, keeping the pages already fetched"
                        );
                        failures.push((kind, e.to_string()));
                    }
                    records.push((kind, page));
                }
                Err(e) => warn!(target: "curator::engine", error = %e, "scan task panicked"),
            }
        }
        (records, failures)
    }

    /// Resolve the required closure for every surfaced mod into the shared
    /// run state, and stamp each mod with what its traversal touched.
    async fn resolve_all(&self, mods: &mut [CuratedMod], state: &mut ResolutionState) {
        for entry in mods.iter_mut() {
            if self.cancel.is_cancelled() {
                break;
            }
            let (kind, root) = match entry.primary_id() {
                Some((kind, id)) => (kind, id.to_string()),
                None => continue,
            };
            let source = match self.sources.get(kind) {
                Some(s) => s,
                None => continue,
            };

            // a top result that an earlier closure already pulled in is
            // confirmed by two independent paths
            if state.resolved_required.contains_key(&root) {
                entry.origin = entry.origin.confirmed();
            }

            let resolver = DependencyResolver::new(
                source,
                &self.config.game_version,
                &self.config.loader,
                self.config.max_depth,
                self.cancel.clone(),
            );
            let touched = resolver.resolve(&root, state).await;
            entry.required_deps = touched.required;
            entry.optional_deps = touched.optional;
        }
        debug!(
            target: "curator::engine",
            resolved = state.resolved_required.len(),
            edge_fetches = state.edge_fetches,
            fetch_failures = state.fetch_failures,
            "dependency resolution finished"
        );
    }

    /// Give every resolved required dependency a curated entry. Entries
    /// already surfaced by the scan are flagged as confirmed; the rest are
    /// materialized from project metadata, bypassing the library filter
    /// (a required library must be installable).
    async fn materialize_required(&self, mods: &mut Vec<CuratedMod>, state: &ResolutionState) {
        for (dep_id, resolved) in &state.resolved_required {
            if let Some(existing) = mods.iter_mut().find(|m| m.has_id(dep_id)) {
                existing.origin = existing.origin.confirmed();
                continue;
            }

            let source = match self.sources.get(resolved.source) {
                Some(s) => s,
                None => continue,
            };
            let summary = match source.project_summary(dep_id).await {
                Ok(s) => s,
                Err(e) => {
                    // keep the dependency in the list; id doubles as name
                    warn!(
                        target: "curator::engine",
                        id = %dep_id,
                        error = %e,
                        "could not fetch metadata for required dependency"
                    );
                    crate::curator::models::ProjectSummary {
                        id: dep_id.clone(),
                        title: None,
                        downloads: 0,
                        description: String::new(),
                    }
                }
            };

            let name = summary.title.unwrap_or_else(|| summary.id.clone());
            // the scan may know this mod under a different id but the same
            // title; fold into that entry instead of duplicating it
            if let Some(existing) = mods
                .iter_mut()
                .find(|m| merge_key(&m.name) == merge_key(&name))
            {
                existing
                    .ids
                    .entry(resolved.source)
                    .or_insert_with(|| summary.id.clone());
                existing.origin = existing.origin.confirmed();
                continue;
            }

            let mut entry = CuratedMod {
                ids: Default::default(),
                name,
                downloads: summary.downloads,
                description: summary.description,
                origin: OriginFlag::RequiredDependency,
                required_deps: Default::default(),
                optional_deps: Default::default(),
            };
            entry.ids.insert(resolved.source, summary.id);
            debug!(
                target: "curator::engine",
                id = %dep_id,
                depth = resolved.depth,
                "materialized required dependency"
            );
            mods.push(entry);
        }
    }

    /// Download every curated entry's best artifact into `dest`
    pub async fn download(
        &self,
        mods: &[CuratedMod],
        dest: &Path,
        max_artifact_mb: u64,
        concurrency: usize,
    ) -> std::io::Result<Vec<DownloadOutcome>> {
        let items: Vec<DownloadItem> = mods
            .iter()
            .filter_map(|m| {
                m.primary_id().map(|(kind, id)| DownloadItem {
                    id: id.to_string(),
                    name: m.name.clone(),
                    source: kind,
                })
            })
            .collect();

        let downloader = Downloader::new(
            self.sources.clone(),
            Arc::new(HttpArtifactFetcher::default()),
            concurrency,
            self.cancel.clone(),
        );
        downloader
            .download(
                items,
                &self.config.game_version,
                &self.config.loader,
                dest,
                max_artifact_mb,
            )
            .await
    }
}

/// Walk one source's paginated top-downloads listing until `scan_size`
/// candidates, a short page, a failed fetch, or cancellation. A failed
/// fetch ends the scan as if the catalog were exhausted; the pages already
/// returned stay in the result.
async fn scan_source(
    source: Arc<dyn CatalogSource>,
    version: &str,
    loader: &str,
    scan_size: usize,
    page_size: usize,
    cancel: CancelFlag,
) -> (Vec<CatalogRecord>, Option<SourceError>) {
    let mut records = Vec::new();
    let mut offset = 0;

    while records.len() < scan_size && !cancel.is_cancelled() {
        let limit = page_size.min(scan_size - records.len());
        let page = match source
            .search(version, loader, PageWindow::new(offset, limit))
            .await
        {
            Ok(page) => page,
            Err(e) => return (records, Some(e)),
        };
        let got = page.len();
        debug!(
            target: "curator::engine",
            source = source.name(),
            offset,
            got,
            "scanned page"
        );
        records.extend(page);
        if got < limit {
            break; // catalog exhausted
        }
        offset += got;
    }
    (records, None)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scan_size_is_capped() {
        let mut config = CurationConfig::new("1.21.1", "fabric");
        assert_eq!(config.scan_size(), 500);

        config.limit = 20;
        assert_eq!(config.scan_size(), 100);

        config.scan_multiplier = 100;
        assert_eq!(config.scan_size(), 500);
    }

    #[test]
    fn cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
