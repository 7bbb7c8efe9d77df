// Bounded-depth dependency resolution
//
// Walks required edges transitively up to a depth bound; optional edges are
// recorded for the interop audit and never traversed. Catalog dependency
// graphs are not guaranteed acyclic, so on top of the depth bound every
// identity is marked while its subtree is expanding (gray) and skipped on
// re-entry, and an identity already resolved is never expanded again.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use super::engine::CancelFlag;
use super::models::{AuditEntry, DependencyKind, SourceKind};
use crate::sources::CatalogSource;

pub const DEFAULT_MAX_DEPTH: u8 = 3;

/// A required dependency in the resolved closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDep {
    /// Distance from the nearest top-level selection, 1-based.
    /// Never exceeds the run's max depth.
    pub depth: u8,
    /// Catalog that reported the edge; used to materialize metadata later
    pub source: SourceKind,
}

/// State owned by a single resolution run. No cross-run sharing.
#[derive(Debug, Default)]
pub struct ResolutionState {
    pub resolved_required: BTreeMap<String, ResolvedDep>,
    pub optional_audit: BTreeMap<String, AuditEntry>,
    in_progress: HashSet<String>,
    /// Dependency-edge fetches issued so far; bounded by the number of
    /// expanded identities
    pub edge_fetches: usize,
    /// Edge-list fetches that failed and were treated as leaves
    pub fetch_failures: usize,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one optional edge `from -> dependency`
    fn note_optional(&mut self, dependency: &str, from: &str) {
        self.optional_audit
            .entry(dependency.to_string())
            .or_insert_with(|| AuditEntry::new(dependency))
            .push_requester(from);
    }
}

/// What one root's traversal touched. `required` includes direct targets
/// that an earlier root already resolved (attribution stays correct even
/// though the shared subtree is not re-expanded).
#[derive(Debug, Default, Clone)]
pub struct RootResolution {
    pub required: BTreeSet<String>,
    pub optional: BTreeSet<String>,
}

/// Resolves the required-dependency closure for top-level selections, one
/// owning source per root.
pub struct DependencyResolver<'a> {
    source: &'a Arc<dyn CatalogSource>,
    version: &'a str,
    loader: &'a str,
    max_depth: u8,
    cancel: CancelFlag,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        source: &'a Arc<dyn CatalogSource>,
        version: &'a str,
        loader: &'a str,
        max_depth: u8,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            source,
            version,
            loader,
            max_depth,
            cancel,
        }
    }

    /// Resolve one top-level selection into the shared run state.
    pub async fn resolve(&self, root: &str, state: &mut ResolutionState) -> RootResolution {
        let mut touched = RootResolution::default();
        if state.resolved_required.contains_key(root) {
            // already part of an earlier root's closure; never re-expanded
            return touched;
        }
        self.expand(root.to_string(), 0, state, &mut touched).await;
        touched
    }

    /// Expand `id`'s edge list at `depth`. Children land at `depth + 1`.
    fn expand<'s>(
        &'s self,
        id: String,
        depth: u8,
        state: &'s mut ResolutionState,
        touched: &'s mut RootResolution,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 's>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return;
            }
            if !state.in_progress.insert(id.clone()) {
                // gray: a cycle led back into an identity mid-expansion
                debug!(target: "curator::resolver", id = %id, "cycle detected, skipping re-entry");
                return;
            }

            state.edge_fetches += 1;
            let edges = match self
                .source
                .dependency_edges(&id, self.version, self.loader)
                .await
            {
                Ok(edges) => edges,
                Err(e) => {
                    // conservative under-approximation: treat as a leaf
                    state.fetch_failures += 1;
                    warn!(
                        target: "curator::resolver",
                        source = %self.source.kind(),
                        id = %id,
                        error = %e,
                        "dependency fetch failed, treating as having no dependencies"
                    );
                    state.in_progress.remove(&id);
                    return;
                }
            };

            let child_depth = depth + 1;
            for edge in edges {
                match edge.kind {
                    DependencyKind::Optional => {
                        state.note_optional(&edge.to, &id);
                        touched.optional.insert(edge.to);
                    }
                    DependencyKind::Required => {
                        if child_depth > self.max_depth {
                            debug!(
                                target: "curator::resolver",
                                id = %edge.to,
                                "depth bound reached, not descending"
                            );
                            continue;
                        }
                        // attributed only inside the bound, so every id a
                        // mod lists is also in the resolved closure
                        touched.required.insert(edge.to.clone());
                        if state.resolved_required.contains_key(&edge.to)
                            || state.in_progress.contains(&edge.to)
                        {
                            continue;
                        }
                        state.resolved_required.insert(
                            edge.to.clone(),
                            ResolvedDep {
                                depth: child_depth,
                                source: edge.source,
                            },
                        );
                        self.expand(edge.to, child_depth, state, touched).await;
                    }
                }
            }

            state.in_progress.remove(&id);
        })
    }
}
