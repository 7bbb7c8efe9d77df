// Batch artifact download
//
// Resolves the best-matching artifact per identity, enforces the size
// ceiling, and writes into the distribution directory. Partial-failure
// tolerant: one bad artifact never aborts the batch; callers get a
// per-item outcome list in input order. Fetches run on a bounded worker
// pool and stop being issued once the run is cancelled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::engine::CancelFlag;
use super::errors::{DownloadFailure, SourceError};
use super::models::SourceKind;
use crate::sources::SourceSet;

/// One identity to download, with the catalog that should serve it
#[derive(Debug, Clone)]
pub struct DownloadItem {
    pub id: String,
    pub name: String,
    pub source: SourceKind,
}

#[derive(Debug, Clone)]
pub enum DownloadStatus {
    Downloaded { path: PathBuf, bytes: u64 },
    Failed(DownloadFailure),
    /// Cancelled before the fetch was issued; nothing was written
    Skipped,
}

impl DownloadStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub id: String,
    pub name: String,
    pub status: DownloadStatus,
}

/// Raw artifact fetch failure
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("artifact exceeds the {limit} byte ceiling")]
    TooLarge { limit: u64 },

    #[error("{0}")]
    Failed(String),
}

/// Seam between artifact resolution and the actual byte transfer, so the
/// batch logic is testable without a network.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch `url`, failing once more than `max_bytes` arrive
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, FetchError>;
}

/// Streaming reqwest fetcher with an in-flight byte cap
pub struct HttpArtifactFetcher {
    client: reqwest::Client,
}

impl HttpArtifactFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpArtifactFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Failed(e.to_string()))?;

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max_bytes {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
        }
        Ok(body)
    }
}

/// Downloads a selection plus its resolved required closure
pub struct Downloader {
    sources: SourceSet,
    fetcher: Arc<dyn ArtifactFetcher>,
    concurrency: usize,
    cancel: CancelFlag,
}

impl Downloader {
    pub fn new(
        sources: SourceSet,
        fetcher: Arc<dyn ArtifactFetcher>,
        concurrency: usize,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            sources,
            fetcher,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Download every item into `dest`, rejecting artifacts over
    /// `max_artifact_mb`. Returns one outcome per item, in input order.
    pub async fn download(
        &self,
        items: Vec<DownloadItem>,
        version: &str,
        loader: &str,
        dest: &Path,
        max_artifact_mb: u64,
    ) -> std::io::Result<Vec<DownloadOutcome>> {
        tokio::fs::create_dir_all(dest).await?;
        let limit_bytes = max_artifact_mb.saturating_mul(1024 * 1024);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, DownloadOutcome)> = JoinSet::new();

        for (idx, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let sources = self.sources.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let cancel = self.cancel.clone();
            let version = version.to_string();
            let loader = loader.to_string();
            let dest = dest.to_path_buf();

            tasks.spawn(async move {
                // permits bound the in-flight fetch count
                let _permit = semaphore.acquire_owned().await.ok();
                let status = if cancel.is_cancelled() {
                    DownloadStatus::Skipped
                } else {
                    fetch_one(&sources, fetcher.as_ref(), &item, &version, &loader, &dest, limit_bytes)
                        .await
                };
                let outcome = DownloadOutcome {
                    id: item.id,
                    name: item.name,
                    status,
                };
                (idx, outcome)
            });
        }

        let mut outcomes: Vec<(usize, DownloadOutcome)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => outcomes.push(pair),
                Err(e) => warn!(target: "curator::download", error = %e, "download task panicked"),
            }
        }
        outcomes.sort_by_key(|(idx, _)| *idx);

        let ok = outcomes.iter().filter(|(_, o)| o.status.is_success()).count();
        info!(
            target: "curator::download",
            succeeded = ok,
            total = outcomes.len(),
            dest = %dest.display(),
            "download batch finished"
        );
        Ok(outcomes.into_iter().map(|(_, o)| o).collect())
    }
}

async fn fetch_one(
    sources: &SourceSet,
    fetcher: &dyn ArtifactFetcher,
    item: &DownloadItem,
    version: &str,
    loader: &str,
    dest: &Path,
    limit_bytes: u64,
) -> DownloadStatus {
    let source = match sources.get(item.source) {
        Some(s) => s,
        None => {
            return DownloadStatus::Failed(DownloadFailure::ArtifactFetchFailed(format!(
                "no {} source configured",
                item.source
            )))
        }
    };

    let artifact = match source.best_artifact(&item.id, version, loader).await {
        Ok(a) => a,
        Err(SourceError::NotFound(_)) => {
            return DownloadStatus::Failed(DownloadFailure::NoArtifact {
                catalog: item.source,
                id: item.id.clone(),
            })
        }
        Err(e) => {
            warn!(
                target: "curator::download",
                id = %item.id,
                error = %e,
                "artifact resolution failed"
            );
            return DownloadStatus::Failed(DownloadFailure::ArtifactFetchFailed(e.to_string()));
        }
    };

    // reject on declared size before spending any bandwidth
    if let Some(size) = artifact.size {
        if size > limit_bytes {
            warn!(
                target: "curator::download",
                id = %item.id,
                size,
                limit = limit_bytes,
                "artifact over size ceiling, rejected"
            );
            return DownloadStatus::Failed(DownloadFailure::ArtifactTooLarge {
                size,
                limit: limit_bytes,
            });
        }
    }

    let body = match fetcher.fetch(&artifact.url, limit_bytes).await {
        Ok(b) => b,
        Err(FetchError::TooLarge { limit }) => {
            return DownloadStatus::Failed(DownloadFailure::ArtifactTooLarge {
                size: artifact.size.unwrap_or(limit + 1),
                limit,
            })
        }
        Err(FetchError::Failed(detail)) => {
            return DownloadStatus::Failed(DownloadFailure::ArtifactFetchFailed(detail))
        }
    };

    let final_path = dest.join(&artifact.filename);
    let tmp_path = dest.join(format!("{}.part", artifact.filename));
    let bytes = body.len() as u64;
    if let Err(e) = tokio::fs::write(&tmp_path, body).await {
        return DownloadStatus::Failed(DownloadFailure::ArtifactFetchFailed(e.to_string()));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
        return DownloadStatus::Failed(DownloadFailure::ArtifactFetchFailed(e.to_string()));
    }

    info!(
        target: "curator::download",
        id = %item.id,
        file = %artifact.filename,
        bytes,
        "downloaded"
    );
    DownloadStatus::Downloaded {
        path: final_path,
        bytes,
    }
}
