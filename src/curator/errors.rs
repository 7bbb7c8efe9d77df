// Error taxonomy for the curation engine

use thiserror::Error;

use super::models::SourceKind;

/// Per-call failure from a catalog source. Recovered locally: the engine
/// logs it and treats the call as having returned nothing.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    /// The front end served an anti-bot challenge instead of content.
    /// Treated exactly like a transport failure; no challenge solving here.
    #[error("anti-bot challenge page served")]
    ChallengePage,

    #[error("project not found: {0}")]
    NotFound(String),
}

impl SourceError {
    /// Whether this failure means the whole source is likely down or
    /// blocking us, as opposed to one missing project
    pub fn is_unavailability(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::Status(status.as_u16());
        }
        if e.is_decode() {
            return Self::Parse(e.to_string());
        }
        Self::Transport(e.to_string())
    }
}

/// Run-level failure. Everything else degrades to per-item or per-call
/// reporting; only these abort a curation run.
#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("all catalog sources unavailable")]
    AllSourcesUnavailable,

    #[error("curation cache corrupted at {path}: {detail}")]
    CacheCorrupted { path: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why one item of a download batch did not produce an artifact. The batch
/// always continues past these.
#[derive(Debug, Clone, Error)]
pub enum DownloadFailure {
    #[error("artifact is {size} bytes, over the {limit} byte ceiling")]
    ArtifactTooLarge { size: u64, limit: u64 },

    #[error("artifact fetch failed: {0}")]
    ArtifactFetchFailed(String),

    #[error("no artifact available from {catalog} for {id}")]
    NoArtifact { catalog: SourceKind, id: String },
}
