// Curation engine: merge, classification, dependency resolution, audit,
// cache, and batch downloads

pub mod audit;
pub mod cache;
pub mod classifier;
pub mod download;
pub mod engine;
pub mod errors;
pub mod merge;
pub mod models;
pub mod resolver;

pub use audit::AuditFinding;
pub use cache::{CachedCuration, CurationCache};
pub use download::{
    ArtifactFetcher, DownloadItem, DownloadOutcome, DownloadStatus, Downloader,
    HttpArtifactFetcher,
};
pub use engine::{CancelFlag, CurationConfig, CurationEngine, CurationOutcome};
pub use errors::{CuratorError, DownloadFailure, SourceError};
pub use models::{
    ArtifactRef, AuditEntry, CatalogRecord, CuratedMod, DependencyEdge, DependencyKind,
    OriginFlag, PageWindow, ProjectSummary, SourceKind,
};
pub use resolver::{DependencyResolver, ResolutionState};
