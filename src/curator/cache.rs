// Durable curation cache
//
// Persists the last curated result and optional-dependency audit, keyed by
// (platform version, loader), so the selection UI can reload without
// re-querying the catalogs. No TTL: staleness is the caller's problem.
// Writes go to a temp file in the same directory and are renamed into
// place, so a concurrent reader never observes a partial document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::errors::CuratorError;
use super::models::{AuditEntry, CuratedMod};

/// Curated-mod document as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCuration {
    pub generated_at: String,
    pub game_version: String,
    pub loader: String,
    pub mods: Vec<CuratedMod>,
}

/// File-backed curation cache. Inject one per engine; there is no ambient
/// global state.
#[derive(Debug, Clone)]
pub struct CurationCache {
    dir: PathBuf,
}

impl CurationCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the platform cache directory
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mod-curator")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn mods_path(&self, version: &str, loader: &str) -> PathBuf {
        self.dir
            .join(format!("curator_cache_{}_{}.json", version, loader))
    }

    fn audit_path(&self, version: &str, loader: &str) -> PathBuf {
        self.dir
            .join(format!("curator_optional_audit_{}_{}.json", version, loader))
    }

    /// Persist both artifacts for one (version, loader) key, overwriting
    /// any previous run's result for the same key.
    pub fn save(
        &self,
        version: &str,
        loader: &str,
        mods: &[CuratedMod],
        optional_audit: &BTreeMap<String, AuditEntry>,
    ) -> Result<(), CuratorError> {
        fs::create_dir_all(&self.dir)?;

        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown"));
        let doc = CachedCuration {
            generated_at,
            game_version: version.to_string(),
            loader: loader.to_string(),
            mods: mods.to_vec(),
        };

        write_atomic(&self.mods_path(version, loader), &doc)?;
        write_atomic(&self.audit_path(version, loader), optional_audit)?;

        info!(
            target: "curator::cache",
            mods = mods.len(),
            audited = optional_audit.len(),
            path = %self.mods_path(version, loader).display(),
            "curation cached"
        );
        Ok(())
    }

    /// Load both artifacts. A missing file is simply absent; an unreadable
    /// or unparsable file is corruption and fails the call.
    #[allow(clippy::type_complexity)]
    pub fn load(
        &self,
        version: &str,
        loader: &str,
    ) -> Result<(Option<CachedCuration>, Option<BTreeMap<String, AuditEntry>>), CuratorError> {
        let mods = read_optional(&self.mods_path(version, loader))?;
        let audit = read_optional(&self.audit_path(version, loader))?;
        Ok((mods, audit))
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CuratorError> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value).map_err(|e| CuratorError::CacheCorrupted {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    debug!(target: "curator::cache", path = %path.display(), "wrote cache file");
    Ok(())
}

fn read_optional<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, CuratorError> {
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(path)?;
    let value = serde_json::from_str(&body).map_err(|e| CuratorError::CacheCorrupted {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::curator::models::{CatalogRecord, SourceKind};

    fn sample_mods() -> Vec<CuratedMod> {
        vec![CuratedMod::from_record(CatalogRecord {
            source_id: "sodium".into(),
            title: Some("Sodium".into()),
            downloads: 1000,
            description: "rendering".into(),
            source: SourceKind::Rest,
        })]
    }

    fn sample_audit() -> BTreeMap<String, AuditEntry> {
        let mut entry = AuditEntry::new("modmenu");
        entry.push_requester("m1");
        entry.push_requester("m2");
        [("modmenu".to_string(), entry)].into_iter().collect()
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let cache = CurationCache::new(tmp.path());

        cache
            .save("1.21.1", "fabric", &sample_mods(), &sample_audit())
            .unwrap();
        let (mods, audit) = cache.load("1.21.1", "fabric").unwrap();

        let mods = mods.unwrap();
        assert_eq!(mods.game_version, "1.21.1");
        assert_eq!(mods.loader, "fabric");
        assert_eq!(mods.mods.len(), 1);
        assert_eq!(mods.mods[0].name, "Sodium");
        assert_eq!(audit.unwrap()["modmenu"].requested_by.len(), 2);
    }

    #[test]
    fn missing_key_loads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let cache = CurationCache::new(tmp.path());

        let (mods, audit) = cache.load("1.21.1", "neoforge").unwrap();

        assert!(mods.is_none());
        assert!(audit.is_none());
    }

    #[test]
    fn keys_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let cache = CurationCache::new(tmp.path());

        cache
            .save("1.21.1", "fabric", &sample_mods(), &BTreeMap::new())
            .unwrap();
        let (other, _) = cache.load("1.20.4", "fabric").unwrap();

        assert!(other.is_none());
    }

    #[test]
    fn corrupted_file_is_an_error_not_a_silent_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = CurationCache::new(tmp.path());
        fs::create_dir_all(tmp.path()).unwrap();
        fs::write(
            tmp.path().join("curator_cache_1.21.1_fabric.json"),
            b"{ not json",
        )
        .unwrap();

        let err = cache.load("1.21.1", "fabric").unwrap_err();
        assert!(matches!(err, CuratorError::CacheCorrupted { .. }));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let cache = CurationCache::new(tmp.path());

        cache
            .save("1.21.1", "fabric", &sample_mods(), &sample_audit())
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
