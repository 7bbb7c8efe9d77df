// Scraped web catalog adapter
//
// The second catalog has no API; its listing, relations, and files pages
// are served as HTML behind an anti-bot gate. Page retrieval goes through
// an injected BrowserSession so the browser mechanics stay out of this
// crate; extraction is regex over the rendered DOM text. A served
// challenge page maps to SourceError::ChallengePage and is never solved
// here.

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::curator::errors::SourceError;
use crate::curator::models::{
    ArtifactRef, CatalogRecord, DependencyEdge, DependencyKind, PageWindow, ProjectSummary,
    SourceKind,
};
use crate::sources::CatalogSource;

/// Markers that identify an anti-bot interstitial instead of content
const CHALLENGE_MARKERS: &[&str] = &[
    "Just a moment",
    "cf-chl",
    "challenge-platform",
    "Verify you are human",
    "Attention Required",
];

lazy_static! {
    static ref CARD_RE: Regex = Regex::new(
        r#"(?s)<article[^>]*class="[^"]*project-card[^"]*"[^>]*data-id="([^"]+)"[^>]*data-downloads="(\d+)"[^>]*>(.*?)</article>"#
    )
    .unwrap();
    static ref TITLE_RE: Regex =
        Regex::new(r#"(?s)<h[12][^>]*class="[^"]*title[^"]*"[^>]*>\s*([^<]*?)\s*</h[12]>"#)
            .unwrap();
    static ref SUMMARY_RE: Regex =
        Regex::new(r#"(?s)<p[^>]*class="[^"]*summary[^"]*"[^>]*>\s*([^<]*?)\s*</p>"#).unwrap();
    static ref RELATION_RE: Regex = Regex::new(
        r#"<li[^>]*class="[^"]*relation[^"]*"[^>]*data-relation="(required|optional)"[^>]*data-id="([^"]+)""#
    )
    .unwrap();
    static ref FILE_ROW_RE: Regex = Regex::new(
        r#"<tr[^>]*class="[^"]*file-row[^"]*"[^>]*data-loader="([^"]*)"[^>]*data-versions="([^"]*)"[^>]*data-url="([^"]+)"[^>]*data-filename="([^"]+)"(?:[^>]*data-size="(\d+)")?"#
    )
    .unwrap();
    static ref PAGE_DOWNLOADS_RE: Regex = Regex::new(r#"data-downloads="(\d+)""#).unwrap();
}

/// Page retrieval collaborator. The production implementation drives a real
/// browser; tests and degraded runs use [`PlainHttpSession`].
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Fetch one URL and return the rendered page HTML
    async fn get_page(&self, url: &str) -> Result<String, SourceError>;
}

/// Plain reqwest session. Works only while the catalog is not actively
/// challenging; challenge pages still come back as HTML and are detected
/// downstream.
pub struct PlainHttpSession {
    client: reqwest::Client,
}

impl PlainHttpSession {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BrowserSession for PlainHttpSession {
    async fn get_page(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

pub struct ScrapedCatalogSource {
    session: Arc<dyn BrowserSession>,
    base_url: String,
}

impl ScrapedCatalogSource {
    pub fn new(session: Arc<dyn BrowserSession>, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into(),
        }
    }

    /// Fetch one page, rejecting anti-bot interstitials
    async fn fetch(&self, url: &str) -> Result<String, SourceError> {
        let html = self.session.get_page(url).await?;
        if is_challenge_page(&html) {
            debug!(target: "sources::scraped", url, "challenge page served");
            return Err(SourceError::ChallengePage);
        }
        Ok(html)
    }
}

pub(crate) fn is_challenge_page(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|m| html.contains(m))
}

#[async_trait]
impl CatalogSource for ScrapedCatalogSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Scraped
    }

    fn name(&self) -> &'static str {
        "scraped-catalog"
    }

    async fn search(
        &self,
        version: &str,
        loader: &str,
        window: PageWindow,
    ) -> Result<Vec<CatalogRecord>, SourceError> {
        let url = format!(
            "{}/mods?version={}&loader={}&sort=downloads&offset={}&limit={}",
            self.base_url, version, loader, window.offset, window.limit
        );
        let html = self.fetch(&url).await?;
        Ok(extract_search_records(&html))
    }

    async fn dependency_edges(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<Vec<DependencyEdge>, SourceError> {
        let url = format!(
            "{}/mod/{}/relations?version={}&loader={}",
            self.base_url, id, version, loader
        );
        let html = self.fetch(&url).await?;
        Ok(RELATION_RE
            .captures_iter(&html)
            .map(|cap| DependencyEdge {
                from: id.to_string(),
                to: cap[2].to_string(),
                kind: match &cap[1] {
                    "required" => DependencyKind::Required,
                    _ => DependencyKind::Optional,
                },
                source: SourceKind::Scraped,
            })
            .collect())
    }

    async fn project_summary(&self, id: &str) -> Result<ProjectSummary, SourceError> {
        let url = format!("{}/mod/{}", self.base_url, id);
        let html = self.fetch(&url).await?;

        let title = TITLE_RE
            .captures(&html)
            .map(|cap| cap[1].trim().to_string())
            .filter(|t| !t.is_empty());
        let downloads = PAGE_DOWNLOADS_RE
            .captures(&html)
            .and_then(|cap| cap[1].parse().ok())
            .unwrap_or(0);
        let description = SUMMARY_RE
            .captures(&html)
            .map(|cap| cap[1].trim().to_string())
            .unwrap_or_default();

        Ok(ProjectSummary {
            id: id.to_string(),
            title,
            downloads,
            description,
        })
    }

    async fn best_artifact(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<ArtifactRef, SourceError> {
        let url = format!("{}/mod/{}/files", self.base_url, id);
        let html = self.fetch(&url).await?;
        let rows = extract_file_rows(&html);
        choose_file_row(&rows, version, loader)
            .map(|row| ArtifactRef {
                url: row.url.clone(),
                filename: row.filename.clone(),
                size: row.size,
            })
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}

fn extract_search_records(html: &str) -> Vec<CatalogRecord> {
    CARD_RE
        .captures_iter(html)
        .map(|cap| {
            let inner = &cap[3];
            let title = TITLE_RE
                .captures(inner)
                .map(|t| t[1].trim().to_string())
                .filter(|t| !t.is_empty());
            let description = SUMMARY_RE
                .captures(inner)
                .map(|s| s[1].trim().to_string())
                .unwrap_or_default();
            CatalogRecord {
                source_id: cap[1].to_string(),
                title,
                downloads: cap[2].parse().unwrap_or(0),
                description,
                source: SourceKind::Scraped,
            }
        })
        .collect()
}

/// One row of the files table, newest first as rendered
#[derive(Debug, Clone, PartialEq)]
struct FileRow {
    loader: String,
    versions: Vec<String>,
    url: String,
    filename: String,
    size: Option<u64>,
}

fn extract_file_rows(html: &str) -> Vec<FileRow> {
    FILE_ROW_RE
        .captures_iter(html)
        .map(|cap| FileRow {
            loader: cap[1].to_string(),
            versions: cap[2].split_whitespace().map(str::to_string).collect(),
            url: cap[3].to_string(),
            filename: cap[4].to_string(),
            size: cap.get(5).and_then(|m| m.as_str().parse().ok()),
        })
        .collect()
}

/// Best-match over the files table: loader+version row, then any row for
/// the version, then the newest row at all.
fn choose_file_row<'a>(rows: &'a [FileRow], version: &str, loader: &str) -> Option<&'a FileRow> {
    rows.iter()
        .find(|r| r.loader == loader && r.versions.iter().any(|v| v == version))
        .or_else(|| rows.iter().find(|r| r.versions.iter().any(|v| v == version)))
        .or_else(|| rows.first())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SEARCH_PAGE: &str = r#"
        <main>
          <article class="project-card" data-id="sodium" data-downloads="41000000">
            <h2 class="title"> Sodium </h2>
            <p class="summary">A modern rendering engine</p>
          </article>
          <article class="project-card" data-id="mystery-mod" data-downloads="123">
            <p class="summary">no title on this card</p>
          </article>
        </main>"#;

    #[test]
    fn extracts_search_cards() {
        let records = extract_search_records(SEARCH_PAGE);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_id, "sodium");
        assert_eq!(records[0].title.as_deref(), Some("Sodium"));
        assert_eq!(records[0].downloads, 41_000_000);
        assert_eq!(records[0].description, "A modern rendering engine");
        assert!(records[1].title.is_none());
    }

    #[test]
    fn challenge_markers_are_detected() {
        assert!(is_challenge_page(
            "<html><title>Just a moment...</title></html>"
        ));
        assert!(is_challenge_page(
            r#"<div id="challenge-platform"></div>"#
        ));
        assert!(!is_challenge_page(SEARCH_PAGE));
    }

    #[test]
    fn extracts_relation_rows() {
        let html = r#"
            <ul>
              <li class="relation" data-relation="required" data-id="fabric-api"></li>
              <li class="relation" data-relation="optional" data-id="modmenu"></li>
            </ul>"#;

        let caps: Vec<_> = RELATION_RE
            .captures_iter(html)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();

        assert_eq!(
            caps,
            vec![
                ("required".to_string(), "fabric-api".to_string()),
                ("optional".to_string(), "modmenu".to_string()),
            ]
        );
    }

    const FILES_PAGE: &str = r#"
        <table>
          <tr class="file-row" data-loader="neoforge" data-versions="1.21.3"
              data-url="u://n-new" data-filename="mod-neo-new.jar" data-size="2048"></tr>
          <tr class="file-row" data-loader="fabric" data-versions="1.21.1 1.21.2"
              data-url="u://f-121" data-filename="mod-fabric.jar" data-size="1024"></tr>
          <tr class="file-row" data-loader="neoforge" data-versions="1.21.1"
              data-url="u://n-121" data-filename="mod-neo.jar"></tr>
        </table>"#;

    #[test]
    fn file_pick_prefers_loader_and_version() {
        let rows = extract_file_rows(FILES_PAGE);

        let row = choose_file_row(&rows, "1.21.1", "fabric").unwrap();

        assert_eq!(row.filename, "mod-fabric.jar");
        assert_eq!(row.size, Some(1024));
    }

    #[test]
    fn file_pick_falls_back_to_version_only_then_newest() {
        let rows = extract_file_rows(FILES_PAGE);

        // no forge build at all; the 1.21.1 fabric row is newest for the version
        let by_version = choose_file_row(&rows, "1.21.1", "forge").unwrap();
        assert_eq!(by_version.filename, "mod-fabric.jar");

        // version nobody built for; newest row wins
        let newest = choose_file_row(&rows, "1.19.2", "forge").unwrap();
        assert_eq!(newest.filename, "mod-neo-new.jar");
    }

    #[test]
    fn missing_size_attribute_is_none() {
        let rows = extract_file_rows(FILES_PAGE);
        assert_eq!(rows[2].size, None);
    }
}
