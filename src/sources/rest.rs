// Structured REST catalog adapter
//
// Speaks a Modrinth-shaped JSON API: a paginated search endpoint ordered by
// downloads, a per-project version list carrying dependency edges and
// downloadable files, and a project metadata endpoint. Version selection
// degrades in three steps: a server-filtered loader+version query, then a
// version-only query, then the full list with a local best-match pick.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::curator::errors::SourceError;
use crate::curator::models::{
    ArtifactRef, CatalogRecord, DependencyEdge, DependencyKind, PageWindow, ProjectSummary,
    SourceKind,
};
use crate::sources::CatalogSource;

const DEFAULT_BASE_URL: &str = "https://api.modrinth.com/v2";

pub struct RestCatalogSource {
    client: reqwest::Client,
    base_url: String,
}

impl RestCatalogSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API root (tests, mirrors)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
        id_for_404: &str,
    ) -> Result<T, SourceError> {
        let response = self.client.get(url).query(query).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(id_for_404.to_string()));
        }
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Version list for a project, optionally server-filtered
    async fn versions(
        &self,
        id: &str,
        loader: Option<&str>,
        game_version: Option<&str>,
    ) -> Result<Vec<VersionDoc>, SourceError> {
        let url = format!("{}/project/{}/version", self.base_url, id);
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(loader) = loader {
            query.push(("loaders", format!("[\"{}\"]", loader)));
        }
        if let Some(version) = game_version {
            query.push(("game_versions", format!("[\"{}\"]", version)));
        }
        self.get_json(&url, &query, id).await
    }

    /// Three-step fallback for the best-matching version document
    async fn best_version(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<VersionDoc, SourceError> {
        let exact = self.versions(id, Some(loader), Some(version)).await?;
        if let Some(doc) = exact.into_iter().next() {
            return Ok(doc);
        }

        debug!(
            target: "sources::rest",
            id,
            loader,
            "no exact loader match, retrying version-only"
        );
        let by_version = self.versions(id, None, Some(version)).await?;
        if let Some(doc) = by_version.into_iter().next() {
            return Ok(doc);
        }

        debug!(target: "sources::rest", id, version, "no version match, using full list");
        let all = self.versions(id, None, None).await?;
        choose_version(all, version).ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl CatalogSource for RestCatalogSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Rest
    }

    fn name(&self) -> &'static str {
        "rest-catalog"
    }

    async fn search(
        &self,
        version: &str,
        loader: &str,
        window: PageWindow,
    ) -> Result<Vec<CatalogRecord>, SourceError> {
        let url = format!("{}/search", self.base_url);
        let facets = format!("[[\"game_versions:{}\"],[\"loaders:{}\"]]", version, loader);
        let query = [
            ("query", String::new()),
            ("facets", facets),
            ("index", "downloads".to_string()),
            ("limit", window.limit.to_string()),
            ("offset", window.offset.to_string()),
        ];

        let response: SearchResponse = self.get_json(&url, &query, "search").await?;
        Ok(response
            .hits
            .into_iter()
            .map(|hit| CatalogRecord {
                source_id: hit.project_id,
                title: hit.title,
                downloads: hit.downloads,
                description: hit.description,
                source: SourceKind::Rest,
            })
            .collect())
    }

    async fn dependency_edges(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<Vec<DependencyEdge>, SourceError> {
        let doc = self.best_version(id, version, loader).await?;
        Ok(doc
            .dependencies
            .into_iter()
            .filter_map(|dep| {
                let kind = match dep.dependency_type.as_str() {
                    "required" => DependencyKind::Required,
                    "optional" => DependencyKind::Optional,
                    // embedded and incompatible relations are not install edges
                    _ => return None,
                };
                let to = dep.project_id?;
                Some(DependencyEdge {
                    from: id.to_string(),
                    to,
                    kind,
                    source: SourceKind::Rest,
                })
            })
            .collect())
    }

    async fn project_summary(&self, id: &str) -> Result<ProjectSummary, SourceError> {
        let url = format!("{}/project/{}", self.base_url, id);
        let doc: ProjectDoc = self.get_json(&url, &[], id).await?;
        Ok(ProjectSummary {
            id: doc.id,
            title: doc.title,
            downloads: doc.downloads,
            description: doc.description,
        })
    }

    async fn best_artifact(
        &self,
        id: &str,
        version: &str,
        loader: &str,
    ) -> Result<ArtifactRef, SourceError> {
        let doc = self.best_version(id, version, loader).await?;
        let file = doc
            .files
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        Ok(ArtifactRef {
            url: file.url,
            filename: file.filename,
            size: file.size,
        })
    }
}

/// Local pick over an unfiltered version list, assumed newest-first: the
/// most recent version containing the target, else the most recent at all.
fn choose_version(versions: Vec<VersionDoc>, game_version: &str) -> Option<VersionDoc> {
    if let Some(idx) = versions
        .iter()
        .position(|v| v.game_versions.iter().any(|g| g == game_version))
    {
        return versions.into_iter().nth(idx);
    }
    versions.into_iter().next()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    project_id: String,
    title: Option<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ProjectDoc {
    id: String,
    title: Option<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VersionDoc {
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    dependencies: Vec<DependencyDoc>,
    #[serde(default)]
    files: Vec<FileDoc>,
}

#[derive(Debug, Deserialize)]
struct DependencyDoc {
    project_id: Option<String>,
    dependency_type: String,
}

#[derive(Debug, Deserialize)]
struct FileDoc {
    url: String,
    filename: String,
    size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn version_doc(json: &str) -> VersionDoc {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn search_response_parses_into_records() {
        let body = r#"{
            "hits": [
                {"project_id": "AANobbMI", "title": "Sodium", "downloads": 40000000,
                 "description": "A modern rendering engine"},
                {"project_id": "gvQqBUqZ", "title": null, "downloads": 100}
            ]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.hits.len(), 2);
        assert_eq!(parsed.hits[0].project_id, "AANobbMI");
        assert_eq!(parsed.hits[0].downloads, 40_000_000);
        assert!(parsed.hits[1].title.is_none());
        assert_eq!(parsed.hits[1].description, "");
    }

    #[test]
    fn version_doc_carries_dependencies_and_files() {
        let doc = version_doc(
            r#"{
                "game_versions": ["1.21.1"],
                "dependencies": [
                    {"project_id": "P7dR8mSH", "dependency_type": "required"},
                    {"project_id": "mOgUt4GM", "dependency_type": "optional"},
                    {"project_id": null, "dependency_type": "required"},
                    {"project_id": "xxxx", "dependency_type": "incompatible"}
                ],
                "files": [
                    {"url": "https://cdn.example/sodium.jar",
                     "filename": "sodium-0.6.jar", "size": 1048576}
                ]
            }"#,
        );

        assert_eq!(doc.dependencies.len(), 4);
        assert_eq!(doc.files[0].filename, "sodium-0.6.jar");
        assert_eq!(doc.files[0].size, Some(1_048_576));
    }

    #[test]
    fn choose_version_prefers_matching_game_version() {
        let versions = vec![
            version_doc(r#"{"game_versions": ["1.21.3"]}"#),
            version_doc(r#"{"game_versions": ["1.21.1", "1.21.2"]}"#),
            version_doc(r#"{"game_versions": ["1.20.4"]}"#),
        ];

        let chosen = choose_version(versions, "1.21.1").unwrap();

        assert_eq!(chosen.game_versions, vec!["1.21.1", "1.21.2"]);
    }

    #[test]
    fn choose_version_falls_back_to_most_recent() {
        let versions = vec![
            version_doc(r#"{"game_versions": ["1.21.3"]}"#),
            version_doc(r#"{"game_versions": ["1.20.4"]}"#),
        ];

        let chosen = choose_version(versions, "1.19.2").unwrap();

        assert_eq!(chosen.game_versions, vec!["1.21.3"]);
    }

    #[test]
    fn choose_version_on_empty_list_is_none() {
        assert!(choose_version(Vec::new(), "1.21.1").is_none());
    }
}
