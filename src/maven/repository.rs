use crate::config::RepositorySpec;
use crate::error::{RepositoryError, Result, UpdateError};
use crate::repository::{ModuleCoordinate, RepositoryClient};
use async_trait::async_trait;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
pub const GOOGLE_MAVEN: &str = "https://dl.google.com/dl/android/maven2";
pub const GRADLE_PLUGIN_PORTAL: &str = "https://plugins.gradle.org/m2";
const MAX_METADATA_BYTES: usize = 10 * 1024 * 1024;

/// Maven-layout repository answering through `maven-metadata.xml`.
pub struct MavenRepository {
    client: Client,
    name: String,
    base_url: String,
    group_filters: Vec<Regex>,
    plugin_markers_only: bool,
    credentials: Option<(String, String)>,
}

impl MavenRepository {
    pub fn new(spec: &RepositorySpec, timeout: Duration) -> Result<Self> {
        Self::validate_repository_url(&spec.url)?;

        let group_filters = spec
            .group_filters
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    UpdateError::Config(format!(
                        "Invalid group filter '{pattern}' for repository '{}': {e}",
                        spec.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client: Self::build_client(timeout)?,
            name: spec.name.clone(),
            base_url: spec.url.trim_end_matches('/').to_string(),
            group_filters,
            plugin_markers_only: spec.plugin_markers_only,
            credentials: spec
                .credentials
                .as_ref()
                .map(|c| (c.username.clone(), c.password.clone())),
        })
    }

    fn metadata_url(&self, coordinate: &ModuleCoordinate) -> String {
        format!(
            "{}/{}/{}/maven-metadata.xml",
            self.base_url,
            coordinate.group.replace('.', "/"),
            coordinate.artifact
        )
    }

    fn build_client(timeout: Duration) -> Result<Client> {
        Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catalog-updater/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpdateError::Config(format!("Cannot build HTTP client: {e}")))
    }

    fn validate_repository_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|_| UpdateError::Config(format!("Invalid repository URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => Ok(()),
            scheme => Err(UpdateError::Config(format!(
                "Unsupported repository scheme: {scheme}"
            ))),
        }
    }

    fn parse_metadata(text: &str) -> std::result::Result<Vec<String>, RepositoryError> {
        let metadata: MavenMetadata =
            from_str(text).map_err(|e| RepositoryError::Metadata(e.to_string()))?;

        Ok(metadata
            .versioning
            .and_then(|v| v.versions)
            .map(|v| v.version)
            .unwrap_or_default())
    }
}

#[async_trait]
impl RepositoryClient for MavenRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn serves(&self, coordinate: &ModuleCoordinate) -> bool {
        if self.plugin_markers_only && !coordinate.is_plugin_marker() {
            return false;
        }
        self.group_filters.is_empty()
            || self
                .group_filters
                .iter()
                .any(|filter| filter.is_match(&coordinate.group))
    }

    async fn fetch_available_versions(
        &self,
        coordinate: &ModuleCoordinate,
    ) -> std::result::Result<Vec<String>, RepositoryError> {
        let url = self.metadata_url(coordinate);
        debug!(repository = %self.name, %url, "fetching maven metadata");

        let mut request = self.client.get(&url);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(RepositoryError::NotFound),
            status if !status.is_success() => {
                return Err(RepositoryError::Status(status.as_u16()));
            }
            _ => {}
        }

        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_METADATA_BYTES)
        {
            return Err(RepositoryError::TooLarge(MAX_METADATA_BYTES));
        }

        let text = response.text().await?;
        if text.len() > MAX_METADATA_BYTES {
            return Err(RepositoryError::TooLarge(MAX_METADATA_BYTES));
        }

        Self::parse_metadata(&text)
    }
}

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize)]
struct Versioning {
    versions: Option<Versions>,
}

#[derive(Debug, Deserialize)]
struct Versions {
    #[serde(default)]
    version: Vec<String>,
}
