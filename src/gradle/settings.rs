use crate::config::RepositorySpec;
use crate::error::{Result, UpdateError};
use crate::maven::repository::{GOOGLE_MAVEN, GRADLE_PLUGIN_PORTAL, MAVEN_CENTRAL};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Build scripts inspected for repository declarations, in priority order.
const BUILD_SCRIPTS: &[&str] = &[
    "settings.gradle.kts",
    "settings.gradle",
    "build.gradle.kts",
    "build.gradle",
];

/// Repositories declared by the Gradle build rooted at `project_dir`.
/// Returns an empty list when no build script declares any.
pub fn discover_repositories(project_dir: &Path) -> Result<Vec<RepositorySpec>> {
    let patterns = RepositoryPatterns::new()?;
    let mut repositories = Vec::new();

    for script in BUILD_SCRIPTS {
        let path = project_dir.join(script);
        if !path.is_file() {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        let found = patterns.extract(&content);
        debug!(script, count = found.len(), "repositories declared");
        repositories.extend(found);
    }

    Ok(deduplicate(repositories))
}

struct RepositoryPatterns {
    custom_urls: Vec<Regex>,
}

impl RepositoryPatterns {
    fn new() -> Result<Self> {
        let sources = [
            // Kotlin: maven { url = uri("...") } / maven("...")
            r#"maven\s*\{\s*url\s*=\s*uri\s*\(\s*["']([^"']+)["']\s*\)"#,
            r#"maven\s*\(\s*["']([^"']+)["']\s*\)"#,
            // Groovy: maven { url '...' } / maven { url = '...' }
            r#"maven\s*\{\s*url\s*=?\s*['"]([^'"]+)['"]"#,
        ];

        let custom_urls = sources
            .iter()
            .map(|source| {
                Regex::new(source).map_err(|e| UpdateError::Config(format!("Regex error: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { custom_urls })
    }

    fn extract(&self, content: &str) -> Vec<RepositorySpec> {
        let mut repositories = Vec::new();

        if content.contains("mavenCentral()") {
            repositories.push(RepositorySpec::new("Maven Central", MAVEN_CENTRAL));
        }

        if content.contains("google()") {
            repositories.push(RepositorySpec {
                group_filters: vec![
                    ".*google.*".to_string(),
                    ".*android.*".to_string(),
                    ".*androidx.*".to_string(),
                ],
                ..RepositorySpec::new("Google Maven", GOOGLE_MAVEN)
            });
        }

        if content.contains("gradlePluginPortal()") {
            repositories.push(RepositorySpec::new(
                "Gradle Plugin Portal",
                GRADLE_PLUGIN_PORTAL,
            ));
        }

        for pattern in &self.custom_urls {
            for capture in pattern.captures_iter(content) {
                if let Some(url) = capture.get(1) {
                    repositories.push(RepositorySpec::new(
                        format!("Custom ({})", shorten_url(url.as_str())),
                        url.as_str(),
                    ));
                }
            }
        }

        repositories
    }
}

/// Drops repeated URLs (ignoring a trailing slash), keeping the first.
fn deduplicate(repositories: Vec<RepositorySpec>) -> Vec<RepositorySpec> {
    let mut seen = HashSet::new();
    repositories
        .into_iter()
        .filter_map(|mut repo| {
            repo.url = repo.url.trim_end_matches('/').to_string();
            seen.insert(repo.url.clone()).then_some(repo)
        })
        .collect()
}

fn shorten_url(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}
