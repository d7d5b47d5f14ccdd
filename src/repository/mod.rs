use crate::error::{RepositoryError, Result, UpdateError};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod factory;
pub use factory::RepositoryFactory;

/// Module coordinate (`group:artifact`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleCoordinate {
    pub group: String,
    pub artifact: String,
}

impl ModuleCoordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    /// Marker artifact under which a Gradle plugin is published.
    pub fn plugin(plugin_id: impl Into<String>) -> Self {
        let id = plugin_id.into();
        Self {
            artifact: format!("{id}.gradle.plugin"),
            group: id,
        }
    }

    pub fn is_plugin_marker(&self) -> bool {
        self.artifact
            .strip_suffix(".gradle.plugin")
            .is_some_and(|id| id == self.group)
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for ModuleCoordinate {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split(':').collect::<Vec<_>>().as_slice() {
            [group, artifact] if !group.is_empty() && !artifact.is_empty() => {
                Ok(Self::new(*group, *artifact))
            }
            _ => Err(UpdateError::Config(format!(
                "Invalid module coordinate '{s}', expected group:artifact"
            ))),
        }
    }
}

/// A single package repository able to list published versions of a module.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this repository should be asked about `coordinate` at all.
    fn serves(&self, _coordinate: &ModuleCoordinate) -> bool {
        true
    }

    async fn fetch_available_versions(
        &self,
        coordinate: &ModuleCoordinate,
    ) -> std::result::Result<Vec<String>, RepositoryError>;
}

/// Configured repositories, queried together and merged in priority order.
#[derive(Clone)]
pub struct RepositoryGroup {
    repositories: Vec<Arc<dyn RepositoryClient>>,
    request_timeout: Duration,
}

impl RepositoryGroup {
    pub fn new(repositories: Vec<Arc<dyn RepositoryClient>>, request_timeout: Duration) -> Self {
        Self {
            repositories,
            request_timeout,
        }
    }

    /// Versions published for `coordinate` across every repository that
    /// answered. Order is priority order with duplicates removed; it carries
    /// no meaning beyond that.
    ///
    /// Fails with [`UpdateError::RepositoryUnavailable`] only when no
    /// repository produced an answer.
    pub async fn list_versions(&self, coordinate: &ModuleCoordinate) -> Result<Vec<String>> {
        let applicable: Vec<&Arc<dyn RepositoryClient>> = self
            .repositories
            .iter()
            .filter(|repo| repo.serves(coordinate))
            .collect();

        if applicable.is_empty() {
            return Err(UpdateError::RepositoryUnavailable {
                coordinate: coordinate.to_string(),
                details: "no configured repository serves this group".to_string(),
            });
        }

        let responses = join_all(applicable.iter().map(|repo| async move {
            let outcome = tokio::time::timeout(
                self.request_timeout,
                repo.fetch_available_versions(coordinate),
            )
            .await
            .unwrap_or_else(|_| Err(RepositoryError::Timeout(self.request_timeout)));
            (repo.name().to_string(), outcome)
        }))
        .await;

        let mut merged: Vec<String> = Vec::new();
        let mut failures = Vec::new();
        let mut answered = false;

        for (name, outcome) in responses {
            match outcome {
                Ok(versions) => {
                    debug!(repository = %name, %coordinate, count = versions.len(), "listed versions");
                    answered = true;
                    for version in versions {
                        if !merged.contains(&version) {
                            merged.push(version);
                        }
                    }
                }
                Err(e) => {
                    debug!(repository = %name, %coordinate, error = %e, "repository contributed nothing");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        if !answered {
            warn!(%coordinate, "every repository failed");
            return Err(UpdateError::RepositoryUnavailable {
                coordinate: coordinate.to_string(),
                details: failures.join("; "),
            });
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticRepository {
        name: &'static str,
        response: std::result::Result<Vec<&'static str>, ()>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RepositoryClient for StaticRepository {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_available_versions(
            &self,
            _coordinate: &ModuleCoordinate,
        ) -> std::result::Result<Vec<String>, RepositoryError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.response {
                Ok(versions) => Ok(versions.iter().map(|v| v.to_string()).collect()),
                Err(()) => Err(RepositoryError::Status(500)),
            }
        }
    }

    fn repo(
        name: &'static str,
        response: std::result::Result<Vec<&'static str>, ()>,
    ) -> Arc<dyn RepositoryClient> {
        Arc::new(StaticRepository {
            name,
            response,
            delay: None,
        })
    }

    fn guava() -> ModuleCoordinate {
        ModuleCoordinate::new("com.google.guava", "guava")
    }

    #[test]
    fn parses_coordinate() {
        let coordinate: ModuleCoordinate = "com.google.guava:guava".parse().unwrap();
        assert_eq!(coordinate, guava());
        assert!("guava".parse::<ModuleCoordinate>().is_err());
        assert!("a:b:c".parse::<ModuleCoordinate>().is_err());
    }

    #[test]
    fn plugin_coordinate_uses_marker_artifact() {
        let coordinate = ModuleCoordinate::plugin("org.jetbrains.kotlin.jvm");
        assert_eq!(
            coordinate.to_string(),
            "org.jetbrains.kotlin.jvm:org.jetbrains.kotlin.jvm.gradle.plugin"
        );
        assert!(coordinate.is_plugin_marker());
        assert!(!guava().is_plugin_marker());
    }

    #[tokio::test]
    async fn merges_answers_in_priority_order() {
        let group = RepositoryGroup::new(
            vec![
                repo("first", Ok(vec!["1.0", "1.1"])),
                repo("broken", Err(())),
                repo("second", Ok(vec!["1.1", "2.0"])),
            ],
            Duration::from_secs(5),
        );

        let versions = group.list_versions(&guava()).await.unwrap();
        assert_eq!(versions, vec!["1.0", "1.1", "2.0"]);
    }

    #[tokio::test]
    async fn unavailable_only_when_every_repository_fails() {
        let group = RepositoryGroup::new(
            vec![repo("a", Err(())), repo("b", Err(()))],
            Duration::from_secs(5),
        );

        let err = group.list_versions(&guava()).await.unwrap_err();
        assert!(matches!(err, UpdateError::RepositoryUnavailable { .. }));
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let slow: Arc<dyn RepositoryClient> = Arc::new(StaticRepository {
            name: "slow",
            response: Ok(vec!["9.9"]),
            delay: Some(Duration::from_secs(30)),
        });
        let group = RepositoryGroup::new(
            vec![slow, repo("fast", Ok(vec!["1.0"]))],
            Duration::from_millis(50),
        );

        let versions = group.list_versions(&guava()).await.unwrap();
        assert_eq!(versions, vec!["1.0"]);
    }
}
