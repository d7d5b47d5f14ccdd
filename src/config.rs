//! Run configuration and its layered resolution.
//!
//! Every setting is looked up in order: explicit override (CLI), environment
//! variable, `gradle.properties` of the project, literal default.

use crate::error::{Result, UpdateError};
use crate::maven::repository::{GOOGLE_MAVEN, GRADLE_PLUGIN_PORTAL, MAVEN_CENTRAL};
use crate::repository::ModuleCoordinate;
use crate::utils::path_validator::PathValidator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REJECTED_QUALIFIERS: &[&str] =
    &["alpha", "beta", "rc", "cr", "m", "preview", "b", "ea"];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for concurrent lookups when no parallelism is configured.
pub const DEFAULT_MAX_PARALLELISM: usize = 8;

/// Opaque repository credentials, forwarded as HTTP basic auth.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub name: String,
    pub url: String,
    /// Regex patterns; when non-empty only matching groups are queried here.
    #[serde(default)]
    pub group_filters: Vec<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Only plugin marker artifacts (`id:id.gradle.plugin`) are queried here.
    #[serde(default)]
    pub plugin_markers_only: bool,
}

impl RepositorySpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            group_filters: Vec::new(),
            credentials: None,
            plugin_markers_only: false,
        }
    }

    /// The Gradle Plugin Portal, asked for plugin markers only.
    pub fn plugin_portal() -> Self {
        Self {
            plugin_markers_only: true,
            ..RepositorySpec::new("Gradle Plugin Portal", GRADLE_PLUGIN_PORTAL)
        }
    }

    pub fn defaults() -> Vec<RepositorySpec> {
        vec![
            RepositorySpec::new("Maven Central", MAVEN_CENTRAL),
            RepositorySpec {
                group_filters: vec![
                    ".*google.*".to_string(),
                    ".*android.*".to_string(),
                    ".*androidx.*".to_string(),
                ],
                ..RepositorySpec::new("Google Maven", GOOGLE_MAVEN)
            },
            RepositorySpec::plugin_portal(),
        ]
    }
}

/// What a malformed catalog does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogFailurePolicy {
    /// Record the failure and keep processing sibling catalogs.
    #[default]
    Continue,
    /// Abort the whole run before anything is written.
    Abort,
}

/// How entries sharing a version reference may differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferencePolicy {
    /// Every entry sharing a reference must name the same module.
    #[default]
    RequireSameModule,
    /// Different modules may share a reference; only versions published for
    /// all of them are candidates.
    AllowMixedModules,
}

#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub catalogs_directory: PathBuf,
    pub output_directory: PathBuf,
    /// Lower-cased qualifier labels.
    pub rejected_qualifiers: BTreeSet<String>,
    pub ignored_modules: BTreeSet<ModuleCoordinate>,
    pub allow_major_updates: bool,
    pub repositories: Vec<RepositorySpec>,
    pub parallelism: Option<usize>,
    pub request_timeout: Duration,
    pub catalog_failure_policy: CatalogFailurePolicy,
    pub reference_policy: ReferencePolicy,
    pub show_progress: bool,
}

impl UpdateConfig {
    pub fn new(catalogs_directory: impl Into<PathBuf>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            catalogs_directory: catalogs_directory.into(),
            output_directory: output_directory.into(),
            rejected_qualifiers: normalize_qualifiers(DEFAULT_REJECTED_QUALIFIERS.iter().copied()),
            ignored_modules: BTreeSet::new(),
            allow_major_updates: false,
            repositories: RepositorySpec::defaults(),
            parallelism: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            catalog_failure_policy: CatalogFailurePolicy::default(),
            reference_policy: ReferencePolicy::default(),
            show_progress: false,
        }
    }

    pub fn with_rejected_qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rejected_qualifiers = normalize_qualifiers(qualifiers);
        self
    }

    pub fn with_ignored_modules(mut self, modules: impl IntoIterator<Item = ModuleCoordinate>) -> Self {
        self.ignored_modules = modules.into_iter().collect();
        self
    }

    pub fn with_allow_major_updates(mut self, allow: bool) -> Self {
        self.allow_major_updates = allow;
        self
    }

    pub fn with_catalog_failure_policy(mut self, policy: CatalogFailurePolicy) -> Self {
        self.catalog_failure_policy = policy;
        self
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    /// Concurrent lookups for a run needing `lookups` distinct queries.
    pub fn effective_parallelism(&self, lookups: usize) -> usize {
        self.parallelism
            .unwrap_or_else(|| lookups.min(DEFAULT_MAX_PARALLELISM))
            .max(1)
    }

    /// Checks the directories before any catalog is read.
    pub fn validate(&self) -> Result<()> {
        PathValidator::validate_catalogs_directory(&self.catalogs_directory)?;
        PathValidator::ensure_distinct_output(&self.catalogs_directory, &self.output_directory)?;
        if self.parallelism == Some(0) {
            return Err(UpdateError::Config("parallelism must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn normalize_qualifiers<I, S>(qualifiers: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    qualifiers
        .into_iter()
        .map(|q| q.as_ref().trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .collect()
}

/// One layer of configuration values. Lookups are total and side-effect-free.
pub trait PropertySource {
    fn name(&self) -> &str;
    fn get(&self, setting: Setting) -> Option<String>;
}

/// Process environment.
pub struct Environment;

impl PropertySource for Environment {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, setting: Setting) -> Option<String> {
        std::env::var(setting.env).ok()
    }
}

/// In-memory key/value layer; also backs `gradle.properties`.
#[derive(Debug, Default)]
pub struct Properties {
    name: String,
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new(name: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Reads a Java-style properties file. A missing file is an empty layer.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::new(name, Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(name, HashMap::new())),
            Err(e) => Err(UpdateError::Config(format!("Cannot read {name}: {e}"))),
        }
    }

    fn parse(content: &str) -> HashMap<String, String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let split = line.find(['=', ':'])?;
                let (key, value) = line.split_at(split);
                Some((key.trim().to_string(), value[1..].trim().to_string()))
            })
            .collect()
    }
}

impl PropertySource for Properties {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, setting: Setting) -> Option<String> {
        self.values.get(setting.property).cloned()
    }
}

/// A setting known by an environment variable and a property key.
#[derive(Debug, Clone, Copy)]
pub struct Setting {
    pub env: &'static str,
    pub property: &'static str,
}

impl Setting {
    const fn new(env: &'static str, property: &'static str) -> Self {
        Self { env, property }
    }
}

pub mod settings {
    use super::Setting;

    pub const CATALOGS_DIRECTORY: Setting =
        Setting::new("CATALOG_UPDATE_CATALOGS_DIR", "catalogUpdate.catalogsDirectory");
    pub const OUTPUT_DIRECTORY: Setting =
        Setting::new("CATALOG_UPDATE_OUTPUT_DIR", "catalogUpdate.outputDirectory");
    pub const REJECTED_QUALIFIERS: Setting =
        Setting::new("CATALOG_UPDATE_REJECTED_QUALIFIERS", "catalogUpdate.rejectedQualifiers");
    pub const IGNORED_MODULES: Setting =
        Setting::new("CATALOG_UPDATE_IGNORED_MODULES", "catalogUpdate.ignoredModules");
    pub const ALLOW_MAJOR_UPDATES: Setting =
        Setting::new("CATALOG_UPDATE_ALLOW_MAJOR_UPDATES", "catalogUpdate.allowMajorUpdates");
    pub const REPOSITORIES: Setting =
        Setting::new("CATALOG_UPDATE_REPOSITORIES", "catalogUpdate.repositories");
    pub const PARALLELISM: Setting =
        Setting::new("CATALOG_UPDATE_PARALLELISM", "catalogUpdate.parallelism");
    pub const TIMEOUT_SECONDS: Setting =
        Setting::new("CATALOG_UPDATE_TIMEOUT_SECONDS", "catalogUpdate.timeoutSeconds");
    pub const FAIL_ON_CATALOG_ERROR: Setting =
        Setting::new("CATALOG_UPDATE_FAIL_ON_CATALOG_ERROR", "catalogUpdate.failOnCatalogError");
    pub const ALLOW_MIXED_REFERENCES: Setting = Setting::new(
        "CATALOG_UPDATE_ALLOW_MIXED_REFERENCES",
        "catalogUpdate.allowMixedVersionReferences",
    );
}

/// Environment first, then the property layers, in order.
pub struct LayeredConfig {
    layers: Vec<Box<dyn PropertySource>>,
}

impl LayeredConfig {
    pub fn new(layers: Vec<Box<dyn PropertySource>>) -> Self {
        Self { layers }
    }

    /// Environment plus `<project>/gradle.properties`.
    pub fn for_project(project_dir: &Path) -> Result<Self> {
        let properties = Properties::load(&project_dir.join("gradle.properties"))?;
        Ok(Self::new(vec![Box::new(Environment), Box::new(properties)]))
    }

    pub fn lookup(&self, setting: Setting) -> Option<String> {
        self.layers.iter().find_map(|layer| {
            let value = layer.get(setting).filter(|v| !v.trim().is_empty())?;
            debug!(layer = layer.name(), key = setting.property, "configuration value resolved");
            Some(value)
        })
    }

    pub fn string_or(&self, setting: Setting, default: &str) -> String {
        self.lookup(setting).unwrap_or_else(|| default.to_string())
    }

    pub fn bool_or(&self, setting: Setting, default: bool) -> Result<bool> {
        match self.lookup(setting) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(UpdateError::Config(format!(
                    "{} must be a boolean, got '{raw}'",
                    setting.property
                ))),
            },
        }
    }

    pub fn usize_opt(&self, setting: Setting) -> Result<Option<usize>> {
        self.lookup(setting)
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|_| {
                    UpdateError::Config(format!(
                        "{} must be a non-negative integer, got '{raw}'",
                        setting.property
                    ))
                })
            })
            .transpose()
    }

    /// Comma separated list; `None` when no layer defines the setting.
    pub fn list(&self, setting: Setting) -> Option<Vec<String>> {
        self.lookup(setting).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// Values given explicitly by the caller; they win over every layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub catalogs_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub rejected_qualifiers: Option<Vec<String>>,
    pub ignored_modules: Option<Vec<String>>,
    pub allow_major_updates: Option<bool>,
    pub repositories: Option<Vec<String>>,
    pub parallelism: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub fail_on_catalog_error: Option<bool>,
    pub allow_mixed_references: Option<bool>,
    pub show_progress: bool,
}

impl UpdateConfig {
    /// Resolves a full configuration for the project rooted at `project_dir`.
    pub fn resolve(project_dir: &Path, layers: &LayeredConfig, overrides: ConfigOverrides) -> Result<Self> {
        use settings::*;

        let catalogs_directory = overrides
            .catalogs_directory
            .unwrap_or_else(|| PathBuf::from(layers.string_or(CATALOGS_DIRECTORY, "gradle")));
        let output_directory = overrides
            .output_directory
            .unwrap_or_else(|| PathBuf::from(layers.string_or(OUTPUT_DIRECTORY, "gradle/updates")));

        let mut config = UpdateConfig::new(
            project_dir.join(catalogs_directory),
            project_dir.join(output_directory),
        );

        if let Some(qualifiers) = overrides
            .rejected_qualifiers
            .or_else(|| layers.list(REJECTED_QUALIFIERS))
        {
            config = config.with_rejected_qualifiers(qualifiers);
        }

        if let Some(modules) = overrides.ignored_modules.or_else(|| layers.list(IGNORED_MODULES)) {
            let modules = modules
                .iter()
                .map(|m| m.parse::<ModuleCoordinate>())
                .collect::<Result<Vec<_>>>()?;
            config = config.with_ignored_modules(modules);
        }

        config.allow_major_updates = match overrides.allow_major_updates {
            Some(allow) => allow,
            None => layers.bool_or(ALLOW_MAJOR_UPDATES, false)?,
        };

        let repository_urls = overrides.repositories.or_else(|| layers.list(REPOSITORIES));
        config.repositories = match repository_urls {
            Some(urls) if !urls.is_empty() => urls
                .into_iter()
                .enumerate()
                .map(|(index, url)| RepositorySpec::new(format!("repository-{}", index + 1), url))
                .collect(),
            _ => {
                let discovered = crate::gradle::discover_repositories(project_dir)?;
                if discovered.is_empty() {
                    RepositorySpec::defaults()
                } else {
                    discovered
                }
            }
        };

        config.parallelism = match overrides.parallelism {
            Some(parallelism) => Some(parallelism),
            None => layers.usize_opt(PARALLELISM)?,
        };

        let timeout = match overrides.timeout_seconds {
            Some(seconds) => Some(seconds),
            None => layers.usize_opt(TIMEOUT_SECONDS)?.map(|s| s as u64),
        };
        if let Some(seconds) = timeout {
            config.request_timeout = Duration::from_secs(seconds.max(1));
        }

        let fail_fast = match overrides.fail_on_catalog_error {
            Some(fail) => fail,
            None => layers.bool_or(FAIL_ON_CATALOG_ERROR, false)?,
        };
        config.catalog_failure_policy = if fail_fast {
            CatalogFailurePolicy::Abort
        } else {
            CatalogFailurePolicy::Continue
        };

        let mixed = match overrides.allow_mixed_references {
            Some(mixed) => mixed,
            None => layers.bool_or(ALLOW_MIXED_REFERENCES, false)?,
        };
        config.reference_policy = if mixed {
            ReferencePolicy::AllowMixedModules
        } else {
            ReferencePolicy::RequireSameModule
        };

        config.show_progress = overrides.show_progress;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layer(name: &str, pairs: &[(&str, &str)]) -> Box<dyn PropertySource> {
        Box::new(Properties::new(
            name,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    /// Stands in for the process environment without touching it.
    struct FakeEnvironment(HashMap<String, String>);

    impl PropertySource for FakeEnvironment {
        fn name(&self) -> &str {
            "environment"
        }

        fn get(&self, setting: Setting) -> Option<String> {
            self.0.get(setting.env).cloned()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> Box<dyn PropertySource> {
        Box::new(FakeEnvironment(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = UpdateConfig::new("gradle", "gradle/updates");
        assert_eq!(
            config.rejected_qualifiers,
            normalize_qualifiers(DEFAULT_REJECTED_QUALIFIERS.iter().copied())
        );
        assert!(config.ignored_modules.is_empty());
        assert!(!config.allow_major_updates);
        assert_eq!(config.catalog_failure_policy, CatalogFailurePolicy::Continue);
        assert_eq!(config.reference_policy, ReferencePolicy::RequireSameModule);
        assert_eq!(config.repositories.len(), 3);
        let portal = &config.repositories[2];
        assert_eq!(portal.url, GRADLE_PLUGIN_PORTAL);
        assert!(portal.plugin_markers_only);
        assert!(config.repositories[..2].iter().all(|r| !r.plugin_markers_only));
    }

    #[test]
    fn parses_properties_file() {
        let parsed = Properties::parse(
            "# comment\ncatalogUpdate.allowMajorUpdates = true\norg.gradle.jvmargs=-Xmx2g\n\n!bang\n",
        );
        assert_eq!(parsed.get("catalogUpdate.allowMajorUpdates").unwrap(), "true");
        assert_eq!(parsed.get("org.gradle.jvmargs").unwrap(), "-Xmx2g");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn environment_wins_over_properties() {
        let layers = LayeredConfig::new(vec![
            env(&[("CATALOG_UPDATE_ALLOW_MAJOR_UPDATES", "false")]),
            layer("gradle.properties", &[("catalogUpdate.allowMajorUpdates", "true")]),
        ]);
        assert!(!layers.bool_or(settings::ALLOW_MAJOR_UPDATES, true).unwrap());

        let layers = LayeredConfig::new(vec![
            env(&[]),
            layer("gradle.properties", &[("catalogUpdate.allowMajorUpdates", "true")]),
        ]);
        assert!(layers.bool_or(settings::ALLOW_MAJOR_UPDATES, false).unwrap());

        let layers = LayeredConfig::new(vec![env(&[])]);
        assert!(layers.bool_or(settings::ALLOW_MAJOR_UPDATES, true).unwrap());
    }

    #[test]
    fn invalid_boolean_is_a_config_error() {
        let layers = LayeredConfig::new(vec![env(&[("CATALOG_UPDATE_ALLOW_MAJOR_UPDATES", "maybe")])]);
        assert!(matches!(
            layers.bool_or(settings::ALLOW_MAJOR_UPDATES, false),
            Err(UpdateError::Config(_))
        ));
    }

    #[test]
    fn resolve_combines_overrides_and_layers() {
        let project = tempdir().unwrap();
        let layers = LayeredConfig::new(vec![
            env(&[("CATALOG_UPDATE_REJECTED_QUALIFIERS", "RC, Beta")]),
            layer(
                "gradle.properties",
                &[
                    ("catalogUpdate.ignoredModules", "com.google.guava:guava"),
                    ("catalogUpdate.repositories", "https://repo.example.com/maven"),
                    ("catalogUpdate.failOnCatalogError", "true"),
                ],
            ),
        ]);
        let overrides = ConfigOverrides {
            allow_major_updates: Some(true),
            ..ConfigOverrides::default()
        };

        let config = UpdateConfig::resolve(project.path(), &layers, overrides).unwrap();

        assert_eq!(config.catalogs_directory, project.path().join("gradle"));
        assert_eq!(config.output_directory, project.path().join("gradle/updates"));
        assert_eq!(
            config.rejected_qualifiers,
            ["beta", "rc"].iter().map(|s| s.to_string()).collect()
        );
        assert!(config
            .ignored_modules
            .contains(&ModuleCoordinate::new("com.google.guava", "guava")));
        assert!(config.allow_major_updates);
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.repositories[0].url, "https://repo.example.com/maven");
        assert_eq!(config.catalog_failure_policy, CatalogFailurePolicy::Abort);
    }

    #[test]
    fn effective_parallelism_is_bounded() {
        let mut config = UpdateConfig::new("gradle", "out");
        assert_eq!(config.effective_parallelism(0), 1);
        assert_eq!(config.effective_parallelism(3), 3);
        assert_eq!(config.effective_parallelism(100), DEFAULT_MAX_PARALLELISM);
        config.parallelism = Some(2);
        assert_eq!(config.effective_parallelism(100), 2);
    }
}
