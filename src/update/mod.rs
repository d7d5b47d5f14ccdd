//! Update planning: which entries get a newer version, and why the others
//! do not.

pub mod planner;

pub use planner::{UpdatePlanner, UpdatePolicy};

use crate::catalog::{Catalog, VersionSource};
use crate::repository::ModuleCoordinate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// What a plan unit rewrites in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum UnitKey {
    /// A literal version on one entry.
    Alias(String),
    /// A `[versions]` record shared by every entry referencing it.
    Reference(String),
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKey::Alias(alias) => f.write_str(alias),
            UnitKey::Reference(name) => write!(f, "versions.{name}"),
        }
    }
}

/// Entries that are planned, and updated, as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanUnit {
    pub key: UnitKey,
    pub aliases: Vec<String>,
    /// Distinct coordinates of the entries, sorted.
    pub coordinates: Vec<ModuleCoordinate>,
    pub current: String,
}

impl PlanUnit {
    /// Groups the entries of a catalog: one unit per literal entry and one
    /// per referenced `[versions]` record. Sorted by key.
    pub fn from_catalog(catalog: &Catalog) -> Vec<PlanUnit> {
        let mut units: BTreeMap<UnitKey, PlanUnit> = BTreeMap::new();

        for entry in catalog.entries.values() {
            let key = match &entry.version {
                VersionSource::Literal(_) => UnitKey::Alias(entry.alias.clone()),
                VersionSource::Reference { name, .. } => UnitKey::Reference(name.clone()),
            };

            let unit = units.entry(key.clone()).or_insert_with(|| PlanUnit {
                key,
                aliases: Vec::new(),
                coordinates: Vec::new(),
                current: entry.current_version().to_string(),
            });
            unit.aliases.push(entry.alias.clone());
            if !unit.coordinates.contains(&entry.coordinate) {
                unit.coordinates.push(entry.coordinate.clone());
                unit.coordinates.sort();
            }
        }

        units.into_values().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    /// Qualifier is in the rejected set.
    Qualifier,
    /// Leading segment differs from the current one.
    MajorGate,
    /// Not newer than the current version.
    BelowCurrent,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectionReason::Qualifier => "qualifier",
            RejectionReason::MajorGate => "major-gate",
            RejectionReason::BelowCurrent => "below-current",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub version: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCandidate {
    pub unit: PlanUnit,
    pub from: String,
    pub to: String,
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Ignored,
    RepositoryUnavailable(String),
    NoEligibleUpdate,
    /// The run was cancelled before the lookup completed.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ignored => f.write_str("ignored"),
            SkipReason::RepositoryUnavailable(_) => f.write_str("repository-unavailable"),
            SkipReason::NoEligibleUpdate => f.write_str("no-eligible-update"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipRecord {
    pub unit: PlanUnit,
    pub reason: SkipReason,
    /// Candidates seen and turned down, when a lookup happened.
    pub rejected: Vec<Rejection>,
}

/// Why a coordinate has no version list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    Unavailable(String),
    Cancelled,
}

/// Result of listing one coordinate's published versions.
pub type Lookup = std::result::Result<Vec<String>, LookupFailure>;

/// Every decision for one catalog, keyed and ordered by unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    pub candidates: BTreeMap<UnitKey, UpdateCandidate>,
    pub skips: BTreeMap<UnitKey, SkipRecord>,
}

impl UpdatePlan {
    pub fn has_updates(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Candidate covering `alias`, directly or through its reference.
    pub fn candidate_for(&self, alias: &str) -> Option<&UpdateCandidate> {
        self.candidates
            .values()
            .find(|candidate| candidate.unit.aliases.iter().any(|a| a == alias))
    }

    pub fn skip_for(&self, alias: &str) -> Option<&SkipRecord> {
        self.skips
            .values()
            .find(|skip| skip.unit.aliases.iter().any(|a| a == alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogReader;
    use crate::config::ReferencePolicy;
    use std::path::Path;

    #[test]
    fn shared_references_form_one_unit() {
        let catalog = CatalogReader::new(ReferencePolicy::RequireSameModule)
            .parse_str(
                "libs",
                Path::new("libs.versions.toml"),
                Path::new("libs.versions.toml"),
                r#"
[versions]
jackson = "2.15.0"

[libraries]
guava = "com.google.guava:guava:30.0-jre"
jackson-a = { module = "com.fasterxml.jackson.core:jackson-core", version.ref = "jackson" }
jackson-b = { module = "com.fasterxml.jackson.core:jackson-core", version.ref = "jackson" }
"#
                .to_string(),
            )
            .unwrap();

        let units = PlanUnit::from_catalog(&catalog);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].key, UnitKey::Alias("guava".to_string()));

        let shared = &units[1];
        assert_eq!(shared.key, UnitKey::Reference("jackson".to_string()));
        assert_eq!(shared.aliases, vec!["jackson-a", "jackson-b"]);
        assert_eq!(shared.coordinates.len(), 1);
        assert_eq!(shared.current, "2.15.0");
        assert_eq!(shared.key.to_string(), "versions.jackson");
    }
}
