use crate::catalog::Catalog;
use crate::config::UpdateConfig;
use crate::maven::{VersionComparator, VersionToken};
use crate::repository::ModuleCoordinate;
use crate::update::{
    Lookup, LookupFailure, PlanUnit, Rejection, RejectionReason, SkipReason, SkipRecord,
    UpdateCandidate, UpdatePlan,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Policy inputs of planning.
#[derive(Debug, Clone, Default)]
pub struct UpdatePolicy {
    pub rejected_qualifiers: BTreeSet<String>,
    pub ignored_modules: BTreeSet<ModuleCoordinate>,
    pub allow_major_updates: bool,
}

impl From<&UpdateConfig> for UpdatePolicy {
    fn from(config: &UpdateConfig) -> Self {
        Self {
            rejected_qualifiers: config.rejected_qualifiers.clone(),
            ignored_modules: config.ignored_modules.clone(),
            allow_major_updates: config.allow_major_updates,
        }
    }
}

/// Decides, per plan unit, whether a newer acceptable version exists.
/// Pure: all version listings are fetched beforehand.
pub struct UpdatePlanner {
    policy: UpdatePolicy,
}

enum Decision {
    Update(UpdateCandidate),
    Skip(SkipRecord),
}

impl UpdatePlanner {
    pub fn new(policy: UpdatePolicy) -> Self {
        Self { policy }
    }

    pub fn is_ignored(&self, unit: &PlanUnit) -> bool {
        unit.coordinates
            .iter()
            .any(|coordinate| self.policy.ignored_modules.contains(coordinate))
    }

    /// Coordinates that must be looked up to plan `catalog`.
    pub fn required_lookups(&self, catalog: &Catalog) -> BTreeSet<ModuleCoordinate> {
        PlanUnit::from_catalog(catalog)
            .into_iter()
            .filter(|unit| !self.is_ignored(unit))
            .flat_map(|unit| unit.coordinates)
            .collect()
    }

    /// Plans every unit of `catalog` against the fetched listings. A
    /// coordinate missing from `lookups` counts as cancelled.
    pub fn plan(&self, catalog: &Catalog, lookups: &HashMap<ModuleCoordinate, Lookup>) -> UpdatePlan {
        let mut plan = UpdatePlan::default();

        for unit in PlanUnit::from_catalog(catalog) {
            match self.plan_unit(unit, lookups) {
                Decision::Update(candidate) => {
                    debug!(
                        catalog = %catalog.name,
                        unit = %candidate.unit.key,
                        from = %candidate.from,
                        to = %candidate.to,
                        "update planned"
                    );
                    plan.candidates.insert(candidate.unit.key.clone(), candidate);
                }
                Decision::Skip(skip) => {
                    debug!(catalog = %catalog.name, unit = %skip.unit.key, reason = %skip.reason, "unit skipped");
                    plan.skips.insert(skip.unit.key.clone(), skip);
                }
            }
        }

        plan
    }

    fn plan_unit(&self, unit: PlanUnit, lookups: &HashMap<ModuleCoordinate, Lookup>) -> Decision {
        let skip = |unit: PlanUnit, reason: SkipReason, rejected: Vec<Rejection>| {
            Decision::Skip(SkipRecord {
                unit,
                reason,
                rejected,
            })
        };

        if self.is_ignored(&unit) {
            return skip(unit, SkipReason::Ignored, Vec::new());
        }

        let available = match self.available_versions(&unit, lookups) {
            Ok(available) => available,
            Err(reason) => return skip(unit, reason, Vec::new()),
        };

        let current = match VersionToken::parse(&unit.current) {
            Ok(current) => current,
            Err(e) => {
                warn!(unit = %unit.key, error = %e, "current version cannot be compared");
                return skip(unit, SkipReason::NoEligibleUpdate, Vec::new());
            }
        };

        let mut rejected = Vec::new();
        let mut accepted = Vec::new();
        for version in available {
            match self.rejection(&version, &current) {
                Some(reason) => rejected.push(Rejection {
                    version: version.original,
                    reason,
                }),
                None => accepted.push(version),
            }
        }

        match VersionComparator::latest(&accepted) {
            Some(latest) if VersionComparator::is_newer(latest, &current) => {
                let to = latest.original.clone();
                Decision::Update(UpdateCandidate {
                    from: unit.current.clone(),
                    unit,
                    to,
                    rejected,
                })
            }
            _ => skip(unit, SkipReason::NoEligibleUpdate, rejected),
        }
    }

    /// Parsed versions published for every coordinate of the unit.
    fn available_versions(
        &self,
        unit: &PlanUnit,
        lookups: &HashMap<ModuleCoordinate, Lookup>,
    ) -> Result<Vec<VersionToken>, SkipReason> {
        let mut common: Option<Vec<String>> = None;

        for coordinate in &unit.coordinates {
            let versions = match lookups.get(coordinate) {
                Some(Ok(versions)) => versions,
                Some(Err(LookupFailure::Unavailable(details))) => {
                    return Err(SkipReason::RepositoryUnavailable(details.clone()));
                }
                Some(Err(LookupFailure::Cancelled)) | None => return Err(SkipReason::Cancelled),
            };

            common = Some(match common {
                None => versions.clone(),
                Some(previous) => previous
                    .into_iter()
                    .filter(|version| versions.contains(version))
                    .collect(),
            });
        }

        let mut seen = BTreeSet::new();
        Ok(common
            .unwrap_or_default()
            .into_iter()
            .filter(|raw| seen.insert(raw.clone()))
            .filter_map(|raw| match VersionToken::parse(&raw) {
                Ok(version) => Some(version),
                Err(e) => {
                    debug!(unit = %unit.key, version = %raw, error = %e, "discarding unparseable version");
                    None
                }
            })
            .collect())
    }

    fn rejection(&self, version: &VersionToken, current: &VersionToken) -> Option<RejectionReason> {
        if !VersionComparator::is_eligible(version, &self.policy.rejected_qualifiers) {
            return Some(RejectionReason::Qualifier);
        }
        if !self.policy.allow_major_updates && version.major() != current.major() {
            return Some(RejectionReason::MajorGate);
        }
        if !VersionComparator::is_newer(version, current) {
            return Some(RejectionReason::BelowCurrent);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogReader;
    use crate::config::ReferencePolicy;
    use crate::update::UnitKey;
    use std::path::Path;

    fn guava() -> ModuleCoordinate {
        ModuleCoordinate::new("com.google.guava", "guava")
    }

    fn catalog(source: &str, policy: ReferencePolicy) -> Catalog {
        CatalogReader::new(policy)
            .parse_str(
                "libs",
                Path::new("libs.versions.toml"),
                Path::new("libs.versions.toml"),
                source.to_string(),
            )
            .unwrap()
    }

    fn guava_catalog() -> Catalog {
        catalog(
            "[libraries]\nguava = \"com.google.guava:guava:30.0-jre\"\n",
            ReferencePolicy::RequireSameModule,
        )
    }

    fn lookups(pairs: &[(ModuleCoordinate, &[&str])]) -> HashMap<ModuleCoordinate, Lookup> {
        pairs
            .iter()
            .map(|(coordinate, versions)| {
                (
                    coordinate.clone(),
                    Ok(versions.iter().map(|v| v.to_string()).collect()),
                )
            })
            .collect()
    }

    fn policy(allow_major_updates: bool) -> UpdatePolicy {
        UpdatePolicy {
            rejected_qualifiers: ["rc".to_string()].into_iter().collect(),
            ignored_modules: BTreeSet::new(),
            allow_major_updates,
        }
    }

    fn guava_versions() -> HashMap<ModuleCoordinate, Lookup> {
        lookups(&[(guava(), &["30.0-jre", "31.0-jre", "31.0-rc1"])])
    }

    #[test]
    fn proposes_latest_eligible_version_when_major_allowed() {
        let plan = UpdatePlanner::new(policy(true)).plan(&guava_catalog(), &guava_versions());

        let candidate = plan.candidate_for("guava").unwrap();
        assert_eq!(candidate.from, "30.0-jre");
        assert_eq!(candidate.to, "31.0-jre");
        assert!(candidate.rejected.contains(&Rejection {
            version: "31.0-rc1".to_string(),
            reason: RejectionReason::Qualifier,
        }));
        assert!(plan.skips.is_empty());
    }

    #[test]
    fn major_gate_blocks_new_leading_segment() {
        let plan = UpdatePlanner::new(policy(false)).plan(&guava_catalog(), &guava_versions());

        assert!(!plan.has_updates());
        let skip = plan.skip_for("guava").unwrap();
        assert_eq!(skip.reason, SkipReason::NoEligibleUpdate);
        assert!(skip.rejected.iter().any(|r| r.version == "31.0-jre"
            && r.reason == RejectionReason::MajorGate));
    }

    #[test]
    fn ignored_module_is_never_updated() {
        let mut policy = policy(true);
        policy.ignored_modules.insert(guava());
        let planner = UpdatePlanner::new(policy);

        assert!(planner.required_lookups(&guava_catalog()).is_empty());
        let plan = planner.plan(&guava_catalog(), &guava_versions());
        assert!(plan.candidate_for("guava").is_none());
        assert_eq!(plan.skip_for("guava").unwrap().reason, SkipReason::Ignored);
    }

    #[test]
    fn unavailable_and_cancelled_lookups_are_skips() {
        let planner = UpdatePlanner::new(policy(true));
        let mut failed = HashMap::new();
        failed.insert(guava(), Err(LookupFailure::Unavailable("HTTP 503".to_string())));

        let plan = planner.plan(&guava_catalog(), &failed);
        assert_eq!(
            plan.skip_for("guava").unwrap().reason,
            SkipReason::RepositoryUnavailable("HTTP 503".to_string())
        );

        let plan = planner.plan(&guava_catalog(), &HashMap::new());
        assert_eq!(plan.skip_for("guava").unwrap().reason, SkipReason::Cancelled);
    }

    #[test]
    fn blank_listing_entries_are_discarded() {
        let planner = UpdatePlanner::new(policy(true));
        let plan = planner.plan(
            &guava_catalog(),
            &lookups(&[(guava(), &["", "  ", "30.1-jre"])]),
        );
        assert_eq!(plan.candidate_for("guava").unwrap().to, "30.1-jre");
    }

    #[test]
    fn mixed_reference_uses_versions_common_to_all_modules() {
        let catalog = catalog(
            r#"
[versions]
jackson = "2.15.0"

[libraries]
jackson-core = { module = "com.fasterxml.jackson.core:jackson-core", version.ref = "jackson" }
jackson-databind = { module = "com.fasterxml.jackson.core:jackson-databind", version.ref = "jackson" }
"#,
            ReferencePolicy::AllowMixedModules,
        );
        let core = ModuleCoordinate::new("com.fasterxml.jackson.core", "jackson-core");
        let databind = ModuleCoordinate::new("com.fasterxml.jackson.core", "jackson-databind");

        let planner = UpdatePlanner::new(policy(false));
        assert_eq!(planner.required_lookups(&catalog).len(), 2);

        let plan = planner.plan(
            &catalog,
            &lookups(&[
                (core, &["2.15.0", "2.16.0", "2.16.1"]),
                (databind, &["2.15.0", "2.16.0"]),
            ]),
        );

        assert_eq!(plan.candidates.len(), 1);
        let candidate = &plan.candidates[&UnitKey::Reference("jackson".to_string())];
        assert_eq!(candidate.to, "2.16.0");
        assert_eq!(candidate.unit.aliases.len(), 2);
    }
}
