//! Run report handed back to the caller.

use crate::catalog::Catalog;
use crate::error::UpdateError;
use crate::update::{SkipReason, UpdatePlan};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    FatalAbort,
}

impl RunStatus {
    /// Process exit code; each status maps to its own code.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::FatalAbort => 1,
            RunStatus::PartialFailure => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipKind {
    Ignored,
    NoEligibleUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    RepositoryUnavailable,
    Cancelled,
    WriteFailed,
    /// Not planned because another catalog aborted the run.
    Aborted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::RepositoryUnavailable => "repository-unavailable",
            FailureReason::Cancelled => "cancelled",
            FailureReason::WriteFailed => "write-failed",
            FailureReason::Aborted => "aborted",
        };
        f.write_str(text)
    }
}

/// Per-alias result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Updated { from: String, to: String },
    Skipped(SkipKind),
    Failed(FailureReason),
}

impl Outcome {
    fn from_skip(reason: &SkipReason) -> Self {
        match reason {
            SkipReason::Ignored => Outcome::Skipped(SkipKind::Ignored),
            SkipReason::NoEligibleUpdate => Outcome::Skipped(SkipKind::NoEligibleUpdate),
            SkipReason::RepositoryUnavailable(_) => {
                Outcome::Failed(FailureReason::RepositoryUnavailable)
            }
            SkipReason::Cancelled => Outcome::Failed(FailureReason::Cancelled),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// One rewritten version value; a shared reference yields a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRecord {
    pub target: String,
    pub from: String,
    pub to: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    pub name: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub outcomes: BTreeMap<String, Outcome>,
    pub updates: Vec<UpdateRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CatalogReport {
    pub fn from_plan(catalog: &Catalog, plan: &UpdatePlan) -> Self {
        let mut outcomes = BTreeMap::new();
        let mut updates = Vec::new();

        for candidate in plan.candidates.values() {
            for alias in &candidate.unit.aliases {
                outcomes.insert(
                    alias.clone(),
                    Outcome::Updated {
                        from: candidate.from.clone(),
                        to: candidate.to.clone(),
                    },
                );
            }
            updates.push(UpdateRecord {
                target: candidate.unit.key.to_string(),
                from: candidate.from.clone(),
                to: candidate.to.clone(),
                aliases: candidate.unit.aliases.clone(),
            });
        }

        for skip in plan.skips.values() {
            for alias in &skip.unit.aliases {
                outcomes.insert(alias.clone(), Outcome::from_skip(&skip.reason));
            }
        }

        Self {
            name: catalog.name.clone(),
            path: catalog.path.clone(),
            output: None,
            outcomes,
            updates,
            error: None,
        }
    }

    /// A readable catalog left unplanned because the run aborted.
    pub fn aborted(catalog: &Catalog) -> Self {
        Self {
            name: catalog.name.clone(),
            path: catalog.path.clone(),
            output: None,
            outcomes: catalog
                .entries
                .keys()
                .map(|alias| (alias.clone(), Outcome::Failed(FailureReason::Aborted)))
                .collect(),
            updates: Vec::new(),
            error: None,
        }
    }

    /// A catalog that could not be read.
    pub fn unreadable(error: &UpdateError) -> Self {
        let (name, path) = match error {
            UpdateError::CatalogParse { catalog, path, .. } => (catalog.clone(), path.clone()),
            _ => (String::new(), PathBuf::new()),
        };
        Self {
            name,
            path,
            output: None,
            outcomes: BTreeMap::new(),
            updates: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = Some(output);
        self
    }

    /// Planned updates did not reach the output directory.
    pub fn write_failed(mut self, error: &UpdateError) -> Self {
        for outcome in self.outcomes.values_mut() {
            if matches!(outcome, Outcome::Updated { .. }) {
                *outcome = Outcome::Failed(FailureReason::WriteFailed);
            }
        }
        self.updates.clear();
        self.error = Some(error.to_string());
        self
    }

    /// Planned updates were dropped because the run was cancelled.
    pub fn cancelled(mut self) -> Self {
        for outcome in self.outcomes.values_mut() {
            if matches!(outcome, Outcome::Updated { .. }) {
                *outcome = Outcome::Failed(FailureReason::Cancelled);
            }
        }
        self.updates.clear();
        self
    }

    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.outcomes.values().any(Outcome::is_failure)
    }
}

/// The error that stopped the run, located well enough to act on.
#[derive(Debug, Clone, Serialize)]
pub struct AbortInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl From<&UpdateError> for AbortInfo {
    fn from(error: &UpdateError) -> Self {
        let (catalog, path) = match error {
            UpdateError::CatalogParse { catalog, path, .. }
            | UpdateError::Write { catalog, path, .. } => {
                (Some(catalog.clone()), Some(path.clone()))
            }
            _ => (None, None),
        };
        Self {
            catalog,
            path,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub status: RunStatus,
    pub catalogs: Vec<CatalogReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortInfo>,
}

impl Report {
    pub fn completed(catalogs: Vec<CatalogReport>) -> Self {
        let status = if catalogs.iter().any(CatalogReport::has_failures) {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        };
        Self {
            status,
            catalogs,
            abort: None,
        }
    }

    pub fn aborted(catalogs: Vec<CatalogReport>, error: &UpdateError) -> Self {
        Self {
            status: RunStatus::FatalAbort,
            catalogs,
            abort: Some(AbortInfo::from(error)),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.status.exit_code()
    }

    pub fn catalog(&self, name: &str) -> Option<&CatalogReport> {
        self.catalogs.iter().find(|catalog| catalog.name == name)
    }

    /// Outcome of `alias` in catalog `catalog`.
    pub fn outcome(&self, catalog: &str, alias: &str) -> Option<&Outcome> {
        self.catalog(catalog)?.outcomes.get(alias)
    }

    pub fn total_updates(&self) -> usize {
        self.catalogs.iter().map(|catalog| catalog.updates.len()).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human readable rendering for the terminal.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for catalog in &self.catalogs {
            writeln!(
                f,
                "\n{} {}",
                "📦".cyan(),
                format!("{} ({})", catalog.name, catalog.path.display()).cyan().bold()
            )?;

            if let Some(error) = &catalog.error {
                writeln!(f, "  {} {}", "✗".red(), error.red())?;
            }

            for (alias, outcome) in &catalog.outcomes {
                match outcome {
                    Outcome::Updated { from, to } => writeln!(
                        f,
                        "  • {} {} → {}",
                        alias.white().bold(),
                        from.dimmed(),
                        to.green().bold()
                    )?,
                    Outcome::Skipped(SkipKind::Ignored) => {
                        writeln!(f, "  • {} {}", alias, "ignored".dimmed())?
                    }
                    Outcome::Skipped(SkipKind::NoEligibleUpdate) => {
                        writeln!(f, "  • {} {}", alias, "up to date".dimmed())?
                    }
                    Outcome::Failed(reason) => writeln!(
                        f,
                        "  • {} {}",
                        alias.white().bold(),
                        reason.to_string().red()
                    )?,
                }
            }

            if let Some(output) = &catalog.output {
                writeln!(f, "  {}", format!("→ {}", output.display()).dimmed())?;
            }
        }

        writeln!(f)?;
        match self.status {
            RunStatus::Success if self.total_updates() == 0 => {
                writeln!(f, "{}", "✨ All dependencies are up to date!".green().bold())
            }
            RunStatus::Success => writeln!(
                f,
                "{}",
                format!("✨ Proposed {} update(s)", self.total_updates()).green().bold()
            ),
            RunStatus::PartialFailure => writeln!(
                f,
                "{}",
                format!(
                    "⚠ Proposed {} update(s); some entries could not be checked",
                    self.total_updates()
                )
                .yellow()
                .bold()
            ),
            RunStatus::FatalAbort => {
                let message = self
                    .abort
                    .as_ref()
                    .map(|abort| abort.message.as_str())
                    .unwrap_or("run aborted");
                writeln!(f, "{} {}", "Error:".red().bold(), message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogReader;
    use crate::config::ReferencePolicy;
    use crate::repository::ModuleCoordinate;
    use crate::update::{Lookup, LookupFailure, UpdatePlanner, UpdatePolicy};
    use std::collections::HashMap;
    use std::path::Path;

    fn catalog() -> Catalog {
        CatalogReader::new(ReferencePolicy::RequireSameModule)
            .parse_str(
                "libs",
                Path::new("gradle/libs.versions.toml"),
                Path::new("libs.versions.toml"),
                "[libraries]\nguava = \"com.google.guava:guava:30.0-jre\"\nokio = \"com.squareup.okio:okio:3.5.0\"\n"
                    .to_string(),
            )
            .unwrap()
    }

    fn plan(okio: Lookup) -> UpdatePlan {
        let mut lookups: HashMap<ModuleCoordinate, Lookup> = HashMap::new();
        lookups.insert(
            ModuleCoordinate::new("com.google.guava", "guava"),
            Ok(vec!["30.1-jre".to_string()]),
        );
        lookups.insert(ModuleCoordinate::new("com.squareup.okio", "okio"), okio);
        UpdatePlanner::new(UpdatePolicy::default()).plan(&catalog(), &lookups)
    }

    #[test]
    fn serializes_outcomes_and_status() {
        let report = Report::completed(vec![CatalogReport::from_plan(
            &catalog(),
            &plan(Err(LookupFailure::Unavailable("HTTP 503".to_string()))),
        )]);

        assert_eq!(report.status, RunStatus::PartialFailure);
        assert_eq!(report.exit_code(), 2);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "partial-failure");
        let outcomes = &json["catalogs"][0]["outcomes"];
        assert_eq!(outcomes["guava"]["updated"]["from"], "30.0-jre");
        assert_eq!(outcomes["guava"]["updated"]["to"], "30.1-jre");
        assert_eq!(outcomes["okio"]["failed"], "repository-unavailable");
    }

    #[test]
    fn up_to_date_run_is_success() {
        let report = Report::completed(vec![CatalogReport::from_plan(
            &catalog(),
            &plan(Ok(vec!["3.5.0".to_string()])),
        )]);

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(
            report.outcome("libs", "okio"),
            Some(&Outcome::Skipped(SkipKind::NoEligibleUpdate))
        );
        assert_eq!(report.total_updates(), 1);
        assert!(report.render_text().contains("guava"));
    }

    #[test]
    fn write_failure_turns_updates_into_failures() {
        let error = UpdateError::write("libs", "out/libs.versions.toml", "disk full");
        let report = Report::completed(vec![
            CatalogReport::from_plan(&catalog(), &plan(Ok(vec!["3.5.0".to_string()])))
                .write_failed(&error),
        ]);

        assert_eq!(report.status, RunStatus::PartialFailure);
        assert_eq!(
            report.outcome("libs", "guava"),
            Some(&Outcome::Failed(FailureReason::WriteFailed))
        );
        assert_eq!(report.total_updates(), 0);
    }

    #[test]
    fn abort_carries_catalog_location() {
        let error = UpdateError::catalog_parse("libs", "gradle/libs.versions.toml", "duplicate alias");
        let report = Report::aborted(Vec::new(), &error);

        assert_eq!(report.exit_code(), 1);
        let abort = report.abort.as_ref().unwrap();
        assert_eq!(abort.catalog.as_deref(), Some("libs"));
        assert_eq!(abort.path.as_deref(), Some(Path::new("gradle/libs.versions.toml")));
        assert!(report.render_text().contains("duplicate alias"));
    }

    #[test]
    fn aborted_catalog_lists_every_alias() {
        let error = UpdateError::catalog_parse("broken", "gradle/broken.versions.toml", "invalid TOML");
        let report = Report::aborted(vec![CatalogReport::aborted(&catalog())], &error);

        assert_eq!(report.status, RunStatus::FatalAbort);
        for alias in ["guava", "okio"] {
            assert_eq!(
                report.outcome("libs", alias),
                Some(&Outcome::Failed(FailureReason::Aborted))
            );
        }
        let text = report.render_text();
        assert!(text.contains("aborted"));
        assert!(text.contains("invalid TOML"));
    }
}
