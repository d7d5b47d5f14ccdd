//! Run coordination: read → look up → plan → write → report.
//!
//! - Every catalog is read once, up front
//! - Distinct coordinates are looked up concurrently, bounded by the
//!   configured parallelism
//! - Planning and writing start only after every lookup has joined, so
//!   results never depend on completion order
//! - Failures stay attached to the entry or catalog they belong to

use crate::catalog::{Catalog, CatalogReader, CatalogWriter};
use crate::config::{CatalogFailurePolicy, UpdateConfig};
use crate::error::{Result, UpdateError};
use crate::progress::LookupProgress;
use crate::report::{CatalogReport, Report};
use crate::repository::{ModuleCoordinate, RepositoryFactory, RepositoryGroup};
use crate::update::{Lookup, LookupFailure, UpdatePlanner, UpdatePolicy};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one update run over a catalogs directory.
pub struct CatalogUpdater {
    config: UpdateConfig,
    repositories: RepositoryGroup,
    cancel: CancellationToken,
}

/// A catalog slot after reading.
enum Loaded {
    Catalog(Catalog),
    Unreadable(UpdateError),
}

impl CatalogUpdater {
    /// Creates an updater querying the configured Maven repositories.
    pub fn new(config: UpdateConfig) -> Result<Self> {
        let repositories = RepositoryFactory::create_group(&config)?;
        Ok(Self::with_repositories(config, repositories))
    }

    /// Creates an updater with a custom repository group (for testing)
    pub fn with_repositories(config: UpdateConfig, repositories: RepositoryGroup) -> Self {
        Self {
            config,
            repositories,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops new lookups and prevents any write.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Report {
        if let Err(e) = self.config.validate() {
            warn!(error = %e, "configuration rejected");
            return Report::aborted(Vec::new(), &e);
        }

        let loaded = match self.load_catalogs() {
            Ok(loaded) => loaded,
            Err(e) => return Report::aborted(Vec::new(), &e),
        };

        if self.config.catalog_failure_policy == CatalogFailurePolicy::Abort {
            let first_error = loaded.iter().find_map(|slot| match slot {
                Loaded::Unreadable(e) => Some(e),
                Loaded::Catalog(_) => None,
            });
            if let Some(error) = first_error {
                warn!(error = %error, "malformed catalog aborts the run");
                let reports = loaded
                    .iter()
                    .map(|slot| match slot {
                        Loaded::Catalog(catalog) => CatalogReport::aborted(catalog),
                        Loaded::Unreadable(e) => CatalogReport::unreadable(e),
                    })
                    .collect();
                return Report::aborted(reports, error);
            }
        }

        let planner = UpdatePlanner::new(UpdatePolicy::from(&self.config));
        let coordinates: BTreeSet<ModuleCoordinate> = loaded
            .iter()
            .filter_map(|slot| match slot {
                Loaded::Catalog(catalog) => Some(planner.required_lookups(catalog)),
                Loaded::Unreadable(_) => None,
            })
            .flatten()
            .collect();

        let lookups = self.lookup_all(coordinates).await;

        let mut reports = Vec::with_capacity(loaded.len());
        let mut unwritten = 0;
        for slot in loaded {
            let catalog = match slot {
                Loaded::Catalog(catalog) => catalog,
                Loaded::Unreadable(e) => {
                    reports.push(CatalogReport::unreadable(&e));
                    continue;
                }
            };

            let plan = planner.plan(&catalog, &lookups);
            let report = CatalogReport::from_plan(&catalog, &plan);

            if self.cancel.is_cancelled() {
                unwritten += 1;
                reports.push(report.cancelled());
                continue;
            }

            let report = match CatalogWriter::write_updates(&catalog, &plan, &self.config.output_directory) {
                Ok(output) => report.with_output(output),
                Err(e) => {
                    warn!(catalog = %catalog.name, error = %e, "catalog not written");
                    report.write_failed(&e)
                }
            };
            reports.push(report);
        }

        if unwritten > 0 {
            warn!(unwritten, "run cancelled; remaining catalogs not written");
            return Report::aborted(reports, &UpdateError::Cancelled);
        }

        let report = Report::completed(reports);
        info!(
            status = ?report.status,
            catalogs = report.catalogs.len(),
            updates = report.total_updates(),
            "update run finished"
        );
        report
    }

    /// Reads every catalog. Fails only when the directory cannot be scanned.
    fn load_catalogs(&self) -> Result<Vec<Loaded>> {
        let reader = CatalogReader::new(self.config.reference_policy)
            .excluding(&self.config.output_directory);

        Ok(reader
            .parse_directory(&self.config.catalogs_directory)?
            .into_iter()
            .map(|load| match load {
                Ok(catalog) => Loaded::Catalog(catalog),
                Err(e) => Loaded::Unreadable(e),
            })
            .collect())
    }

    /// Looks every coordinate up once. Completion order is irrelevant: the
    /// results are keyed by coordinate.
    async fn lookup_all(&self, coordinates: BTreeSet<ModuleCoordinate>) -> HashMap<ModuleCoordinate, Lookup> {
        let parallelism = self.config.effective_parallelism(coordinates.len());
        let progress = LookupProgress::new(coordinates.len(), self.config.show_progress);
        debug!(lookups = coordinates.len(), parallelism, "looking up versions");

        let repositories = &self.repositories;
        let cancel = &self.cancel;

        let lookups = stream::iter(coordinates)
            .map(|coordinate| async move {
                if cancel.is_cancelled() {
                    return (coordinate, Err(LookupFailure::Cancelled));
                }

                let lookup = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(LookupFailure::Cancelled),
                    listed = repositories.list_versions(&coordinate) => listed.map_err(|e| {
                        warn!(%coordinate, error = %e, "version lookup failed");
                        match e {
                            UpdateError::RepositoryUnavailable { details, .. } => {
                                LookupFailure::Unavailable(details)
                            }
                            other => LookupFailure::Unavailable(other.to_string()),
                        }
                    }),
                };
                (coordinate, lookup)
            })
            .buffer_unordered(parallelism)
            .inspect(|(coordinate, _)| progress.lookup_finished(&coordinate.to_string()))
            .collect::<HashMap<_, _>>()
            .await;

        progress.finish();
        lookups
    }
}

/// Runs one update with the repositories named in `config`.
pub async fn run_update(config: UpdateConfig) -> Report {
    match CatalogUpdater::new(config) {
        Ok(updater) => updater.run().await,
        Err(e) => Report::aborted(Vec::new(), &e),
    }
}
