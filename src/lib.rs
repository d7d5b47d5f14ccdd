//! catalog-updater - proposes version updates for Gradle version catalogs
//!
//! The source catalogs are only ever read. Proposed catalogs are written to
//! a separate output directory together with a report of every entry's
//! outcome.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod gradle;
pub mod maven;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod repository;
pub mod update;
pub mod utils;

pub use config::UpdateConfig;
pub use error::{Result, UpdateError};
pub use orchestrator::{CatalogUpdater, run_update};
pub use report::{Outcome, Report, RunStatus};
