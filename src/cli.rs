use crate::config::ConfigOverrides;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "catalog-updater",
    about = "Proposes version updates for Gradle version catalogs without modifying them",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Directory scanned for *.versions.toml catalogs [default: gradle]
    #[arg(long, value_name = "DIR")]
    pub catalogs_dir: Option<PathBuf>,

    /// Directory receiving the proposed catalogs [default: gradle/updates]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Reject versions carrying this qualifier (repeatable, replaces the defaults)
    #[arg(long = "reject-qualifier", value_name = "QUALIFIER")]
    pub reject_qualifiers: Vec<String>,

    /// Never update this module (group:artifact, repeatable)
    #[arg(long = "ignore", value_name = "GROUP:ARTIFACT")]
    pub ignore: Vec<String>,

    /// Allow versions with a different leading version segment
    #[arg(long)]
    pub allow_major_updates: bool,

    /// Maven repository URL, in priority order (repeatable)
    #[arg(long = "repository", value_name = "URL")]
    pub repositories: Vec<String>,

    /// Maximum concurrent version lookups
    #[arg(long, value_name = "N")]
    pub parallelism: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Abort the whole run when any catalog is malformed
    #[arg(long)]
    pub fail_fast: bool,

    /// Let different modules share one version reference
    #[arg(long)]
    pub allow_mixed_references: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Flags given on the command line; unset flags defer to the other
    /// configuration layers.
    pub fn overrides(&self) -> ConfigOverrides {
        let non_empty = |values: &Vec<String>| (!values.is_empty()).then(|| values.clone());

        ConfigOverrides {
            catalogs_directory: self.catalogs_dir.clone(),
            output_directory: self.output_dir.clone(),
            rejected_qualifiers: non_empty(&self.reject_qualifiers),
            ignored_modules: non_empty(&self.ignore),
            allow_major_updates: self.allow_major_updates.then_some(true),
            repositories: non_empty(&self.repositories),
            parallelism: self.parallelism,
            timeout_seconds: self.timeout,
            fail_on_catalog_error: self.fail_fast.then_some(true),
            allow_mixed_references: self.allow_mixed_references.then_some(true),
            show_progress: !self.no_progress && self.format == OutputFormat::Text,
        }
    }
}
