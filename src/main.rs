use anyhow::Context;
use catalog_updater::cli::{Cli, OutputFormat};
use catalog_updater::config::{LayeredConfig, UpdateConfig};
use catalog_updater::orchestrator::CatalogUpdater;
use clap::Parser;
use colored::Colorize;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout only carries the report.
fn init_logging(verbose: bool) {
    let default = if verbose { "catalog_updater=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let layers = LayeredConfig::for_project(&cli.project_dir)
        .context("failed to read project configuration")?;
    let config = UpdateConfig::resolve(&cli.project_dir, &layers, cli.overrides())?;

    if cli.verbose {
        eprintln!("Catalogs: {}", config.catalogs_directory.display());
        eprintln!("Output:   {}", config.output_directory.display());
        for repo in &config.repositories {
            eprintln!("   • {} ({})", repo.name.bright_cyan(), repo.url.dimmed());
        }
    }

    let updater = CatalogUpdater::new(config)?;

    let cancel = updater.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, cancelling run");
            cancel.cancel();
        }
    });

    let report = updater.run().await;

    let mut stdout = io::stdout().lock();
    match cli.format {
        OutputFormat::Json => writeln!(stdout, "{}", report.to_json()?)?,
        OutputFormat::Text => write!(stdout, "{}", report.render_text())?,
    }
    stdout.flush()?;

    Ok(ExitCode::from(report.exit_code()))
}
