//! Binary entry point for the cindersweep CLI.
//!
//! The process is a best-effort batch job: individual volume and backup
//! failures are logged, counted, and reported, never surfaced as a non-zero
//! exit status.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cindersweep::{
    OpenStackBackend, OpenStackConfig, Poller, RunConfig, RunOrchestrator, SmtpReporter, logging,
};

#[derive(Debug, Parser)]
#[command(
    name = "cindersweep",
    about = "Create volume backups, retire old ones, and email a summary"
)]
struct Cli {
    /// Path to the YAML plan configuration.
    #[arg(short = 'c', long, value_name = "PATH", default_value = "config.yaml")]
    config: PathBuf,
    /// Append log output to this file in addition to the console.
    #[arg(short = 'l', long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Log level or tracing filter directive.
    #[arg(short = 'L', long, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Poll interval in seconds.
    #[arg(short = 'p', long, value_name = "SECONDS", default_value_t = 1)]
    poll: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::init(cli.log_level.as_deref(), cli.log_file.as_deref()) {
        eprintln!("{err}");
        return;
    }

    run(&cli).await;
}

/// Loads configuration, builds the backend, and executes one run.
///
/// Setup failures end the run early; they are logged rather than turned into
/// an exit status, matching the tool's batch-job contract.
async fn run(cli: &Cli) {
    let config = match RunConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "could not load run configuration");
            return;
        }
    };

    let backend_config = match OpenStackConfig::load_without_cli_args() {
        Ok(backend_config) => backend_config,
        Err(err) => {
            tracing::error!(error = %err, "could not load backend configuration");
            return;
        }
    };
    let backend = match OpenStackBackend::new(backend_config) {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!(error = %err, "could not initialise backend");
            return;
        }
    };

    let reporter = config.report.clone().map(SmtpReporter::new);
    let poller = Poller::new(Duration::from_secs(cli.poll));
    let orchestrator = RunOrchestrator::new(backend, poller, reporter);
    orchestrator.execute(&config.plan).await;
}
