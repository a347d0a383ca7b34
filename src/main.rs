//! # Butterfly-pairs CLI
//!
//! Command-line interface for the butterfly-pairs library.
//! Computes the distance between every ordered pair of locations in a CSV file.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use butterfly_pairs::{
    BatchController, BatchOptions, Credential, OverwriteBehavior, ProviderConfig, ProviderKind,
    RetryPolicy, RunState, DEFAULT_EXPORT_FILE, DEFAULT_OSRM_URL,
};
use clap::Parser;
use log::error;

mod cli;

/// Command-line interface for butterfly-pairs
#[derive(Parser)]
#[command(name = "butterfly-pairs")]
#[command(about = "Pairwise travel distances between locations via OSRM or a matrix service")]
#[command(long_about = "Resolves the distance between every ordered pair of locations in a CSV file:
  butterfly-pairs warehouses.csv                        # Public OSRM, writes Distances_Results.csv
  butterfly-pairs warehouses.csv out.csv --provider matrix --token $TOKEN

Input columns (first match wins):
  name: Склад, Название, Node, Вузол, Name, ID
  latitude: Широта, Lat, Latitude
  longitude: Довгота, Lng, Longitude

While running, type p(ause), r(esume) or s(top) and press Enter.
Ctrl-C stops the batch and still exports the pairs resolved so far.")]
#[command(version = env!("BUTTERFLY_VERSION"))]
struct Cli {
    /// CSV file listing the locations
    input: PathBuf,

    /// Output CSV file
    #[arg(default_value = DEFAULT_EXPORT_FILE)]
    output: PathBuf,

    /// Routing provider: "public-routing" (osrm) or "matrix-service" (matrix)
    #[arg(short, long, default_value = "public-routing")]
    provider: String,

    /// API credential for the matrix service
    #[arg(long, env = "BUTTERFLY_MATRIX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Base URL of the matrix service
    #[arg(long, env = "BUTTERFLY_MATRIX_URL")]
    matrix_url: Option<String>,

    /// Base URL of the OSRM server
    #[arg(long, env = "BUTTERFLY_OSRM_URL", default_value = DEFAULT_OSRM_URL)]
    osrm_url: String,

    /// Delay between two provider calls in milliseconds (provider default if unset)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Retries for a pair after a network error or timeout
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Show what would be computed without contacting the provider
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Force overwrite existing files without prompting
    #[arg(short, long)]
    force: bool,

    /// Never overwrite existing files (fail if destination exists)
    #[arg(long)]
    no_clobber: bool,
}

impl Cli {
    fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig {
            osrm_base_url: self.osrm_url.clone(),
            matrix_base_url: self.matrix_url.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_retries: self.retries,
                ..Default::default()
            },
            ..Default::default()
        };
        if let Some(ms) = self.delay_ms {
            config.osrm_delay = Duration::from_millis(ms);
            config.matrix_delay = Duration::from_millis(ms);
        }
        config
    }

    fn overwrite(&self) -> OverwriteBehavior {
        if self.force {
            OverwriteBehavior::Force
        } else if self.no_clobber {
            OverwriteBehavior::NeverOverwrite
        } else {
            OverwriteBehavior::Prompt
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e:#}");
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    if cli.verbose {
        eprintln!("🦋 Butterfly-pairs v{} starting...", env!("BUTTERFLY_VERSION"));
    }

    if cli.force && cli.no_clobber {
        bail!("--force and --no-clobber cannot be used together");
    }

    let kind: ProviderKind = cli.provider.parse()?;
    let config = cli.provider_config();

    let nodes = butterfly_pairs::read_nodes(&cli.input)
        .with_context(|| format!("Failed to read locations from {}", cli.input.display()))?;
    let pairs = nodes.len() * nodes.len().saturating_sub(1);

    if cli.dry_run {
        eprintln!(
            "🔍 [DRY RUN] {} locations → {pairs} pairs via {kind}, results to {}",
            nodes.len(),
            cli.output.display()
        );
        return Ok(());
    }

    // Settle the output file before spending time on the batch
    butterfly_pairs::check_overwrite_permission(&cli.output, &cli.overwrite())?;

    let provider = butterfly_pairs::build_provider(kind, &config)?;
    let credential = cli.token.as_deref().and_then(Credential::new);

    let progress = Arc::new(cli::ProgressManager::new(
        pairs as u64,
        &format!("🌐 Resolving {pairs} pairs between {} locations via {kind}", nodes.len()),
    ));
    let controller = Arc::new(BatchController::new(progress, BatchOptions::from(&config)));

    controller.load(&nodes).await;
    controller
        .start(Arc::clone(&provider), credential.clone())
        .await
        .context("Cannot start batch")?;

    let control = std::io::stdin().is_terminal().then(|| {
        eprintln!("⌨️  Type p(ause), r(esume) or s(top) and press Enter");
        cli::spawn_stdin_control(Arc::clone(&controller), Arc::clone(&provider), credential)
    });

    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n⏹️  Interrupted, stopping after the current pair...");
                controller.stop();
            }
        })
    };

    let mut state = controller.wait().await;
    interrupt.abort();
    if let Some(control) = control {
        control.abort();
        let _ = control.await;
        // A command applied just before the abort may have started another loop
        if !controller.run_state().is_terminal() {
            controller.stop();
        }
        state = controller.wait().await;
    }

    let snapshot = controller.snapshot();
    eprintln!(
        "📊 {} of {} pairs resolved ({state})",
        snapshot.done_count(),
        snapshot.tasks.len()
    );
    if state == RunState::Stopped {
        eprintln!("   Stopped at pair {} of {}", snapshot.checkpoint + 1, snapshot.tasks.len());
    }

    if !controller.can_export() {
        bail!("No calculated data to export");
    }

    // Permission was settled above
    butterfly_pairs::write_csv(&controller.export_rows(), &cli.output, &OverwriteBehavior::Force)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    eprintln!("📁 Saved to: {}", cli.output.display());

    Ok(())
}
