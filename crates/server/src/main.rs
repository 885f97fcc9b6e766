use anyhow::Context;
use clap::Parser;
use fairq_adapters::AppConfig;
use fairq_application::RecalculationScheduler;
use fairq_core::{Generation, RankEntry};
use std::time::Duration;
use tracing::info;

use fairq_server::bootstrap::{initialize, log_config_summary, ServerComponents};
use fairq_server::shutdown::install_shutdown_handler;
use fairq_server::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "fairq")]
#[command(version)]
#[command(about = "Fair-share tenant ranking for a shared job queue")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create the job and rank tables
    InitSchema,

    /// Recompute tenant ranks and publish them as a new generation
    Recalculate {
        /// Generation to publish (defaults to the current UNIX time)
        #[arg(long)]
        generation: Option<i64>,
    },

    /// Print the ranks of the current generation
    Ranks {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete rank rows of superseded generations
    Cleanup,

    /// Recalculate periodically until SIGINT or SIGTERM
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging)?;
    log_config_summary(&config);

    let components = initialize(config).await?;

    match args.command {
        Commands::InitSchema => components.init_schema().await?,
        Commands::Recalculate { generation } => {
            let entries = components
                .service
                .recalculate(generation.map(Generation::new))
                .await?;
            info!(tenants = entries.len(), "Recalculation complete");
        }
        Commands::Ranks { json } => {
            let generation = components.service.current_generation().await?;
            let mut entries = components.service.current_ranks().await?;
            entries.sort_by(|a, b| {
                b.rank
                    .cmp(&a.rank)
                    .then_with(|| a.tenant_key.cmp(&b.tenant_key))
            });
            print_ranks(generation, &entries, json)?;
        }
        Commands::Cleanup => {
            let deleted = components.service.cleanup().await?;
            info!(deleted, "Cleanup complete");
        }
        Commands::Run => run(components).await,
    }

    Ok(())
}

async fn run(components: ServerComponents) {
    let fairness = &components.config.fairness;
    let scheduler = RecalculationScheduler::new(
        components.service.clone(),
        Duration::from_secs(fairness.recalculate_interval_secs),
        fairness.cleanup_after_recalculate,
    );

    let shutdown = install_shutdown_handler();
    scheduler.run(shutdown).await;
    info!("Shutdown complete");
}

fn print_ranks(generation: Generation, entries: &[RankEntry], json: bool) -> anyhow::Result<()> {
    if json {
        let output = serde_json::json!({
            "generation": generation,
            "ranks": entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Generation: {}", generation);
    if entries.is_empty() {
        println!("No ranks.");
        return Ok(());
    }

    println!("{:<32} {:>8} {:>8} {:>12}", "TENANT", "BUSY", "WAITING", "RANK");
    println!("{}", "-".repeat(63));
    for entry in entries {
        println!(
            "{:<32} {:>8} {:>8} {:>12}",
            entry.tenant_key.as_str(),
            entry.busy,
            entry.waiting,
            entry.rank
        );
    }
    Ok(())
}
