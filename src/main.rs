mod import;
mod init;
mod preview;
mod run;
mod status;

use clap::{Parser, Subcommand};
use disparo_core::config;

#[derive(Parser)]
#[command(
    name = "disparo",
    version,
    about = "Disparo — paced WhatsApp lead-message dispatcher"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup: generate config.toml.
    Init,
    /// Import a JSON contact list into the store as a new batch.
    Import {
        /// Path to the contacts JSON file.
        file: String,
        /// Batch name.
        #[arg(short, long)]
        name: String,
    },
    /// Send a batch (or an ad-hoc contact file) through the gateway.
    Run {
        /// Batch id in the store.
        #[arg(long, conflicts_with = "file")]
        batch: Option<String>,
        /// Contacts JSON file for an in-memory run.
        #[arg(long)]
        file: Option<String>,
        /// Fixed seconds between records, overriding the config.
        #[arg(long, conflicts_with = "rand")]
        interval: Option<u64>,
        /// Random interval range in seconds, e.g. 10,50.
        #[arg(long)]
        rand: Option<String>,
    },
    /// Resume the most recently interrupted operation.
    Resume,
    /// Show batches and their send tallies.
    Status {
        /// Limit output to one batch.
        #[arg(long)]
        batch: Option<String>,
    },
    /// Render messages for pending records without sending anything.
    Preview {
        /// Batch id in the store.
        #[arg(long)]
        batch: String,
        /// How many pending records to render.
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.app.log_level.clone())),
        )
        .init();

    match cli.command {
        Commands::Init => init::run().await,
        Commands::Import { file, name } => import::run(&cfg, &file, &name).await,
        Commands::Run {
            batch,
            file,
            interval,
            rand,
        } => {
            run::run(
                &cfg,
                run::RunArgs {
                    batch,
                    file,
                    interval,
                    rand,
                },
            )
            .await
        }
        Commands::Resume => run::resume(&cfg).await,
        Commands::Status { batch } => status::run(&cfg, batch.as_deref()).await,
        Commands::Preview { batch, limit } => preview::run(&cfg, &batch, limit).await,
    }
}
