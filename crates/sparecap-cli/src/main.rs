use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "sparecap",
    about = "sparecap: spare host capacity analysis and rebalancing",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to sparecap.toml (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the smallest set of hosts whose loss cannot be absorbed
    Check {
        /// Node inventory JSON file
        #[arg(short, long)]
        inventory: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Check whether losing exactly the given hosts can be absorbed
    Remove {
        #[arg(short, long)]
        inventory: PathBuf,
        /// Hostnames to remove
        #[arg(required = true)]
        hosts: Vec<String>,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Find the shortest mitigation for zero spare capacity, without
    /// executing it
    Mitigate {
        #[arg(short, long)]
        inventory: PathBuf,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Run the maintainer loop with a dry-run executor that logs moves.
    ///
    /// The inventory file is re-read on every pass.
    Run {
        #[arg(short, long)]
        inventory: PathBuf,
        /// Time between passes, e.g. "20m" (overrides the config file)
        #[arg(long)]
        interval: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sparecap=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { inventory, format } => commands::check::check(&config, &inventory, &format),
        Commands::Remove {
            inventory,
            hosts,
            format,
        } => commands::check::remove(&config, &inventory, &hosts, &format),
        Commands::Mitigate { inventory, format } => {
            commands::mitigate::mitigate(&config, &inventory, &format).await
        }
        Commands::Run { inventory, interval } => {
            commands::run::run(&config, &inventory, interval.as_deref()).await
        }
    }
}
