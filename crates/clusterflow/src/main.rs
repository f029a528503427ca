mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cflow")]
#[command(about = "Inspect and manage clusterflow cluster documents", long_about = None)]
struct Cli {
    /// Directory holding the cluster documents
    #[arg(long, global = true, env = "CLUSTERFLOW_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored clusters
    List,
    /// Print a cluster document as JSON
    Get {
        /// Cluster name
        name: String,
    },
    /// Check a stored cluster document
    Validate {
        /// Cluster name
        name: String,
    },
    /// Remove a stored cluster document (cloud resources are left alone)
    Delete {
        /// Cluster name
        name: String,
        /// Skip the confirmation guard
        #[arg(short, long)]
        yes: bool,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, documents to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // version needs no settings
    if matches!(cli.command, Commands::Version) {
        println!("clusterflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = clusterflow_config::load_settings()?;
    let state_dir = cli.state_dir.unwrap_or_else(|| settings.state_dir());
    tracing::debug!("Using state directory {}", state_dir.display());

    match cli.command {
        Commands::List => commands::list::handle(&state_dir).await?,
        Commands::Get { name } => commands::get::handle(&state_dir, &name).await?,
        Commands::Validate { name } => commands::validate::handle(&state_dir, &name).await?,
        Commands::Delete { name, yes } => {
            commands::delete::handle(&state_dir, &name, yes, &settings).await?
        }
        Commands::Version => unreachable!("Version is handled before settings are loaded"),
    }

    Ok(())
}
