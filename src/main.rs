//! Arbor CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Continuously-updated code knowledge index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Root of the source tree to index (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the tree once and exit
    Index,
    /// Index the tree, then watch it for changes until interrupted
    Watch {
        /// Debounce window in milliseconds
        #[arg(long, default_value_t = 100)]
        debounce_ms: u64,
    },
    /// Semantic search over indexed code
    Search {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Trace a call chain between two functions (IDs or names)
    Trace { from: String, to: String },
    /// Look up nodes by name substring
    Lookup { name: String },
    /// List nodes extracted from one file
    File { path: String },
    /// List direct callers of a node
    Callers { node: String },
    /// List direct callees of a node
    Callees { node: String },
    /// List transitive dependencies of a node
    Deps {
        node: String,
        /// BFS depth (0 uses the default of 3)
        #[arg(short, long, default_value_t = 0)]
        depth: i32,
    },
    /// Print index statistics as JSON
    Status,
    /// Delete the index database
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("arbor={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Arbor v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Root: {}", cli.root.display());

    match cli.command {
        Commands::Index => commands::index(cli.root).await,
        Commands::Watch { debounce_ms } => commands::watch(cli.root, debounce_ms).await,
        Commands::Search { query, limit } => commands::search(cli.root, query, limit).await,
        Commands::Trace { from, to } => commands::trace(cli.root, from, to).await,
        Commands::Lookup { name } => commands::lookup(cli.root, name).await,
        Commands::File { path } => commands::file(cli.root, path).await,
        Commands::Callers { node } => commands::callers(cli.root, node).await,
        Commands::Callees { node } => commands::callees(cli.root, node).await,
        Commands::Deps { node, depth } => commands::deps(cli.root, node, depth).await,
        Commands::Status => commands::status(cli.root).await,
        Commands::Clear => commands::clear(cli.root),
    }
}
