//! gatesync CLI
//!
//! Command-line tools for running gateway synchronization against a JSON
//! snapshot of the management stores.
//!
//! # Commands
//!
//! - `sync` - Run every synchronizer once and print the registries
//! - `inspect` - Print the latest event per entity of one kind
//! - `watch` - Run the scheduler for a while, then shut down

mod commands;

use clap::{Parser, Subcommand};
use commands::{EntityKind, GatewayOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// gatesync command-line tools.
#[derive(Parser)]
#[command(name = "gatesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON snapshot
    #[arg(global = true, short, long)]
    snapshot: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every synchronizer once and print the registries
    Sync {
        /// Environments served by the gateway
        #[arg(short, long = "environment", default_value = "DEFAULT")]
        environments: Vec<String>,

        /// Page size of event log queries
        #[arg(short, long, default_value = "100")]
        bulk_items: usize,

        /// Sharding tags, such as `internal` or `!beta`
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Window start in epoch milliseconds, -1 for a full resync
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        from: i64,

        /// Window end in epoch milliseconds, defaults to now
        #[arg(long)]
        to: Option<i64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Accept pending API debug requests
        #[arg(long)]
        debug_requests: bool,
    },

    /// Print the latest event per entity of one kind
    Inspect {
        /// Entity kind
        #[arg(short, long, value_enum)]
        kind: EntityKind,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the scheduler for a while, then shut down
    Watch {
        /// Environments served by the gateway
        #[arg(short, long = "environment", default_value = "DEFAULT")]
        environments: Vec<String>,

        /// Page size of event log queries
        #[arg(short, long, default_value = "100")]
        bulk_items: usize,

        /// Sharding tags, such as `internal` or `!beta`
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Delay between two runs of a synchronizer
        #[arg(short, long, default_value = "5000")]
        interval_ms: u64,

        /// How long to run before shutting down
        #[arg(short, long, default_value = "30000")]
        duration_ms: u64,

        /// Accept pending API debug requests
        #[arg(long)]
        debug_requests: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync {
            environments,
            bulk_items,
            tags,
            from,
            to,
            format,
            debug_requests,
        } => {
            let snapshot = cli.snapshot.ok_or("Snapshot path required for sync")?;
            let options = GatewayOptions {
                environments,
                bulk_items,
                tags,
                interval: None,
                debug_requests,
            };
            commands::sync::run(&snapshot, &options, from, to, &format)?;
        }
        Commands::Inspect { kind, format } => {
            let snapshot = cli.snapshot.ok_or("Snapshot path required for inspect")?;
            commands::inspect::run(&snapshot, kind, &format)?;
        }
        Commands::Watch {
            environments,
            bulk_items,
            tags,
            interval_ms,
            duration_ms,
            debug_requests,
        } => {
            let snapshot = cli.snapshot.ok_or("Snapshot path required for watch")?;
            let options = GatewayOptions {
                environments,
                bulk_items,
                tags,
                interval: Some(Duration::from_millis(interval_ms)),
                debug_requests,
            };
            commands::watch::run(&snapshot, &options, Duration::from_millis(duration_ms))?;
        }
        Commands::Version => {
            println!("gatesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
