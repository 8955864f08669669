//! tracekb CLI
//!
//! Offline administration of tracekb stores.
//!
//! # Commands
//!
//! - `list-locks` - List lock-protected resources and whether their lock is held
//! - `sweep-locks` - Release every held lock after a crash
//! - `unlock` - Release the lock of one resource
//!
//! These commands only touch the lock subsystem. Never run `sweep-locks` or
//! `unlock` while a process is using the store.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tracekb store administration.
#[derive(Parser)]
#[command(name = "tracekb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// IRI of the store's root container
    #[arg(global = true, long, default_value = "http://localhost:8001/")]
    root: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List lock-protected resources and their lock state
    ListLocks {
        /// Only show held locks
        #[arg(long)]
        held: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Release every held lock of a crashed store
    SweepLocks {
        /// Dry run - show which locks would be released
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Release the lock of one resource
    Unlock {
        /// IRI of the resource, absolute or relative to the root
        uri: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the default level.
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::ListLocks { held, format } => {
            let path = cli.path.ok_or("Store path required for list-locks")?;
            commands::locks::list(&path, &cli.root, held, &format)?;
        }
        Commands::SweepLocks { dry_run } => {
            let path = cli.path.ok_or("Store path required for sweep-locks")?;
            commands::locks::sweep(&path, &cli.root, dry_run)?;
        }
        Commands::Unlock { uri } => {
            let path = cli.path.ok_or("Store path required for unlock")?;
            commands::locks::unlock(&path, &cli.root, &uri)?;
        }
        Commands::Version => {
            println!("tracekb CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
