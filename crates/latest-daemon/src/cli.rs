//! CLI argument parsing for catalog2latest.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// catalog2latest
///
/// Projects the package catalog into per-package "latest" documents.
#[derive(Parser, Debug)]
#[command(name = "catalog2latest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/catalog2latest/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the service index URL
    #[arg(long, global = true)]
    pub service_index_url: Option<String>,

    /// Override the blob storage directory
    #[arg(long, global = true)]
    pub storage_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run passes continuously until interrupted
    Run,

    /// Run a single pass and exit
    Once {
        /// Read at most this many catalog pages
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Recompute one package's documents now
    Package {
        /// Package identifier
        package_id: String,
    },

    /// Inspect or reset the resumption cursor
    Cursor {
        #[command(subcommand)]
        command: CursorCommands,
    },

    /// Print a stored document
    Show {
        /// Package identifier
        package_id: String,

        /// Document to print (latest, latest-stable, latest-prerelease)
        #[arg(short, long, default_value = "latest")]
        variant: String,
    },
}

/// Cursor subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CursorCommands {
    /// Print the persisted cursor
    Show,

    /// Overwrite the cursor with an RFC 3339 timestamp
    Set {
        /// e.g. 2024-01-01T00:00:00Z
        timestamp: String,
    },
}
