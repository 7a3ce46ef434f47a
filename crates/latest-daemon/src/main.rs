//! catalog2latest
//!
//! Keeps per-package "latest version" documents in sync with the package
//! catalog.
//!
//! # Usage
//!
//! ```bash
//! catalog2latest run
//! catalog2latest once [--max-pages N]
//! catalog2latest package <ID>
//! catalog2latest cursor show
//! catalog2latest cursor set <TIMESTAMP>
//! catalog2latest show <ID> [--variant latest|latest-stable|latest-prerelease]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/catalog2latest/config.toml)
//! 3. Environment variables (CATALOG2LATEST_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use latest_daemon::{
    init_logging, load_settings, process_package, run_once, run_service, set_cursor,
    show_cursor, show_document, Cli, Commands, CursorCommands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let max_pages = match &cli.command {
        Commands::Once { max_pages } => *max_pages,
        _ => None,
    };
    let settings = load_settings(&cli, max_pages)?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Run => {
            run_service(settings).await?;
        }
        Commands::Once { .. } => match run_once(settings).await? {
            Some(result) => {
                println!(
                    "Pass complete: {} pages, {} events, {} packages enqueued, {} processed",
                    result.pages,
                    result.events,
                    result.enqueued,
                    result.processed()
                );
                match result.new_cursor {
                    Some(cursor) => println!("Cursor advanced to {}", cursor.to_rfc3339()),
                    None => println!("Cursor unchanged"),
                }
            }
            None => println!("Pass cancelled, cursor unchanged"),
        },
        Commands::Package { package_id } => {
            let outcome = process_package(settings, &package_id).await?;
            println!("{}: {:?}", package_id, outcome);
        }
        Commands::Cursor { command } => match command {
            CursorCommands::Show => match show_cursor(&settings).await? {
                Some(cursor) => println!("{}", cursor.to_rfc3339()),
                None => println!(
                    "No cursor (first pass starts at {})",
                    settings.default_min_cursor.to_rfc3339()
                ),
            },
            CursorCommands::Set { timestamp } => {
                let cursor = set_cursor(&settings, &timestamp).await?;
                println!("Cursor set to {}", cursor.to_rfc3339());
            }
        },
        Commands::Show {
            package_id,
            variant,
        } => match show_document(&settings, &package_id, &variant).await? {
            Some(document) => println!("{}", serde_json::to_string_pretty(&document)?),
            None => println!("No {} document for {}", variant, package_id),
        },
    }

    Ok(())
}
