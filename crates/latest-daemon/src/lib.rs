//! catalog2latest daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, once, package, cursor, show)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, CursorCommands};
pub use commands::{
    init_logging, load_settings, process_package, run_once, run_service, set_cursor,
    show_cursor, show_document,
};
