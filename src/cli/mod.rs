//! CLI module for reya-oi
//!
//! Clap-based command-line interface. The bare invocation fetches a fresh
//! snapshot, writes the CSV, and prints the lowest-oiCap table; `serve`
//! switches to the local web UI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

use crate::data_paths::{DataPaths, DEFAULT_DATA_DIR};
use crate::logging::{self, LoggingConfig};

use commands::fetch::{FetchArgs, FetchCommand};
use commands::serve::{ServeArgs, ServeCommand};

#[derive(Parser)]
#[command(name = "reya-oi")]
#[command(version)]
#[command(about = "Export Reya market OI caps to CSV and serve them locally", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory path (default: ./data)
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the latest snapshot, save the CSV, print the lowest-oiCap table
    Fetch(FetchArgs),

    /// Serve the snapshot through a local web UI and JSON API
    Serve(ServeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let data_paths = DataPaths::new(&self.data_dir);
        data_paths.ensure_directories()?;

        logging::init_logging(LoggingConfig::new(data_paths.clone(), self.verbose))?;

        match self.command {
            Some(Commands::Fetch(args)) => FetchCommand::new(args).execute(data_paths).await,
            Some(Commands::Serve(args)) => ServeCommand::new(args).execute(data_paths).await,
            // Bare invocation behaves like `fetch` with defaults.
            None => FetchCommand::new(FetchArgs::default()).execute(data_paths).await,
        }
    }
}
