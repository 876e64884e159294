//! EntiModel CLI
//!
//! Command-line driver for the model evolution engine.
//!
//! # Commands
//!
//! - `sync` - Merge a JSON schema into the model file
//! - `inspect` - Display the entities and identifiers of a model file
//! - `verify` - Validate a model file
//! - `uid` - Print a uid that is unused in the model file

mod commands;
mod schema;

use clap::{Parser, Subcommand};
use entimodel_core::DEFAULT_MODEL_FILE;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EntiModel command-line tools.
#[derive(Parser)]
#[command(name = "entimodel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the model JSON file
    #[arg(global = true, short, long, default_value = DEFAULT_MODEL_FILE)]
    model: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a JSON schema into the model file
    Sync {
        /// Path to the JSON schema description
        #[arg(short, long)]
        schema: PathBuf,

        /// Fixed seed for uid generation
        #[arg(long)]
        seed: Option<u64>,

        /// User document version to stamp on the model
        #[arg(long)]
        doc_version: Option<u32>,

        /// Fail instead of creating a missing model file
        #[arg(long)]
        no_create: bool,
    },

    /// Display the entities and identifiers of a model file
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate a model file
    Verify,

    /// Print a uid that is unused in the model file
    Uid {
        /// Fixed seed for uid generation
        #[arg(long)]
        seed: Option<u64>,
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
            schema,
            seed,
            doc_version,
            no_create,
        } => {
            commands::sync::run(&cli.model, &schema, seed, doc_version, !no_create)?;
        }
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.model, &format)?;
        }
        Commands::Verify => {
            commands::verify::run(&cli.model)?;
        }
        Commands::Uid { seed } => {
            commands::uid::run(&cli.model, seed)?;
        }
        Commands::Version => {
            println!("EntiModel CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntiModel Core v{}", entimodel_core::VERSION);
            println!(
                "Model format v{} (reads v{} and later)",
                entimodel_core::MODEL_VERSION,
                entimodel_core::MIN_MODEL_VERSION
            );
        }
    }

    Ok(())
}
