//! clinitx CLI
//!
//! Command-line tools for processing FHIR-style bundles.
//!
//! # Commands
//!
//! - `submit` - Process a transaction or batch bundle against a fresh store
//! - `rewrite` - Resolve placeholder references in one resource
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::submit::{Backend, SubmitOptions};
use commands::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// clinitx bundle processing tools.
#[derive(Parser)]
#[command(name = "clinitx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a bundle and print the response bundle
    Submit {
        /// Path to the bundle JSON file
        file: PathBuf,

        /// Store backend
        #[arg(short, long, value_enum, default_value_t = Backend::Memory)]
        backend: Backend,

        /// Base URL prefixed to response fullUrls
        #[arg(long)]
        base_url: Option<String>,

        /// Reject updates of resources that do not exist
        #[arg(long)]
        no_update_create: bool,

        /// Transaction timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Resolve placeholder references in a resource
    Rewrite {
        /// Path to the resource JSON file
        file: PathBuf,

        /// Mapping placeholder=Type/id[@version], repeatable
        #[arg(short, long = "map")]
        maps: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Submit {
            file,
            backend,
            base_url,
            no_update_create,
            timeout_ms,
            format,
        } => {
            let options = SubmitOptions {
                backend,
                base_url,
                update_creates: !no_update_create,
                timeout_ms,
            };
            commands::submit::run(&file, &options, format)?;
        }
        Commands::Rewrite { file, maps, format } => {
            commands::rewrite::run(&file, &maps, format)?;
        }
        Commands::Version => {
            println!("clinitx CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("clinitx Core v{}", clinitx_core::VERSION);
        }
    }

    Ok(())
}
