//! Resheet CLI
//!
//! Reshapes tabular files: assembles CSV inputs into one dataset and
//! projects it into sheet artifacts, both driven by JSON configs.

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Resheet - config-driven reshaping of tabular files
#[derive(Parser)]
#[command(name = "resheet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configs, assemble the inputs, and write every output file
    Run {
        /// Path to the input config
        input_config: String,

        /// Path to the output config
        output_config: String,

        /// Directory the input files are read from
        #[arg(long, default_value = "input_files")]
        input_dir: String,

        /// Directory the output files are written under
        #[arg(long, default_value = "output_files")]
        output_dir: String,
    },

    /// Validate both configs without reading or writing any data
    Validate {
        /// Path to the input config
        input_config: String,

        /// Path to the output config
        output_config: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Run { input_config, output_config, input_dir, output_dir } => {
            commands::run::run(&input_config, &output_config, &input_dir, &output_dir)
        }
        Commands::Validate { input_config, output_config } => {
            commands::validate::run(&input_config, &output_config)
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
