//! JSON-T CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "jsont")]
#[command(version)]
#[command(about = "Render JSON-T templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template against JSON data
    Render {
        /// Template file
        template: PathBuf,

        /// JSON data file (defaults to an empty object)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// JSON file mapping partial names to template text
        #[arg(short, long)]
        partials: Option<PathBuf>,

        /// Record errors and keep rendering instead of stopping at the first
        #[arg(long)]
        safe: bool,

        /// Write output to FILE instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a template and report syntax errors
    Check {
        /// Template file
        template: PathBuf,

        /// Print the canonical form of the compiled template
        #[arg(long)]
        repr: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jsont=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            data,
            partials,
            safe,
            output,
        } => commands::render::execute(commands::render::RenderArgs {
            template,
            data,
            partials,
            safe,
            output,
        }),
        Commands::Check { template, repr } => {
            commands::check::execute(commands::check::CheckArgs { template, repr })
        }
    }
}
