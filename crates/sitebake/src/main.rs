//! sitebake CLI - build, serve and prerender a single-page application.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "sitebake")]
#[command(about = "Build, serve and prerender a single-page application")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to sitebake.toml config file
    #[arg(short, long, default_value = "sitebake.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle the site, start the preview server, prerender all routes, stop the server
    Build,

    /// Prerender all routes from an already running preview server
    Prerender,

    /// Print the routes that would be prerendered
    Routes,

    /// Serve built output, falling back to index.html for client-side routes
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4173")]
        port: u16,

        /// Directory to serve (defaults to the prerender output directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Open browser
        #[arg(long)]
        open: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = config::load_config(&cli.config)?;

    // Execute command
    match cli.command {
        Commands::Build => {
            commands::build::run(&cli.config, &config).await?;
        }
        Commands::Prerender => {
            commands::prerender::run(&config).await?;
        }
        Commands::Routes => {
            commands::routes::run(&config)?;
        }
        Commands::Serve { port, dir, open } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(&config.prerender.output));
            commands::serve::run(port, dir, open).await?;
        }
    }

    Ok(())
}
