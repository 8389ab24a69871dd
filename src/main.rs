use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use blockfetch::config::{Config, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "blockfetch")]
#[command(about = "Authenticated block-framed file retrieval client", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user with the server
    Register {
        /// Username (will prompt if not provided)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Retrieve one or more files
    Get {
        /// Paths of the files on the server
        #[arg(required = true)]
        paths: Vec<String>,

        /// Username (will prompt if not provided)
        #[arg(short, long)]
        username: Option<String>,

        /// Register the user before requesting files
        #[arg(long)]
        register: bool,

        /// Directory to save files into (overrides the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configure logging based on verbose flag
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
        log::info!("Verbose logging enabled");
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("could not load configuration from {:?}", cli.config))?;
    log::debug!("Server at {}:{}", config.server.host, config.server.port);

    match cli.command {
        Commands::Register { username } => {
            blockfetch::commands::register::run(config, username).await?;
        }
        Commands::Get { paths, username, register, output_dir } => {
            blockfetch::commands::get::run(config, username, paths, register, output_dir).await?;
        }
    }

    Ok(())
}
