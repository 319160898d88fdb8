//! Engram CLI - management tool for the engram memory store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use engram::MemorySystem;
use engram::config::EngramConfig;
use engram::embedding::HashEmbedder;
use engram_cli::commands::{CompressCommand, MemoryCommand, ProfileCommand, StatsCommand};
use engram_cli::error::CliResult;
use engram_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "engram")]
#[command(about = "Engram CLI - management tool for the engram memory store")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Memory management commands")]
    Memory(MemoryCommand),

    #[clap(about = "Tombstone low-value memories and rebuild the index")]
    Compress(CompressCommand),

    #[clap(about = "User profile commands")]
    Profile(ProfileCommand),

    #[clap(about = "Show store statistics")]
    Stats(StatsCommand),
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let mut config = EngramConfig::load_or_default(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    let dimension = config.storage.dimension;
    let default_threshold = config.compression.default_threshold;

    let mut system =
        MemorySystem::open(config)?.with_embedder(Box::new(HashEmbedder::new(dimension)))?;

    match &cli.command {
        Command::Memory(cmd) => cmd.execute(&mut system, format),
        Command::Compress(cmd) => cmd.execute(&mut system, default_threshold, format),
        Command::Profile(cmd) => cmd.execute(&mut system, format),
        Command::Stats(cmd) => cmd.execute(&system, format),
    }
}
