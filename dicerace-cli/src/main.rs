mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dicerace")]
#[command(about = "Turn-based dice race with simulated players")]
#[command(version)]
struct Cli {
    /// Data directory for the game log, scoreboard and result files
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the defaults or a config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GameArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Minimum players needed to start
    #[arg(long)]
    min: Option<usize>,
    /// Maximum players (capacity)
    #[arg(long)]
    max: Option<usize>,
    /// Winning position
    #[arg(long)]
    target: Option<u32>,
    /// Seconds to wait for late arrivals once the minimum is reached
    #[arg(long)]
    grace_secs: Option<u64>,
    /// Seconds a player may hold the turn without rolling (0 disables)
    #[arg(long)]
    turn_timeout_secs: Option<u64>,
    /// Seed for reproducible dice
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a game with one simulated player per name
    Play {
        /// Player display names
        #[arg(required = true)]
        names: Vec<String>,
        #[command(flatten)]
        game: GameArgs,
    },
    /// Show the cumulative scoreboard
    Scores {
        /// JSON configuration file naming the scoreboard
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        #[command(flatten)]
        game: GameArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "dicerace={},dicerace_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dicerace")
    });

    let result = match cli.command {
        Commands::Play { names, game } => commands::play(&data_dir, &names, &game).await,
        Commands::Scores { config } => commands::show_scores(&data_dir, config.as_deref()).await,
        Commands::Config { game } => commands::show_config(&data_dir, &game),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
