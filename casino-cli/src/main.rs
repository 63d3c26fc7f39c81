mod commands;
mod config;

use casino_core::LedgerError;
use casino_games::{Casino, GameError};
use clap::{Parser, Subcommand};
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "casino")]
#[command(about = "Group wagering engine - card duel, dice gate and coin flip")]
#[command(version)]
struct Cli {
    /// Data directory for the ledger database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group registration and settings
    #[command(subcommand)]
    Group(commands::GroupCommands),

    /// Balances, history and transfers
    #[command(subcommand)]
    Balance(commands::BalanceCommands),

    /// Privileged balance adjustments
    #[command(subcommand)]
    Admin(commands::AdminCommands),

    /// Play a round
    #[command(subcommand)]
    Play(commands::PlayCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = CliConfig::new(cli.data_dir, cli.config, cli.verbose);

    // Initialize logging
    let log_level = if settings.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "casino={},casino_core={},casino_games={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Ensure data directory exists
    tokio::fs::create_dir_all(&settings.data_dir).await?;

    let casino_config = settings.casino_config()?;
    let casino = Casino::open(&settings.data_dir, casino_config).await?;
    let expired = casino.expire_idle_duels().await?;
    if expired > 0 {
        tracing::info!("Closed {} idle card duels", expired);
    }

    // Execute command
    let result = match cli.command {
        Commands::Group(cmd) => commands::handle_group_command(cmd, &casino).await,
        Commands::Balance(cmd) => commands::handle_balance_command(cmd, &casino).await,
        Commands::Admin(cmd) => commands::handle_admin_command(cmd, &casino).await,
        Commands::Play(cmd) => commands::handle_play_command(cmd, &casino).await,
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn report(e: &anyhow::Error) {
    let ledger_error = match e.downcast_ref::<GameError>() {
        Some(GameError::Ledger(inner)) => Some(inner),
        Some(game_error) => {
            eprintln!("Error [{}]: {}", game_error.code(), game_error);
            return;
        }
        None => e.downcast_ref::<LedgerError>(),
    };

    match ledger_error {
        Some(LedgerError::InsufficientFunds { need, available }) => {
            eprintln!("Error: Insufficient funds");
            eprintln!("Need: {}, Available: {}", need, available);
        }
        Some(inner) => eprintln!("Error [{}]: {}", inner.code(), inner),
        None => eprintln!("Error: {:#}", e),
    }
}
