use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pahm", version, about = "PAHM meditation practice timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a practice session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Inspect or discard the saved recovery record
    Recovery {
        #[command(subcommand)]
        action: commands::recovery::RecoveryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Attention tally utilities
    Tally {
        #[command(subcommand)]
        action: commands::tally::TallyAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PAHM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Recovery { action } => commands::recovery::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Tally { action } => commands::tally::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
