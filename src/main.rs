use anyhow::Result;
use clap::Parser;
use log::info;

use fleet_console::cli::commands::{TuiArgs, config_command, tui_command};
use fleet_console::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("fleet-console.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    info!("Starting fleet-console");

    match cli.command {
        Some(Commands::Config(args)) => config_command(args).await?,
        Some(Commands::Tui(args)) => tui_command(args).await?,
        None => tui_command(TuiArgs::default()).await?,
    }

    Ok(())
}
