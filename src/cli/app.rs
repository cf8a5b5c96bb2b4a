use super::commands::config::ConfigCommands;
use super::commands::tui::TuiArgs;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fleet-console")]
#[command(about = "A terminal console for monitoring and managing game server fleets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive console (default)
    Tui(TuiArgs),
    /// Show or change the stored configuration
    Config(ConfigCommands),
}
