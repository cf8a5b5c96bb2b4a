//! `fleet-console config` subcommands

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;

use crate::config::{Config, TOKEN_ENV, URL_ENV};

#[derive(Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show the current configuration
    Show,
    /// Set the backend WebSocket URL
    SetUrl {
        /// ws:// URL of the fleet backend
        url: String,
    },
    /// Store the session token used to sign in
    SetToken {
        /// Opaque session token
        token: String,
        /// Operator name shown in the console header
        #[arg(short, long)]
        username: Option<String>,
    },
}

pub async fn config_command(args: ConfigCommands) -> Result<()> {
    let mut config = Config::load()?;

    match args.command {
        ConfigSubcommands::Show => show_config(&config),
        ConfigSubcommands::SetUrl { url } => {
            config.set_backend_url(url.clone())?;
            config.save()?;
            println!("{} Backend URL set to {}", "✓".bright_green().bold(), url.cyan());
        }
        ConfigSubcommands::SetToken { token, username } => {
            config.set_token(username, token);
            config.save()?;
            println!("{} Session token stored", "✓".bright_green().bold());
        }
    }
    Ok(())
}

fn show_config(config: &Config) {
    let path = Config::get_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "(unknown)".to_string());

    println!();
    println!("  {}", "Fleet console configuration".bright_white().bold());
    println!("  {} {}", "file:".dimmed(), path.dimmed());
    println!();
    println!("  {:<22} {}", "backend_url", config.backend_url.cyan());
    println!(
        "  {:<22} {}",
        "username",
        config.username.as_deref().unwrap_or("(not set)").white()
    );
    let token = if config.token.is_some() {
        "(set)".bright_green()
    } else {
        "(not set)".bright_yellow()
    };
    println!("  {:<22} {}", "token", token);
    println!();
    println!("  {}", "[ui]".bright_white().bold());
    println!("  {:<22} {}", "animations_enabled", config.ui.animations_enabled);
    println!("  {:<22} {}", "rescale_poll_delay_ms", config.ui.rescale_poll_delay_ms);
    println!("  {:<22} {}", "max_virtual_players", config.ui.max_virtual_players);
    println!("  {:<22} {:?}", "theme", config.ui.theme);
    println!();
    println!(
        "  {}",
        format!("{} and {} override the file", URL_ENV, TOKEN_ENV).dimmed()
    );
    println!();
}
