use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::tui::ThemeVariant;

pub const URL_ENV: &str = "FLEET_CONSOLE_URL";
pub const TOKEN_ENV: &str = "FLEET_CONSOLE_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub ui: UiSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_true")]
    pub animations_enabled: bool,
    /// Delay before re-reading fleet capacity after an update
    #[serde(default = "default_rescale_poll_delay_ms")]
    pub rescale_poll_delay_ms: u64,
    #[serde(default = "default_max_virtual_players")]
    pub max_virtual_players: u32,
    #[serde(default)]
    pub theme: ThemeName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Mocha,
    Latte,
}

impl From<ThemeName> for ThemeVariant {
    fn from(name: ThemeName) -> Self {
        match name {
            ThemeName::Mocha => ThemeVariant::Mocha,
            ThemeName::Latte => ThemeVariant::Latte,
        }
    }
}

fn default_backend_url() -> String {
    "ws://localhost:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rescale_poll_delay_ms() -> u64 {
    2000
}

fn default_max_virtual_players() -> u32 {
    50
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            animations_enabled: true,
            rescale_poll_delay_ms: default_rescale_poll_delay_ms(),
            max_virtual_players: default_max_virtual_players(),
            theme: ThemeName::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            username: None,
            token: None,
            ui: UiSettings::default(),
        }
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("fleet-console")
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".fleet-console")
        };

        // Ensure the directory exists
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!("Loaded config for backend {}", config.backend_url);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        debug!("Saving config to: {:?}", config_path);

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }

    /// Apply `FLEET_CONSOLE_URL` / `FLEET_CONSOLE_TOKEN` from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(URL_ENV).ok(),
            std::env::var(TOKEN_ENV).ok(),
        )
    }

    pub fn with_overrides(mut self, url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            debug!("Backend URL overridden to {}", url);
            self.backend_url = url;
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            debug!("Session token overridden from environment");
            self.token = Some(token);
        }
        self
    }

    pub fn set_backend_url(&mut self, url: String) -> Result<()> {
        check_backend_url(&url)?;
        info!("Setting backend URL to: {}", url);
        self.backend_url = url;
        Ok(())
    }

    pub fn set_token(&mut self, username: Option<String>, token: String) {
        info!("Storing session token");
        if username.is_some() {
            self.username = username;
        }
        self.token = Some(token);
    }
}

/// Plain `ws://` only; the socket transport is built without TLS
pub fn check_backend_url(url: &str) -> Result<()> {
    if url.starts_with("wss://") {
        anyhow::bail!("TLS backends are not supported, use a ws:// URL (got '{}')", url);
    }
    if !url.starts_with("ws://") {
        anyhow::bail!("Backend URL must start with ws://, got '{}'", url);
    }
    Ok(())
}
