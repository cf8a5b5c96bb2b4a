pub mod config;
pub mod tui;

pub use config::{ConfigCommands, config_command};
pub use tui::{TuiArgs, tui_command};
