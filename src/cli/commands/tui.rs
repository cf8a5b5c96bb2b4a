use anyhow::{Context, Result};
use clap::Args;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::info;
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::{ConfigSessionProvider, Session, SessionProvider, StaticSessionProvider};
use crate::config::{Config, check_backend_url};
use crate::tui::{BackendTarget, ConsoleRuntime};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Args, Default)]
pub struct TuiArgs {
    /// Backend URL for this run, overriding config and environment
    #[arg(long)]
    pub url: Option<String>,
    /// Use the built-in demo backend instead of connecting
    #[arg(long)]
    pub offline: bool,
}

pub async fn tui_command(args: TuiArgs) -> Result<()> {
    let config = Config::load()?
        .with_env_overrides()
        .with_overrides(args.url, None);

    let (provider, target): (Arc<dyn SessionProvider>, BackendTarget) = if args.offline {
        info!("Starting in offline mode");
        let session = Session::new(config.username.clone().unwrap_or_else(|| "offline".to_string()), "offline");
        (Arc::new(StaticSessionProvider::new(session)), BackendTarget::Offline)
    } else {
        let url = config.backend_url.clone();
        check_backend_url(&url)?;
        (Arc::new(ConfigSessionProvider::new(&config)), BackendTarget::WebSocket { url })
    };

    let mut runtime = ConsoleRuntime::new(provider, target, config.ui.clone());
    launch_tui(&mut runtime).await
}

async fn launch_tui(runtime: &mut ConsoleRuntime) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, runtime).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

async fn run_tui<B: Backend>(terminal: &mut Terminal<B>, runtime: &mut ConsoleRuntime) -> Result<()> {
    loop {
        let frame_start = Instant::now();

        // Process all pending events first for minimal input latency
        let mut should_quit = false;
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        should_quit = true;
                        break;
                    }
                    if !runtime.handle_key(key)? {
                        should_quit = true;
                        break;
                    }
                }
                Event::Mouse(mouse) => {
                    runtime.handle_mouse(mouse)?;
                }
                _ => {}
            }
        }

        if should_quit {
            break;
        }

        runtime.poll_timers()?;
        runtime.poll_async().await?;
        runtime.process_side_effects()?;

        terminal.draw(|frame| runtime.render(frame))?;

        // Sleep for remainder of 16ms frame (60 FPS)
        if let Some(remaining) = FRAME.checked_sub(frame_start.elapsed()) {
            tokio::time::sleep(remaining).await;
        }
    }

    Ok(())
}
