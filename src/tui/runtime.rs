//! Top-level console state machine: login screen, then the dashboard with
//! its popups and settings panel.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, info, warn};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};

use crate::api::transport::{InboundReceiver, Transport, inbound_channel};
use crate::api::{DemoBackend, MemoryTransport, WebSocketTransport};
use crate::auth::{Session, SessionProvider};
use crate::config::UiSettings;
use crate::events;
use crate::tui::Theme;
use crate::tui::dashboard::Dashboard;
use crate::tui::event_bus::{EventBus, ListenerSet};
use crate::tui::popup::{PopupContext, PopupController, PopupState};
use crate::tui::settings_panel::SettingsPanel;
use crate::tui::timer::Scheduler;

/// Where backend traffic goes once signed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    WebSocket { url: String },
    /// Canned in-process backend
    Offline,
}

/// Requests raised by bus handlers, applied after the current frame's events
#[derive(Default)]
struct SideEffects {
    sign_out: bool,
    connection_closed: bool,
}

struct ConsoleSession {
    session: Session,
    inbound: InboundReceiver,
    dashboard: Dashboard,
    popups: PopupController,
    settings_panel: SettingsPanel,
    status: Option<String>,
}

enum Screen {
    Login { error: Option<String>, pending: bool },
    Console(Box<ConsoleSession>),
}

pub struct ConsoleRuntime {
    bus: EventBus,
    scheduler: Scheduler,
    settings: UiSettings,
    theme: Theme,
    provider: Arc<dyn SessionProvider>,
    target: BackendTarget,
    screen: Screen,
    effects: Rc<RefCell<SideEffects>>,
    _listeners: ListenerSet,
}

impl ConsoleRuntime {
    pub fn new(provider: Arc<dyn SessionProvider>, target: BackendTarget, settings: UiSettings) -> Self {
        let bus = EventBus::new();
        let effects = Rc::new(RefCell::new(SideEffects::default()));

        let mut listeners = ListenerSet::new(&bus);
        listeners.on_state(events::SIGN_OUT, &effects, |effects, _| {
            effects.sign_out = true;
            Ok(())
        });
        listeners.on_state(events::CONNECTION_CLOSED, &effects, |effects, _| {
            effects.connection_closed = true;
            Ok(())
        });

        Self {
            bus,
            scheduler: Scheduler::new(),
            theme: Theme::new(settings.theme.into()),
            settings,
            provider,
            target,
            screen: Screen::Login {
                error: None,
                pending: true,
            },
            effects,
            _listeners: listeners,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.screen, Screen::Console(_))
    }

    pub fn username(&self) -> Option<&str> {
        match &self.screen {
            Screen::Console(console) => Some(console.session.username.as_str()),
            Screen::Login { .. } => None,
        }
    }

    pub fn login_error(&self) -> Option<&str> {
        match &self.screen {
            Screen::Login { error, .. } => error.as_deref(),
            Screen::Console(_) => None,
        }
    }

    pub fn popup_state(&self) -> PopupState {
        match &self.screen {
            Screen::Console(console) => console.popups.state(),
            Screen::Login { .. } => PopupState::Idle,
        }
    }

    pub fn fleet_count(&self) -> usize {
        match &self.screen {
            Screen::Console(console) => console.dashboard.fleets().len(),
            Screen::Login { .. } => 0,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match &self.screen {
            Screen::Console(console) => console.status.as_deref(),
            Screen::Login { .. } => None,
        }
    }

    /// Returns false when the console should exit
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let now = Instant::now();
        let console = match &mut self.screen {
            Screen::Login { pending, .. } => {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                    KeyCode::Char('r') | KeyCode::Enter => *pending = true,
                    _ => {}
                }
                return Ok(true);
            }
            Screen::Console(console) => console,
        };

        if console.settings_panel.handle_key(key, now) {
            return Ok(true);
        }
        if console.popups.handle_key(key) {
            return Ok(true);
        }

        match key.code {
            KeyCode::Char('s') => console.settings_panel.toggle_open(now),
            KeyCode::Char('q') if !key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(false),
            _ => {
                console.dashboard.handle_key(key);
            }
        }
        Ok(true)
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<bool> {
        if let Screen::Console(console) = &mut self.screen {
            if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
                console.settings_panel.handle_click(mouse.column, mouse.row);
            }
        }
        Ok(true)
    }

    pub fn poll_timers(&mut self) -> Result<()> {
        let fired = self.scheduler.poll(Instant::now());
        if fired > 0 {
            debug!("Fired {} timers", fired);
        }
        Ok(())
    }

    /// Sign in when requested, then deliver queued backend messages
    pub async fn poll_async(&mut self) -> Result<()> {
        if matches!(self.screen, Screen::Login { pending: true, .. }) {
            self.sign_in().await;
        }

        if let Screen::Console(console) = &mut self.screen {
            while let Ok(message) = console.inbound.try_recv() {
                self.bus.emit(&message.event, message.payload);
            }
        }
        Ok(())
    }

    async fn sign_in(&mut self) {
        self.screen = Screen::Login {
            error: None,
            pending: false,
        };
        match self.connect().await {
            Ok(console) => {
                info!("Console session started for {}", console.session.username);
                console.dashboard.refresh();
                self.screen = Screen::Console(Box::new(console));
            }
            Err(err) => {
                warn!("Sign-in failed: {:#}", err);
                self.screen = Screen::Login {
                    error: Some(format!("{:#}", err)),
                    pending: false,
                };
            }
        }
    }

    async fn connect(&self) -> Result<ConsoleSession> {
        let session = self.provider.sign_in().await?;
        let (tx, inbound) = inbound_channel();
        let transport: Rc<dyn Transport> = match &self.target {
            BackendTarget::WebSocket { url } => Rc::new(WebSocketTransport::connect(url, &session, tx).await?),
            BackendTarget::Offline => {
                let backend = DemoBackend::new();
                Rc::new(MemoryTransport::with_responder(tx, move |request| backend.respond(request)))
            }
        };

        let ctx = PopupContext::new(
            self.bus.clone(),
            transport.clone(),
            self.scheduler.clone(),
            self.settings.clone(),
        );
        let animations = self.settings.animations_enabled;
        Ok(ConsoleSession {
            session,
            inbound,
            dashboard: Dashboard::new(&self.bus, transport, animations),
            popups: PopupController::new(ctx),
            settings_panel: SettingsPanel::new(&self.bus, animations, Instant::now()),
            status: None,
        })
    }

    /// Apply sign-out and connection changes raised during event delivery
    pub fn process_side_effects(&mut self) -> Result<()> {
        let effects = std::mem::take(&mut *self.effects.borrow_mut());

        if effects.sign_out {
            if let Screen::Console(console) = &self.screen {
                info!("Signing out {}", console.session.username);
                console.popups.close();
            }
            self.screen = Screen::Login {
                error: None,
                pending: false,
            };
            return Ok(());
        }

        if effects.connection_closed {
            if let Screen::Console(console) = &mut self.screen {
                console.status = Some("Connection to backend closed".to_string());
            }
        }
        Ok(())
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let theme = self.theme.clone();
        match &mut self.screen {
            Screen::Login { error, pending } => render_login(frame, area, error.as_deref(), *pending, &theme),
            Screen::Console(console) => {
                console.dashboard.tick();
                render_console(frame, area, console, &theme);
            }
        }
    }
}

fn render_login(frame: &mut Frame, area: Rect, error: Option<&str>, pending: bool, theme: &Theme) {
    let [row] = Layout::vertical([Constraint::Length(9)]).flex(Flex::Center).areas(area);
    let [panel] = Layout::horizontal([Constraint::Length(area.width.min(64))])
        .flex(Flex::Center)
        .areas(row);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border_style(true))
        .title(Line::styled(" Fleet Console ", theme.title_style()));

    let mut lines = vec![Line::raw("")];
    if pending {
        lines.push(Line::styled("Signing in...", Style::default().fg(theme.accent_info)));
    } else if let Some(err) = error {
        lines.push(Line::styled("Sign-in failed", theme.error_style()));
        lines.push(Line::styled(err.to_string(), Style::default().fg(theme.text_secondary)));
    } else {
        lines.push(Line::styled("Signed out", Style::default().fg(theme.text_secondary)));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled("Enter/r sign in   q quit", theme.hint_style()));

    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(body, panel);
}

fn render_console(frame: &mut Frame, area: Rect, console: &mut ConsoleSession, theme: &Theme) {
    let [header, body, footer] =
        Layout::vertical([Constraint::Length(1), Constraint::Fill(1), Constraint::Length(1)]).areas(area);

    let mut spans = vec![
        Span::styled(" Fleet Console ", theme.title_style()),
        Span::styled(format!(" {} ", console.session.username), Style::default().fg(theme.text_secondary)),
    ];
    if let Some(status) = &console.status {
        spans.push(Span::styled(format!(" {} ", status), theme.error_style()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), header);

    console.dashboard.render(frame, body, theme);
    frame.render_widget(
        Paragraph::new(Line::styled(console.dashboard.hints(), theme.hint_style())),
        footer,
    );

    let now = Instant::now();
    console.settings_panel.render(frame, body, theme, now);
    console.popups.render(frame, body, theme);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticSessionProvider;
    use crate::tui::popup::PopupKind;
    use anyhow::bail;
    use async_trait::async_trait;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    struct FailingProvider;

    #[async_trait]
    impl SessionProvider for FailingProvider {
        async fn sign_in(&self) -> Result<Session> {
            bail!("token expired")
        }
    }

    fn offline() -> ConsoleRuntime {
        let provider = Arc::new(StaticSessionProvider::new(Session::new("tester", "t")));
        ConsoleRuntime::new(provider, BackendTarget::Offline, UiSettings::default())
    }

    fn draw(runtime: &mut ConsoleRuntime) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| runtime.render(f)).unwrap();
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[tokio::test]
    async fn test_offline_sign_in_loads_dashboard() {
        let mut runtime = offline();
        runtime.poll_async().await.unwrap();
        assert!(runtime.is_signed_in());
        assert_eq!(runtime.username(), Some("tester"));
        assert!(runtime.fleet_count() > 0);
        assert!(draw(&mut runtime).contains("Fleets"));
    }

    #[tokio::test]
    async fn test_failed_sign_in_shows_error_and_retries() {
        let mut runtime = ConsoleRuntime::new(Arc::new(FailingProvider), BackendTarget::Offline, UiSettings::default());
        runtime.poll_async().await.unwrap();
        assert!(!runtime.is_signed_in());
        assert_eq!(runtime.login_error(), Some("token expired"));
        assert!(draw(&mut runtime).contains("token expired"));

        assert!(runtime.handle_key(KeyEvent::from(KeyCode::Char('r'))).unwrap());
        runtime.poll_async().await.unwrap();
        assert_eq!(runtime.login_error(), Some("token expired"));
        assert!(!runtime.handle_key(KeyEvent::from(KeyCode::Char('q'))).unwrap());
    }

    #[tokio::test]
    async fn test_dashboard_key_opens_popup_and_esc_closes() {
        let mut runtime = offline();
        runtime.poll_async().await.unwrap();

        runtime.handle_key(KeyEvent::from(KeyCode::Enter)).unwrap();
        assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::FleetScaling));
        runtime.poll_async().await.unwrap();
        assert!(draw(&mut runtime).contains("Fleet Scaling"));

        runtime.handle_key(KeyEvent::from(KeyCode::Esc)).unwrap();
        assert_eq!(runtime.popup_state(), PopupState::Idle);
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_login() {
        let mut runtime = offline();
        runtime.poll_async().await.unwrap();
        runtime.bus().emit(events::SHOW_PURGE_DATA_POPUP, json!({}));
        assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::PurgeData));

        runtime.bus().emit(events::SIGN_OUT, json!({}));
        runtime.process_side_effects().unwrap();
        assert!(!runtime.is_signed_in());
        assert_eq!(runtime.bus().total_listeners(), 2);
    }

    #[tokio::test]
    async fn test_connection_closed_sets_status() {
        let mut runtime = offline();
        runtime.poll_async().await.unwrap();
        runtime.bus().emit(events::CONNECTION_CLOSED, json!({}));
        runtime.process_side_effects().unwrap();
        assert_eq!(runtime.status(), Some("Connection to backend closed"));
    }
}
