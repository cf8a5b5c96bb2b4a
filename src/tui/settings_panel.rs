//! Slide-in settings panel on the right edge of the dashboard.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent};
use log::debug;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use serde_json::{Value, json};

use crate::api::protocol::response_event;
use crate::events;
use crate::tui::Theme;
use crate::tui::event_bus::{EventBus, ListenerSet};
use crate::tui::widgets::{AnimationsToggle, ListState};

pub const SLIDE_DURATION: Duration = Duration::from_millis(250);
const PANEL_WIDTH: u16 = 34;

/// Actions offered by the settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsCommand {
    LaunchPlayers,
    ManageVirtualPlayers,
    ManageMatchmaking,
    PurgeData,
    AddDummyFleet,
    AddDummyGameSessions,
    SignOut,
}

impl SettingsCommand {
    pub const ALL: [SettingsCommand; 7] = [
        SettingsCommand::LaunchPlayers,
        SettingsCommand::ManageVirtualPlayers,
        SettingsCommand::ManageMatchmaking,
        SettingsCommand::PurgeData,
        SettingsCommand::AddDummyFleet,
        SettingsCommand::AddDummyGameSessions,
        SettingsCommand::SignOut,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsCommand::LaunchPlayers => "Launch virtual players",
            SettingsCommand::ManageVirtualPlayers => "Manage virtual players",
            SettingsCommand::ManageMatchmaking => "Manage matchmaking",
            SettingsCommand::PurgeData => "Purge data",
            SettingsCommand::AddDummyFleet => "Add dummy fleet",
            SettingsCommand::AddDummyGameSessions => "Add dummy game sessions",
            SettingsCommand::SignOut => "Sign out",
        }
    }
}

/// Event and payload a command dispatches.
///
/// `first_config` is the first matchmaking configuration known to the
/// console, used by `ManageMatchmaking`.
pub fn command_event(command: SettingsCommand, first_config: Option<&Value>) -> (&'static str, Value) {
    match command {
        SettingsCommand::LaunchPlayers => (events::SHOW_VIRTUAL_PLAYERS_POPUP, json!({"Tab": "launch"})),
        SettingsCommand::ManageVirtualPlayers => (events::SHOW_VIRTUAL_PLAYERS_POPUP, json!({"Tab": "tasks"})),
        SettingsCommand::ManageMatchmaking => (
            events::SHOW_MATCHMAKING_POPUP,
            first_config.cloned().unwrap_or_else(|| json!({})),
        ),
        SettingsCommand::PurgeData => (events::SHOW_PURGE_DATA_POPUP, json!({})),
        SettingsCommand::AddDummyFleet => (events::ADD_DUMMY_FLEET, json!({})),
        SettingsCommand::AddDummyGameSessions => (events::ADD_DUMMY_GAME_SESSIONS, json!({})),
        SettingsCommand::SignOut => (events::SIGN_OUT, json!({})),
    }
}

/// Linear position animation between hidden (1.0) and shown (0.0)
#[derive(Debug, Clone, Copy)]
struct Slide {
    from: f32,
    to: f32,
    start: Instant,
}

impl Slide {
    fn at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f32();
        let t = (elapsed / SLIDE_DURATION.as_secs_f32()).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }
}

pub struct SettingsPanel {
    bus: EventBus,
    toggle: AnimationsToggle,
    list: ListState,
    slide: Slide,
    first_config: Rc<RefCell<Option<Value>>>,
    _listeners: ListenerSet,
}

impl SettingsPanel {
    pub fn new(bus: &EventBus, animations_enabled: bool, now: Instant) -> Self {
        let first_config = Rc::new(RefCell::new(None));
        let mut listeners = ListenerSet::new(bus);
        listeners.on_state(
            &response_event("GetMatchmakingConfigurations"),
            &first_config,
            |first: &mut Option<Value>, payload| {
                *first = payload
                    .get("Configurations")
                    .and_then(Value::as_array)
                    .and_then(|configs| configs.first())
                    .cloned();
                Ok(())
            },
        );

        let mut list = ListState::new().with_wrap_around(false);
        list.select(Some(0));

        Self {
            bus: bus.clone(),
            toggle: AnimationsToggle::new(bus.clone(), animations_enabled),
            list,
            slide: Slide {
                from: 1.0,
                to: 1.0,
                start: now,
            },
            first_config,
            _listeners: listeners,
        }
    }

    pub fn show(&mut self, now: Instant) {
        self.slide_to(0.0, now);
    }

    pub fn hide(&mut self, now: Instant) {
        self.slide_to(1.0, now);
    }

    pub fn toggle_open(&mut self, now: Instant) {
        if self.is_open() {
            self.hide(now);
        } else {
            self.show(now);
        }
    }

    fn slide_to(&mut self, target: f32, now: Instant) {
        let current = self.offset_at(now);
        self.slide = Slide {
            from: current,
            to: target,
            start: now,
        };
    }

    /// Fraction of the panel pushed off screen: 0.0 fully shown, 1.0 hidden
    pub fn offset_at(&self, now: Instant) -> f32 {
        self.slide.at(now)
    }

    /// Whether the panel is shown or sliding in
    pub fn is_open(&self) -> bool {
        self.slide.to == 0.0
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        self.offset_at(now) < 1.0
    }

    pub fn animations_enabled(&self) -> bool {
        self.toggle.is_on()
    }

    /// Row 0 is the animations toggle, the commands follow
    fn row_count(&self) -> usize {
        SettingsCommand::ALL.len() + 1
    }

    pub fn selected_command(&self) -> Option<SettingsCommand> {
        self.list
            .selected()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| SettingsCommand::ALL.get(i).copied())
    }

    pub fn dispatch(&mut self, command: SettingsCommand) {
        let first = self.first_config.borrow().clone();
        let (event, payload) = command_event(command, first.as_ref());
        debug!("Settings command {:?} -> {}", command, event);
        self.bus.emit(event, payload);
    }

    /// Returns true when the key was consumed
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        if !self.is_open() {
            return false;
        }
        match key.code {
            KeyCode::Esc => self.hide(now),
            KeyCode::Enter | KeyCode::Char(' ') => match self.selected_command() {
                Some(command) => {
                    self.hide(now);
                    self.dispatch(command);
                }
                None => {
                    self.toggle.toggle();
                }
            },
            KeyCode::Char('a') => {
                self.toggle.toggle();
            }
            code => {
                let count = self.row_count();
                self.list.handle_key(code, count, count);
            }
        }
        true
    }

    pub fn handle_click(&mut self, column: u16, row: u16) -> bool {
        if !self.is_open() {
            return false;
        }
        self.toggle.click(column, row).is_some()
    }

    /// Area the panel occupies at `now`, or None while hidden
    pub fn panel_area(&self, area: Rect, now: Instant) -> Option<Rect> {
        let width = PANEL_WIDTH.min(area.width);
        let shown = ((1.0 - self.offset_at(now)) * width as f32).round() as u16;
        if shown == 0 {
            return None;
        }
        Some(Rect::new(area.right() - shown, area.y, shown, area.height))
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme, now: Instant) {
        let Some(panel) = self.panel_area(area, now) else {
            return;
        };
        frame.render_widget(Clear, panel);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border_style(self.is_open()))
            .title(Line::styled(" Settings ", theme.title_style()))
            .title_bottom(Line::styled(" ↑↓ Enter  a animations  Esc ", theme.hint_style()))
            .style(Style::default().bg(theme.bg_surface));
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let [toggle_area, _, commands_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1), Constraint::Fill(1)]).areas(inner);

        let selected = self.list.selected();
        let toggle_marker = if selected == Some(0) { "▶" } else { " " };
        let [marker_area, button_area] =
            Layout::horizontal([Constraint::Length(2), Constraint::Fill(1)]).areas(toggle_area);
        frame.render_widget(Paragraph::new(toggle_marker), marker_area);
        self.toggle.render(frame, button_area, theme);

        let lines: Vec<Line> = SettingsCommand::ALL
            .iter()
            .enumerate()
            .map(|(i, command)| {
                if selected == Some(i + 1) {
                    Line::styled(format!("▶ {}", command.label()), theme.selected_style())
                } else {
                    let style = if *command == SettingsCommand::SignOut || *command == SettingsCommand::PurgeData {
                        Style::default().fg(theme.accent_error)
                    } else {
                        Style::default().fg(theme.text_primary)
                    };
                    Line::styled(format!("  {}", command.label()), style)
                }
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), commands_area);
    }
}
