use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, bail};
use crossterm::event::{KeyCode, KeyEvent};
use log::debug;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use serde::Deserialize;
use serde_json::Value;

use super::{KeyResult, Popup, PopupContext, PopupKind, SubPopup, SubPopupSet, render_tabs, split_alerts};
use crate::api::protocol::{Request, VirtualPlayerTask, decode, format_time, response_errors, response_event};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::widgets::{AlertList, ListState, TextInput, table::DataTable};

/// Parse a player count and check it against `1..=max`
pub fn parse_player_count(input: &str, max: u32) -> Result<u32> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Enter the number of players to launch");
    }
    let Ok(count) = input.parse::<u32>() else {
        bail!("'{}' is not a number", input);
    };
    if count == 0 || count > max {
        bail!("Player count must be between 1 and {}", max);
    }
    Ok(count)
}

struct LaunchState {
    ctx: PopupContext,
    input: TextInput,
    validation: Option<String>,
    alerts: AlertList,
}

impl LaunchState {
    fn submit(&mut self) {
        self.alerts.clear();
        match parse_player_count(self.input.value(), self.ctx.settings.max_virtual_players) {
            Ok(num_players) => {
                self.validation = None;
                debug!("Launching {} virtual players", num_players);
                self.ctx.send(&Request::LaunchPlayers { num_players }, &mut self.alerts);
            }
            Err(err) => self.validation = Some(err.to_string()),
        }
    }

    fn on_launched(&mut self, payload: &Value) -> Result<()> {
        self.alerts
            .show_response(response_errors(payload), Some("Virtual players launching"));
        Ok(())
    }
}

struct LaunchPanel {
    state: Rc<RefCell<LaunchState>>,
    listeners: ListenerSet,
}

impl SubPopup for LaunchPanel {
    fn name(&self) -> &'static str {
        "launch"
    }

    fn label(&self) -> &'static str {
        "Launch"
    }

    fn activate(&mut self) {
        self.listeners
            .on_state(&response_event("LaunchPlayers"), &self.state, |s, payload| s.on_launched(payload));
    }

    fn deactivate(&mut self) {
        self.listeners.remove_all();
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let state = self.state.borrow();
        let (content, alert_area) = split_alerts(area, &state.alerts);
        let [help, input_area, status] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(content);

        let text = format!(
            "Number of virtual players to launch (1-{})",
            state.ctx.settings.max_virtual_players
        );
        frame.render_widget(Paragraph::new(Line::styled(text, Style::default().fg(theme.text_secondary))), help);

        let input = Paragraph::new(state.input.display()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style(true))
                .title(" Players "),
        );
        frame.render_widget(input, input_area);

        if let Some(err) = &state.validation {
            frame.render_widget(Paragraph::new(Line::styled(err.as_str(), theme.error_style())), status);
        }
        state.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let mut state = self.state.borrow_mut();
        match key.code {
            KeyCode::Enter => {
                state.submit();
                KeyResult::Handled
            }
            KeyCode::Char(c) if !c.is_ascii_digit() => KeyResult::Ignored,
            code => {
                if state.input.handle_key(code) {
                    state.validation = None;
                }
                KeyResult::Handled
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<VirtualPlayerTask>,
}

struct TasksState {
    ctx: PopupContext,
    tasks: Option<Vec<VirtualPlayerTask>>,
    list: ListState,
    alerts: AlertList,
}

impl TasksState {
    fn request(&mut self) {
        self.ctx.send(&Request::GetVirtualPlayers, &mut self.alerts);
    }

    fn on_tasks(&mut self, payload: &Value) -> Result<()> {
        let response: TasksResponse = decode(payload)?;
        let errors = response_errors(payload);
        if !errors.is_empty() {
            self.alerts.show_response(errors, None);
        }
        self.list.clamp(response.tasks.len());
        self.tasks = Some(response.tasks);
        Ok(())
    }

    fn on_terminated(&mut self, payload: &Value) -> Result<()> {
        self.alerts
            .show_response(response_errors(payload), Some("Termination requested"));
        self.request();
        Ok(())
    }

    fn terminate_selected(&mut self) {
        let Some(task_arn) = self
            .tasks
            .as_deref()
            .and_then(|tasks| self.list.selected_item(tasks))
            .map(|t| t.task_arn.clone())
        else {
            return;
        };
        self.alerts.clear();
        self.ctx.send(&Request::TerminateVirtualPlayer { task_arn }, &mut self.alerts);
    }

    fn terminate_all(&mut self) {
        self.alerts.clear();
        self.ctx.send(&Request::TerminateAllVirtualPlayers, &mut self.alerts);
    }
}

struct TasksPanel {
    state: Rc<RefCell<TasksState>>,
    listeners: ListenerSet,
}

impl SubPopup for TasksPanel {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn label(&self) -> &'static str {
        "Tasks"
    }

    fn activate(&mut self) {
        self.listeners
            .on_state(&response_event("GetVirtualPlayers"), &self.state, |s, payload| s.on_tasks(payload));
        for request in ["TerminateVirtualPlayer", "TerminateAllVirtualPlayers"] {
            self.listeners
                .on_state(&response_event(request), &self.state, |s, payload| s.on_terminated(payload));
        }
        self.state.borrow_mut().request();
    }

    fn deactivate(&mut self) {
        self.listeners.remove_all();
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let state = &mut *self.state.borrow_mut();
        let (content, alert_area) = split_alerts(area, &state.alerts);
        let rows = state
            .tasks
            .iter()
            .flatten()
            .map(|t| vec![t.task_arn.clone(), t.last_status.clone(), format_time(t.created_at)])
            .collect();
        DataTable::new("Virtual player tasks", vec!["Task", "Status", "Created"])
            .widths(vec![Constraint::Fill(3), Constraint::Fill(1), Constraint::Length(20)])
            .rows(rows)
            .status_column(1)
            .focused(true)
            .empty_text(if state.tasks.is_some() { "No virtual players running" } else { "Loading tasks..." })
            .render(frame, content, &mut state.list, theme);
        state.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let state = &mut *self.state.borrow_mut();
        match key.code {
            KeyCode::Char('t') => state.terminate_selected(),
            KeyCode::Char('T') => state.terminate_all(),
            KeyCode::Char('r') => state.request(),
            code => {
                let count = state.tasks.as_ref().map_or(0, Vec::len);
                if !state.list.handle_key(code, count, 10) {
                    return KeyResult::Ignored;
                }
            }
        }
        KeyResult::Handled
    }
}

pub struct VirtualPlayersPopup {
    ctx: PopupContext,
    panels: SubPopupSet,
    initial: &'static str,
}

impl VirtualPlayersPopup {
    pub fn new(ctx: PopupContext) -> Self {
        Self {
            ctx,
            panels: SubPopupSet::new(),
            initial: "launch",
        }
    }

    pub fn active_panel(&self) -> Option<&'static str> {
        self.panels.active_name()
    }
}

impl Popup for VirtualPlayersPopup {
    fn kind(&self) -> PopupKind {
        PopupKind::VirtualPlayers
    }

    fn set_popup_data(&mut self, data: &Value) -> Result<()> {
        self.initial = match data.get("Tab").and_then(Value::as_str) {
            None | Some("launch") => "launch",
            Some("tasks") => "tasks",
            Some(other) => bail!("Unknown virtual players tab '{}'", other),
        };

        let launch = LaunchPanel {
            state: Rc::new(RefCell::new(LaunchState {
                ctx: self.ctx.clone(),
                input: TextInput::new().with_max_length(6),
                validation: None,
                alerts: AlertList::new(),
            })),
            listeners: ListenerSet::new(&self.ctx.bus),
        };
        let tasks = TasksPanel {
            state: Rc::new(RefCell::new(TasksState {
                ctx: self.ctx.clone(),
                tasks: None,
                list: ListState::new(),
                alerts: AlertList::new(),
            })),
            listeners: ListenerSet::new(&self.ctx.bus),
        };
        self.panels = SubPopupSet::new().with(launch).with(tasks);
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.panels.switch_to(self.initial);
    }

    fn remove_event_listeners(&mut self) {
        self.panels.deactivate_all();
    }

    fn listener_count(&self) -> usize {
        self.panels.listener_count()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let [tabs, body] = Layout::vertical([Constraint::Length(2), Constraint::Fill(1)]).areas(area);
        render_tabs(frame, tabs, &self.panels.tabs(), self.panels.active_name(), theme);
        self.panels.render(frame, body, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        self.panels.handle_key(key)
    }

    fn hints(&self) -> &'static str {
        match self.panels.active_name() {
            Some("tasks") => "t terminate  T terminate all  r refresh  Tab launch  Esc close",
            _ => "Enter launch  Tab tasks  Esc close",
        }
    }
}
