use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use serde::Deserialize;
use serde_json::Value;

use super::{KeyResult, Popup, PopupContext, PopupKind, SubPopup, SubPopupSet, field_line, render_tabs, split_alerts};
use crate::api::protocol::{
    Queue, QueuePlacementEvent, Request, decode, format_time, response_errors, response_event,
};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::widgets::{AlertList, ListState, table::DataTable};

/// Static queue details from the show payload
struct DetailsPanel {
    queue: Queue,
}

impl SubPopup for DetailsPanel {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn label(&self) -> &'static str {
        "Settings"
    }

    fn activate(&mut self) {}

    fn deactivate(&mut self) {}

    fn listener_count(&self) -> usize {
        0
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let q = &self.queue;
        let mut lines = vec![
            field_line("Name", q.name.clone(), theme),
            field_line("ARN", q.queue_arn.clone(), theme),
            field_line("Timeout", format!("{}s", q.timeout_in_seconds), theme),
            Line::raw(""),
            Line::styled("Destinations", theme.header_style()),
        ];
        if q.destinations.is_empty() {
            lines.push(Line::styled("  (none)", Style::default().fg(theme.text_tertiary)));
        }
        for (i, dest) in q.destinations.iter().enumerate() {
            lines.push(Line::raw(format!("  {}. {}", i + 1, dest.destination_arn)));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn handle_key(&mut self, _key: KeyEvent) -> KeyResult {
        KeyResult::Ignored
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueEventsResponse {
    queue_arn: String,
    #[serde(default)]
    events: Vec<QueuePlacementEvent>,
}

struct EventsState {
    ctx: PopupContext,
    queue_arn: String,
    events: Option<Vec<QueuePlacementEvent>>,
    list: ListState,
    alerts: AlertList,
}

impl EventsState {
    fn request(&mut self) {
        let request = Request::GetQueueEvents {
            queue_arn: self.queue_arn.clone(),
        };
        self.ctx.send(&request, &mut self.alerts);
    }

    fn on_events(&mut self, payload: &Value) -> Result<()> {
        let response: QueueEventsResponse = decode(payload)?;
        if response.queue_arn != self.queue_arn {
            return Ok(());
        }
        self.alerts.show_response(response_errors(payload), None);
        self.list.clamp(response.events.len());
        self.events = Some(response.events);
        Ok(())
    }
}

/// Placement events, fetched each time the panel is activated
struct PlacementsPanel {
    state: Rc<RefCell<EventsState>>,
    listeners: ListenerSet,
}

impl SubPopup for PlacementsPanel {
    fn name(&self) -> &'static str {
        "events"
    }

    fn label(&self) -> &'static str {
        "Events"
    }

    fn activate(&mut self) {
        self.listeners
            .on_state(&response_event("GetQueueEvents"), &self.state, |s, payload| s.on_events(payload));
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
            .events
            .iter()
            .flatten()
            .map(|e| {
                vec![
                    e.placement_id.clone(),
                    e.status.clone(),
                    format_time(e.start_time),
                    e.game_session_arn.clone().unwrap_or_default(),
                ]
            })
            .collect();
        DataTable::new("Placements", vec!["Placement", "Status", "Started", "Game session"])
            .rows(rows)
            .status_column(1)
            .focused(true)
            .empty_text(if state.events.is_some() { "No placements" } else { "Loading placements..." })
            .render(frame, content, &mut state.list, theme);
        state.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let state = &mut *self.state.borrow_mut();
        if key.code == KeyCode::Char('r') {
            state.request();
            return KeyResult::Handled;
        }
        let count = state.events.as_ref().map_or(0, Vec::len);
        if state.list.handle_key(key.code, count, 10) {
            KeyResult::Handled
        } else {
            KeyResult::Ignored
        }
    }
}

pub struct QueuePopup {
    ctx: PopupContext,
    panels: SubPopupSet,
}

impl QueuePopup {
    pub fn new(ctx: PopupContext) -> Self {
        Self {
            ctx,
            panels: SubPopupSet::new(),
        }
    }

    pub fn active_panel(&self) -> Option<&'static str> {
        self.panels.active_name()
    }
}

impl Popup for QueuePopup {
    fn kind(&self) -> PopupKind {
        PopupKind::Queue
    }

    fn set_popup_data(&mut self, data: &Value) -> Result<()> {
        let queue: Queue = decode(data)?;
        let events = PlacementsPanel {
            state: Rc::new(RefCell::new(EventsState {
                ctx: self.ctx.clone(),
                queue_arn: queue.queue_arn.clone(),
                events: None,
                list: ListState::new(),
                alerts: AlertList::new(),
            })),
            listeners: ListenerSet::new(&self.ctx.bus),
        };
        self.panels = SubPopupSet::new().with(DetailsPanel { queue }).with(events);
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.panels.switch_to("settings");
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
        "1 settings  2 events  r refresh  Esc close"
    }
}
