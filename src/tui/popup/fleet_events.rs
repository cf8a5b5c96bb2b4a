use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::widgets::Paragraph;
use serde::Deserialize;
use serde_json::Value;

use super::{KeyResult, Popup, PopupContext, PopupKind, field_line, split_alerts};
use crate::api::protocol::{Fleet, FleetEvent, Request, decode, format_time, response_errors, response_event};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::widgets::{AlertList, ListState, table::DataTable};

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FleetEventsResponse {
    fleet_id: String,
    #[serde(default)]
    events: Vec<FleetEvent>,
}

struct EventsView {
    ctx: PopupContext,
    fleet: Option<Fleet>,
    events: Option<Vec<FleetEvent>>,
    list: ListState,
    alerts: AlertList,
}

impl EventsView {
    fn request(&mut self) {
        if let Some(fleet) = &self.fleet {
            let request = Request::GetFleetEvents {
                fleet_id: fleet.fleet_id.clone(),
            };
            self.ctx.send(&request, &mut self.alerts);
        }
    }

    fn on_events(&mut self, payload: &Value) -> Result<()> {
        let response: FleetEventsResponse = decode(payload)?;
        if self.fleet.as_ref().map(|f| &f.fleet_id) != Some(&response.fleet_id) {
            return Ok(());
        }
        self.alerts.show_response(response_errors(payload), None);

        let mut events = response.events;
        // newest first
        events.sort_by(|a, b| b.event_time.cmp(&a.event_time));
        self.list.clamp(events.len());
        self.events = Some(events);
        Ok(())
    }
}

pub struct FleetEventsPopup {
    view: Rc<RefCell<EventsView>>,
    listeners: ListenerSet,
}

impl FleetEventsPopup {
    pub fn new(ctx: PopupContext) -> Self {
        let listeners = ListenerSet::new(&ctx.bus);
        Self {
            view: Rc::new(RefCell::new(EventsView {
                ctx,
                fleet: None,
                events: None,
                list: ListState::new(),
                alerts: AlertList::new(),
            })),
            listeners,
        }
    }
}

impl Popup for FleetEventsPopup {
    fn kind(&self) -> PopupKind {
        PopupKind::FleetEvents
    }

    fn set_popup_data(&mut self, data: &Value) -> Result<()> {
        let fleet: Fleet = decode(data)?;
        let mut view = self.view.borrow_mut();
        view.fleet = Some(fleet);
        view.request();
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.listeners
            .on_state(&response_event("GetFleetEvents"), &self.view, |view, payload| view.on_events(payload));
    }

    fn remove_event_listeners(&mut self) {
        self.listeners.remove_all();
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let view = &mut *self.view.borrow_mut();
        let (content, alert_area) = split_alerts(area, &view.alerts);
        let [info, table_area] = Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(content);

        if let Some(fleet) = &view.fleet {
            frame.render_widget(
                Paragraph::new(field_line("Fleet", format!("{} ({})", fleet.name, fleet.fleet_id), theme)),
                info,
            );
        }

        let rows = view
            .events
            .iter()
            .flatten()
            .map(|e| vec![format_time(e.event_time), e.event_code.clone(), e.message.clone()])
            .collect();
        DataTable::new("Events", vec!["Time", "Code", "Message"])
            .widths(vec![Constraint::Length(20), Constraint::Length(28), Constraint::Fill(1)])
            .rows(rows)
            .focused(true)
            .empty_text(if view.events.is_some() { "No events" } else { "Loading events..." })
            .render(frame, table_area, &mut view.list, theme);

        view.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let view = &mut *self.view.borrow_mut();
        if key.code == KeyCode::Char('r') {
            view.request();
            return KeyResult::Handled;
        }
        let count = view.events.as_ref().map_or(0, Vec::len);
        if view.list.handle_key(key.code, count, 10) {
            KeyResult::Handled
        } else {
            KeyResult::Ignored
        }
    }

    fn hints(&self) -> &'static str {
        "↑↓ scroll  r refresh  Esc close"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::MemoryTransport;
    use crate::config::UiSettings;
    use crate::tui::event_bus::EventBus;
    use crate::tui::timer::Scheduler;
    use serde_json::json;

    #[test]
    fn test_events_sorted_newest_first() {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport.clone(), Scheduler::new(), UiSettings::default());
        let mut popup = FleetEventsPopup::new(ctx.clone());
        popup.set_popup_data(&json!({"FleetId": "f-1"})).unwrap();
        popup.setup_event_listeners();
        assert_eq!(transport.sent_names(), vec!["GetFleetEvents"]);

        ctx.bus.emit(
            "GetFleetEventsResponse",
            json!({
                "FleetId": "f-1",
                "Events": [
                    {"EventTime": "2024-01-01T00:00:00Z", "EventCode": "OLD"},
                    {"EventTime": "2024-06-01T00:00:00Z", "EventCode": "NEW"}
                ]
            }),
        );
        let view = popup.view.borrow();
        let codes: Vec<_> = view.events.iter().flatten().map(|e| e.event_code.as_str()).collect();
        assert_eq!(codes, vec!["NEW", "OLD"]);
    }
}
