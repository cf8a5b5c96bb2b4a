use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use anyhow::{Result, bail};
use crossterm::event::{KeyCode, KeyEvent};
use log::debug;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use serde_json::Value;

use super::{KeyResult, Popup, PopupContext, PopupKind, field_line, split_alerts};
use crate::api::protocol::{Fleet, FleetScaling, LocationCapacity, Request, decode, response_errors, response_event};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::timer::TimerScope;
use crate::tui::widgets::{AlertList, ListState, table::DataTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityColumn {
    Desired,
    Min,
    Max,
}

impl CapacityColumn {
    fn next(self) -> Self {
        match self {
            CapacityColumn::Desired => CapacityColumn::Min,
            CapacityColumn::Min => CapacityColumn::Max,
            CapacityColumn::Max => CapacityColumn::Desired,
        }
    }

    fn prev(self) -> Self {
        match self {
            CapacityColumn::Desired => CapacityColumn::Max,
            CapacityColumn::Min => CapacityColumn::Desired,
            CapacityColumn::Max => CapacityColumn::Min,
        }
    }
}

/// Check `0 <= min <= desired <= max`
pub fn validate_capacity(loc: &LocationCapacity) -> Result<()> {
    if loc.min_size > loc.desired_instances {
        bail!(
            "Minimum ({}) cannot exceed desired instances ({})",
            loc.min_size,
            loc.desired_instances
        );
    }
    if loc.desired_instances > loc.max_size {
        bail!(
            "Desired instances ({}) cannot exceed maximum ({})",
            loc.desired_instances,
            loc.max_size
        );
    }
    Ok(())
}

struct ScalingView {
    ctx: PopupContext,
    fleet: Option<Fleet>,
    locations: Vec<LocationCapacity>,
    loaded: bool,
    edited: BTreeSet<String>,
    list: ListState,
    column: CapacityColumn,
    validation: Option<String>,
    alerts: AlertList,
    timers: TimerScope,
}

impl ScalingView {
    fn fleet_id(&self) -> Option<&str> {
        self.fleet.as_ref().map(|f| f.fleet_id.as_str())
    }

    fn request_scaling(&mut self) {
        let Some(fleet_id) = self.fleet_id().map(str::to_string) else {
            return;
        };
        self.ctx.send(&Request::GetFleetScaling { fleet_id }, &mut self.alerts);
    }

    fn on_scaling(&mut self, payload: &Value) -> Result<()> {
        let scaling: FleetScaling = decode(payload)?;
        if Some(scaling.fleet_id.as_str()) != self.fleet_id() {
            debug!("Ignoring scaling for other fleet {}", scaling.fleet_id);
            return Ok(());
        }
        let errors = response_errors(payload);
        if !errors.is_empty() {
            self.alerts.show_response(errors, None);
        }
        self.locations = scaling.locations;
        self.loaded = true;
        self.edited.clear();
        self.list.clamp(self.locations.len());
        Ok(())
    }

    fn on_update(&mut self, payload: &Value, me: &Weak<RefCell<ScalingView>>) -> Result<()> {
        let failed = self
            .alerts
            .show_response(response_errors(payload), Some("Capacity update requested"));
        if failed {
            return Ok(());
        }

        let delay = Duration::from_millis(self.ctx.settings.rescale_poll_delay_ms);
        let me = me.clone();
        self.timers.schedule(delay, move || {
            if let Some(view) = me.upgrade() {
                view.borrow_mut().request_scaling();
            }
        });
        Ok(())
    }

    fn adjust(&mut self, delta: i64) {
        let column = self.column;
        let Some(loc) = self.list.selected().and_then(|i| self.locations.get_mut(i)) else {
            return;
        };
        let field = match column {
            CapacityColumn::Desired => &mut loc.desired_instances,
            CapacityColumn::Min => &mut loc.min_size,
            CapacityColumn::Max => &mut loc.max_size,
        };
        *field = (*field as i64 + delta).clamp(0, u32::MAX as i64) as u32;
        self.edited.insert(loc.location.clone());
        self.validation = validate_capacity(loc).err().map(|e| e.to_string());
    }

    fn submit(&mut self) {
        let Some(fleet_id) = self.fleet_id().map(str::to_string) else {
            return;
        };
        let Some(loc) = self.list.selected_item(&self.locations).cloned() else {
            return;
        };
        if let Err(err) = validate_capacity(&loc) {
            self.validation = Some(err.to_string());
            return;
        }
        self.validation = None;
        self.alerts.clear();
        self.ctx.send(
            &Request::UpdateFleetCapacity {
                fleet_id,
                location: loc.location,
                desired_instances: loc.desired_instances,
                min_size: loc.min_size,
                max_size: loc.max_size,
            },
            &mut self.alerts,
        );
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let (content, alert_area) = split_alerts(area, &self.alerts);
        let [info, table_area, status] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(content);

        if let Some(fleet) = &self.fleet {
            let lines = vec![
                field_line("Fleet", format!("{} ({})", fleet.name, fleet.fleet_id), theme),
                field_line("Status", fleet.status.clone(), theme),
                field_line("Instance type", fleet.instance_type.clone(), theme),
            ];
            frame.render_widget(Paragraph::new(lines), info);
        }

        let label = |name: &str, col: CapacityColumn| -> String {
            if col == self.column { format!("[{}]", name) } else { name.to_string() }
        };
        let desired = label("Desired", CapacityColumn::Desired);
        let min = label("Min", CapacityColumn::Min);
        let max = label("Max", CapacityColumn::Max);

        let rows = self
            .locations
            .iter()
            .map(|l| {
                let marker = if self.edited.contains(&l.location) { "*" } else { "" };
                vec![
                    format!("{}{}", l.location, marker),
                    l.desired_instances.to_string(),
                    l.min_size.to_string(),
                    l.max_size.to_string(),
                    l.pending.to_string(),
                    l.active.to_string(),
                    l.idle.to_string(),
                ]
            })
            .collect();

        DataTable::new(
            "Capacity",
            vec![
                "Location",
                desired.as_str(),
                min.as_str(),
                max.as_str(),
                "Pending",
                "Active",
                "Idle",
            ],
        )
        .widths(vec![
            Constraint::Fill(2),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Fill(1),
        ])
        .rows(rows)
        .focused(true)
        .empty_text(if self.loaded { "Fleet has no locations" } else { "Loading capacity..." })
        .render(frame, table_area, &mut self.list, theme);

        if let Some(err) = &self.validation {
            frame.render_widget(Paragraph::new(Line::styled(err.as_str(), theme.error_style())), status);
        } else if !self.edited.is_empty() {
            let hint = Line::styled("Unsaved changes, Enter to apply", Style::default().fg(theme.accent_warning));
            frame.render_widget(Paragraph::new(hint), status);
        }

        self.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        match key.code {
            KeyCode::Left => self.column = self.column.prev(),
            KeyCode::Right => self.column = self.column.next(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust(1),
            KeyCode::Char('-') | KeyCode::Char('_') => self.adjust(-1),
            KeyCode::Enter => self.submit(),
            KeyCode::Char('r') => self.request_scaling(),
            code => {
                let count = self.locations.len();
                if !self.list.handle_key(code, count, 10) {
                    return KeyResult::Ignored;
                }
            }
        }
        KeyResult::Handled
    }
}

pub struct FleetScalingPopup {
    view: Rc<RefCell<ScalingView>>,
    listeners: ListenerSet,
}

impl FleetScalingPopup {
    pub fn new(ctx: PopupContext) -> Self {
        let listeners = ListenerSet::new(&ctx.bus);
        let timers = ctx.scheduler.scope();
        Self {
            view: Rc::new(RefCell::new(ScalingView {
                ctx,
                fleet: None,
                locations: Vec::new(),
                loaded: false,
                edited: BTreeSet::new(),
                list: ListState::new(),
                column: CapacityColumn::Desired,
                validation: None,
                alerts: AlertList::new(),
                timers,
            })),
            listeners,
        }
    }
}

impl Popup for FleetScalingPopup {
    fn kind(&self) -> PopupKind {
        PopupKind::FleetScaling
    }

    fn set_popup_data(&mut self, data: &Value) -> Result<()> {
        let fleet: Fleet = decode(data)?;
        let mut view = self.view.borrow_mut();
        view.fleet = Some(fleet);
        view.request_scaling();
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.listeners
            .on_state(&response_event("GetFleetScaling"), &self.view, |view, payload| view.on_scaling(payload));

        let me = Rc::downgrade(&self.view);
        self.listeners
            .on_state(&response_event("UpdateFleetCapacity"), &self.view, move |view, payload| {
                view.on_update(payload, &me)
            });
    }

    fn remove_event_listeners(&mut self) {
        self.listeners.remove_all();
    }

    fn cancel_timers(&mut self) {
        self.view.borrow().timers.cancel_all();
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.view.borrow_mut().render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        self.view.borrow_mut().handle_key(key)
    }

    fn hints(&self) -> &'static str {
        "↑↓ location  ←→ column  +/- adjust  Enter apply  r refresh  Esc close"
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

    fn popup() -> (FleetScalingPopup, PopupContext, Rc<MemoryTransport>) {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport.clone(), Scheduler::new(), UiSettings::default());
        let mut popup = FleetScalingPopup::new(ctx.clone());
        popup.set_popup_data(&json!({"FleetId": "fleet-1", "Name": "Arena"})).unwrap();
        popup.setup_event_listeners();
        (popup, ctx, transport)
    }

    fn load(ctx: &PopupContext) {
        ctx.bus.emit(
            "GetFleetScalingResponse",
            json!({
                "FleetId": "fleet-1",
                "Locations": [{"Location": "us-west-2", "DesiredInstances": 2, "MinSize": 1, "MaxSize": 3}]
            }),
        );
    }

    #[test]
    fn test_validate_capacity() {
        let mut loc = LocationCapacity {
            location: "x".to_string(),
            desired_instances: 2,
            min_size: 1,
            max_size: 3,
            pending: 0,
            active: 0,
            idle: 0,
        };
        assert!(validate_capacity(&loc).is_ok());
        loc.min_size = 3;
        assert!(validate_capacity(&loc).is_err());
        loc.min_size = 0;
        loc.desired_instances = 4;
        assert!(validate_capacity(&loc).is_err());
    }

    #[test]
    fn test_requests_scaling_for_fleet() {
        let (_popup, _ctx, transport) = popup();
        assert_eq!(
            transport.sent(),
            vec![Request::GetFleetScaling {
                fleet_id: "fleet-1".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_edit_blocks_submit() {
        let (mut popup, ctx, transport) = popup();
        load(&ctx);
        transport.take_sent();

        // desired 2 -> 4 exceeds max 3
        popup.handle_key(KeyEvent::from(KeyCode::Char('+')));
        popup.handle_key(KeyEvent::from(KeyCode::Char('+')));
        popup.handle_key(KeyEvent::from(KeyCode::Enter));
        assert!(transport.sent().is_empty());
        assert!(popup.view.borrow().validation.is_some());

        // raise max to 4
        popup.handle_key(KeyEvent::from(KeyCode::Left));
        popup.handle_key(KeyEvent::from(KeyCode::Char('+')));
        popup.handle_key(KeyEvent::from(KeyCode::Enter));
        assert_eq!(
            transport.sent(),
            vec![Request::UpdateFleetCapacity {
                fleet_id: "fleet-1".to_string(),
                location: "us-west-2".to_string(),
                desired_instances: 4,
                min_size: 1,
                max_size: 4,
            }]
        );
    }

    #[test]
    fn test_successful_update_schedules_repoll() {
        let (popup, ctx, transport) = popup();
        load(&ctx);
        ctx.bus.emit("UpdateFleetCapacityResponse", json!({"Errors": []}));
        assert_eq!(ctx.scheduler.pending(), 1);

        ctx.scheduler.poll(std::time::Instant::now() + Duration::from_secs(5));
        assert_eq!(transport.count("GetFleetScaling"), 2);
        drop(popup);
    }

    #[test]
    fn test_failed_update_shows_errors() {
        let (popup, ctx, _transport) = popup();
        ctx.bus.emit("UpdateFleetCapacityResponse", json!({"Errors": ["Limit exceeded"]}));
        assert_eq!(ctx.scheduler.pending(), 0);
        assert!(popup.view.borrow().alerts.has_errors());
    }

    #[test]
    fn test_other_fleet_ignored() {
        let (popup, ctx, _transport) = popup();
        ctx.bus.emit("GetFleetScalingResponse", json!({"FleetId": "fleet-2", "Locations": [{"Location": "a"}]}));
        assert!(popup.view.borrow().locations.is_empty());
    }
}
