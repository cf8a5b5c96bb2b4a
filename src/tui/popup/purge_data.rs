use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use log::info;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use serde_json::Value;

use super::{KeyResult, Popup, PopupContext, PopupKind, split_alerts};
use crate::api::protocol::{Request, response_errors, response_event};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::widgets::AlertList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurgeStage {
    Confirm,
    Pending,
    Done,
}

struct PurgeView {
    ctx: PopupContext,
    stage: PurgeStage,
    alerts: AlertList,
}

impl PurgeView {
    fn on_purged(&mut self, payload: &Value) -> Result<()> {
        if self.stage != PurgeStage::Pending {
            return Ok(());
        }
        let failed = self
            .alerts
            .show_response(response_errors(payload), Some("All session data purged"));
        self.stage = if failed { PurgeStage::Confirm } else { PurgeStage::Done };
        Ok(())
    }
}

/// Asks for confirmation before wiping stored session data
pub struct PurgeDataPopup {
    view: Rc<RefCell<PurgeView>>,
    listeners: ListenerSet,
}

impl PurgeDataPopup {
    pub fn new(ctx: PopupContext) -> Self {
        let listeners = ListenerSet::new(&ctx.bus);
        Self {
            view: Rc::new(RefCell::new(PurgeView {
                ctx,
                stage: PurgeStage::Confirm,
                alerts: AlertList::new(),
            })),
            listeners,
        }
    }
}

impl Popup for PurgeDataPopup {
    fn kind(&self) -> PopupKind {
        PopupKind::PurgeData
    }

    fn set_popup_data(&mut self, _data: &Value) -> Result<()> {
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.listeners
            .on_state(&response_event("PurgeData"), &self.view, |view, payload| view.on_purged(payload));
    }

    fn remove_event_listeners(&mut self) {
        self.listeners.remove_all();
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let view = self.view.borrow();
        let (content, alert_area) = split_alerts(area, &view.alerts);
        let [_, body, _] =
            Layout::vertical([Constraint::Fill(1), Constraint::Length(3), Constraint::Fill(1)]).areas(content);

        let lines = match view.stage {
            PurgeStage::Confirm => vec![
                Line::styled("Purge all game session and player data?", theme.title_style()),
                Line::styled("This cannot be undone.", Style::default().fg(theme.accent_warning)),
                Line::styled("y confirm   n cancel", theme.hint_style()),
            ],
            PurgeStage::Pending => vec![Line::styled("Purging...", Style::default().fg(theme.text_secondary))],
            PurgeStage::Done => vec![Line::styled("Esc to close", theme.hint_style())],
        };
        frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body);
        view.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let view = &mut *self.view.borrow_mut();
        if view.stage != PurgeStage::Confirm {
            return KeyResult::Ignored;
        }
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                info!("Purging backend data");
                view.alerts.clear();
                if view.ctx.send(&Request::PurgeData, &mut view.alerts) {
                    view.stage = PurgeStage::Pending;
                }
                KeyResult::Handled
            }
            KeyCode::Char('n') | KeyCode::Char('N') => KeyResult::Close,
            _ => KeyResult::Ignored,
        }
    }

    fn hints(&self) -> &'static str {
        "y confirm  n/Esc cancel"
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

    fn open() -> (PurgeDataPopup, PopupContext, Rc<MemoryTransport>) {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport.clone(), Scheduler::new(), UiSettings::default());
        let mut popup = PurgeDataPopup::new(ctx.clone());
        popup.set_popup_data(&json!({})).unwrap();
        popup.setup_event_listeners();
        (popup, ctx, transport)
    }

    #[test]
    fn test_confirm_sends_purge_once() {
        let (mut popup, ctx, transport) = open();
        assert_eq!(popup.handle_key(KeyEvent::from(KeyCode::Char('y'))), KeyResult::Handled);
        assert_eq!(popup.handle_key(KeyEvent::from(KeyCode::Char('y'))), KeyResult::Ignored);
        assert_eq!(transport.sent(), vec![Request::PurgeData]);

        ctx.bus.emit("PurgeDataResponse", json!({"Errors": []}));
        let view = popup.view.borrow();
        assert_eq!(view.stage, PurgeStage::Done);
        assert!(!view.alerts.has_errors());
    }

    #[test]
    fn test_errors_allow_retry() {
        let (mut popup, ctx, _transport) = open();
        popup.handle_key(KeyEvent::from(KeyCode::Char('y')));
        ctx.bus.emit("PurgeDataResponse", json!({"Errors": ["table locked"]}));
        assert_eq!(popup.view.borrow().stage, PurgeStage::Confirm);
        assert!(popup.view.borrow().alerts.has_errors());
    }

    #[test]
    fn test_send_failure_stays_on_confirm() {
        let (mut popup, _ctx, transport) = open();
        transport.set_failing(true);
        popup.handle_key(KeyEvent::from(KeyCode::Char('y')));
        let view = popup.view.borrow();
        assert_eq!(view.stage, PurgeStage::Confirm);
        assert!(view.alerts.has_errors());
    }

    #[test]
    fn test_decline_closes() {
        let (mut popup, _ctx, transport) = open();
        assert_eq!(popup.handle_key(KeyEvent::from(KeyCode::Char('n'))), KeyResult::Close);
        assert!(transport.sent().is_empty());
    }
}
