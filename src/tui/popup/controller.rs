//! Single-active-popup lifecycle.
//!
//! ```text
//! Idle --Show*Popup--> Showing(kind)
//! Showing(a) --Show*Popup--> [close a] --> Showing(b)
//! Showing(_) --ClosePopup / Esc--> Idle
//! ```
//!
//! A show request always fully closes the current popup before the next one
//! is constructed, so when several arrive in one tick the last one wins and
//! none of the intermediate popups keeps a registration.

use std::cell::RefCell;
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent};
use log::{debug, info, warn};
use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Borders, Clear};
use serde_json::{Value, json};

use super::{KeyResult, Popup, PopupContext, PopupKind, build_popup};
use crate::events::CLOSE_POPUP;
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Idle,
    Showing(PopupKind),
}

pub type PopupFactory = Box<dyn Fn(PopupKind, &PopupContext) -> Box<dyn Popup>>;

struct Active {
    popup: Box<dyn Popup>,
    visible: bool,
}

struct Inner {
    ctx: PopupContext,
    factory: PopupFactory,
    active: Option<Active>,
}

pub struct PopupController {
    inner: Rc<RefCell<Inner>>,
    ctx: PopupContext,
    _listeners: ListenerSet,
}

impl PopupController {
    pub fn new(ctx: PopupContext) -> Self {
        Self::with_factory(ctx, Box::new(build_popup))
    }

    /// Controller that builds popups with `factory` instead of the real variants
    pub fn with_factory(ctx: PopupContext, factory: PopupFactory) -> Self {
        let inner = Rc::new(RefCell::new(Inner {
            ctx: ctx.clone(),
            factory,
            active: None,
        }));

        let mut listeners = ListenerSet::new(&ctx.bus);
        for kind in PopupKind::ALL {
            listeners.on_state(kind.show_event(), &inner, move |inner, payload| {
                inner.show(kind, payload);
                Ok(())
            });
        }
        listeners.on_state(CLOSE_POPUP, &inner, |inner, _| {
            inner.close();
            Ok(())
        });

        Self {
            inner,
            ctx,
            _listeners: listeners,
        }
    }

    pub fn state(&self) -> PopupState {
        match &self.inner.borrow().active {
            Some(active) => PopupState::Showing(active.popup.kind()),
            None => PopupState::Idle,
        }
    }

    pub fn is_showing(&self) -> bool {
        self.inner.borrow().active.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.inner
            .borrow()
            .active
            .as_ref()
            .is_some_and(|a| a.visible)
    }

    /// Bus registrations held by the active popup
    pub fn active_listener_count(&self) -> usize {
        self.inner
            .borrow()
            .active
            .as_ref()
            .map_or(0, |a| a.popup.listener_count())
    }

    /// Open a popup directly, as if its show event had been emitted
    pub fn show(&self, kind: PopupKind, data: &Value) {
        self.inner.borrow_mut().show(kind, data);
    }

    pub fn close(&self) {
        self.inner.borrow_mut().close();
    }

    /// Stop drawing the popup without destroying it; it keeps listening
    pub fn hide(&self) {
        if let Some(active) = self.inner.borrow_mut().active.as_mut() {
            active.visible = false;
        }
    }

    pub fn reveal(&self) {
        if let Some(active) = self.inner.borrow_mut().active.as_mut() {
            active.visible = true;
        }
    }

    /// Route a key to the visible popup.
    ///
    /// A visible popup is modal: every key is consumed, including the ones
    /// the popup ignores. Returns false only when nothing is visible.
    pub fn handle_key(&self, key: KeyEvent) -> bool {
        if !self.is_visible() {
            return false;
        }

        if key.code == KeyCode::Esc {
            self.ctx.bus.emit(CLOSE_POPUP, json!({}));
            return true;
        }

        // The borrow ends before any close so that close handlers may run
        let result = {
            let mut inner = self.inner.borrow_mut();
            match inner.active.as_mut() {
                Some(active) => active.popup.handle_key(key),
                None => KeyResult::Ignored,
            }
        };

        match result {
            KeyResult::Close => {
                self.ctx.bus.emit(CLOSE_POPUP, json!({}));
                true
            }
            KeyResult::Handled | KeyResult::Switch(_) | KeyResult::Ignored => true,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let mut inner = self.inner.borrow_mut();
        let Some(active) = inner.active.as_mut().filter(|a| a.visible) else {
            return;
        };

        let popup_area = centered(area, 84, 80);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border_style(true))
            .style(ratatui::style::Style::default().bg(theme.bg_base))
            .title(Line::styled(format!(" {} ", active.popup.kind().title()), theme.title_style()))
            .title_bottom(Line::styled(format!(" {} ", active.popup.hints()), theme.hint_style()));
        let body = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        active.popup.render(frame, body, theme);
    }
}

impl Inner {
    fn show(&mut self, kind: PopupKind, data: &Value) {
        if self.active.is_some() {
            self.close();
        }

        debug!("Constructing {:?} popup", kind);
        let mut popup = (self.factory)(kind, &self.ctx);
        if let Err(err) = popup.set_popup_data(data) {
            // Nothing has been registered yet, dropping is enough
            warn!("Cannot show {:?} popup: {:#}", kind, err);
            return;
        }
        popup.setup_event_listeners();
        info!("Showing {:?} popup", kind);
        self.active = Some(Active {
            popup,
            visible: true,
        });
    }

    fn close(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        let kind = active.popup.kind();
        active.visible = false;
        active.popup.remove_event_listeners();
        active.popup.cancel_timers();
        drop(active);
        info!("Closed {:?} popup", kind);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::MemoryTransport;
    use crate::config::UiSettings;
    use crate::tui::event_bus::EventBus;
    use crate::tui::timer::Scheduler;

    fn context() -> (PopupContext, Rc<MemoryTransport>) {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport.clone(), Scheduler::new(), UiSettings::default());
        (ctx, transport)
    }

    #[test]
    fn test_show_and_close_through_bus() {
        let (ctx, _transport) = context();
        let controller = PopupController::new(ctx.clone());
        assert_eq!(controller.state(), PopupState::Idle);

        ctx.bus.emit(PopupKind::PurgeData.show_event(), json!({}));
        assert_eq!(controller.state(), PopupState::Showing(PopupKind::PurgeData));

        ctx.bus.emit(CLOSE_POPUP, json!({}));
        assert_eq!(controller.state(), PopupState::Idle);
    }

    #[test]
    fn test_bad_payload_stays_idle() {
        let (ctx, transport) = context();
        let controller = PopupController::new(ctx.clone());
        ctx.bus.emit(PopupKind::FleetScaling.show_event(), json!({"NoFleetId": true}));
        assert_eq!(controller.state(), PopupState::Idle);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_hide_keeps_popup_alive() {
        let (ctx, _transport) = context();
        let controller = PopupController::new(ctx.clone());
        controller.show(PopupKind::PurgeData, &json!({}));
        controller.hide();
        assert!(controller.is_showing());
        assert!(!controller.is_visible());
        assert!(!controller.handle_key(KeyEvent::from(KeyCode::Esc)));
        controller.reveal();
        assert!(controller.handle_key(KeyEvent::from(KeyCode::Esc)));
        assert_eq!(controller.state(), PopupState::Idle);
    }

    #[test]
    fn test_visible_popup_consumes_ignored_keys() {
        let (ctx, transport) = context();
        let controller = PopupController::new(ctx.clone());
        controller.show(PopupKind::PurgeData, &json!({}));
        assert!(controller.handle_key(KeyEvent::from(KeyCode::Char('x'))));
        assert!(controller.handle_key(KeyEvent::from(KeyCode::Char('q'))));
        assert_eq!(controller.state(), PopupState::Showing(PopupKind::PurgeData));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_dropping_controller_unsubscribes() {
        let (ctx, _transport) = context();
        {
            let _controller = PopupController::new(ctx.clone());
            assert!(ctx.bus.listener_count(CLOSE_POPUP) == 1);
        }
        assert_eq!(ctx.bus.total_listeners(), 0);
    }
}
