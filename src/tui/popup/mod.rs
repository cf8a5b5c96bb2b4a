//! Popups shown over the dashboard.
//!
//! Every popup variant is a standalone implementer of [`Popup`]. The
//! [`controller::PopupController`] owns at most one of them at a time and
//! drives the lifecycle: construct, `set_popup_data`, `setup_event_listeners`,
//! then on close `remove_event_listeners`, `cancel_timers` and drop.

pub mod controller;
pub mod fleet_events;
pub mod fleet_scaling;
pub mod game_session;
pub mod matchmaking;
pub mod purge_data;
pub mod queue;
pub mod sub_popup;
pub mod virtual_players;

use std::rc::Rc;

use anyhow::Result;
use crossterm::event::KeyEvent;
use log::warn;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use serde_json::Value;

use crate::api::protocol::Request;
use crate::api::transport::Transport;
use crate::config::UiSettings;
use crate::events;
use crate::tui::Theme;
use crate::tui::event_bus::EventBus;
use crate::tui::timer::Scheduler;
use crate::tui::widgets::AlertList;

pub use controller::{PopupController, PopupState};
pub use sub_popup::{SubPopup, SubPopupSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopupKind {
    FleetScaling,
    FleetEvents,
    Queue,
    GameSession,
    Matchmaking,
    VirtualPlayers,
    PurgeData,
}

impl PopupKind {
    pub const ALL: [PopupKind; 7] = [
        PopupKind::FleetScaling,
        PopupKind::FleetEvents,
        PopupKind::Queue,
        PopupKind::GameSession,
        PopupKind::Matchmaking,
        PopupKind::VirtualPlayers,
        PopupKind::PurgeData,
    ];

    /// The bus event that requests this popup
    pub fn show_event(self) -> &'static str {
        match self {
            PopupKind::FleetScaling => events::SHOW_FLEET_SCALING_POPUP,
            PopupKind::FleetEvents => events::SHOW_FLEET_EVENTS_POPUP,
            PopupKind::Queue => events::SHOW_QUEUE_POPUP,
            PopupKind::GameSession => events::SHOW_GAME_SESSION_POPUP,
            PopupKind::Matchmaking => events::SHOW_MATCHMAKING_POPUP,
            PopupKind::VirtualPlayers => events::SHOW_VIRTUAL_PLAYERS_POPUP,
            PopupKind::PurgeData => events::SHOW_PURGE_DATA_POPUP,
        }
    }

    pub fn from_show_event(event: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.show_event() == event)
    }

    pub fn title(self) -> &'static str {
        match self {
            PopupKind::FleetScaling => "Fleet Scaling",
            PopupKind::FleetEvents => "Fleet Events",
            PopupKind::Queue => "Game Session Queue",
            PopupKind::GameSession => "Game Session",
            PopupKind::Matchmaking => "Matchmaking",
            PopupKind::VirtualPlayers => "Virtual Players",
            PopupKind::PurgeData => "Purge Data",
        }
    }
}

/// Collaborators handed to every popup at construction
#[derive(Clone)]
pub struct PopupContext {
    pub bus: EventBus,
    pub transport: Rc<dyn Transport>,
    pub scheduler: Scheduler,
    pub settings: UiSettings,
}

impl PopupContext {
    pub fn new(bus: EventBus, transport: Rc<dyn Transport>, scheduler: Scheduler, settings: UiSettings) -> Self {
        Self {
            bus,
            transport,
            scheduler,
            settings,
        }
    }

    /// Send a request, recording a transport failure in `alerts`
    pub fn send(&self, request: &Request, alerts: &mut AlertList) -> bool {
        match self.transport.send_object(request) {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to send {}: {:#}", request.name(), err);
                alerts.error(format!("{:#}", err));
                false
            }
        }
    }
}

/// Outcome of a key press inside a popup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResult {
    Handled,
    Ignored,
    /// The popup asks to be closed
    Close,
    /// A sub-popup asks its set to switch to the named panel
    Switch(&'static str),
}

/// Capability contract of a popup variant.
///
/// The events registered in `setup_event_listeners` must be exactly those
/// removed in `remove_event_listeners`; implementers keep them in a
/// [`crate::tui::event_bus::ListenerSet`].
pub trait Popup {
    fn kind(&self) -> PopupKind;

    /// Called once after construction with the payload of the show event
    fn set_popup_data(&mut self, data: &Value) -> Result<()>;

    fn setup_event_listeners(&mut self);

    fn remove_event_listeners(&mut self);

    /// Cancel any pending timers. Called on destroy.
    fn cancel_timers(&mut self) {}

    /// Number of bus registrations currently held
    fn listener_count(&self) -> usize;

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult;

    /// Key hints shown on the popup's bottom border
    fn hints(&self) -> &'static str {
        "Esc close"
    }
}

/// Construct the popup variant for `kind`
pub fn build_popup(kind: PopupKind, ctx: &PopupContext) -> Box<dyn Popup> {
    match kind {
        PopupKind::FleetScaling => Box::new(fleet_scaling::FleetScalingPopup::new(ctx.clone())),
        PopupKind::FleetEvents => Box::new(fleet_events::FleetEventsPopup::new(ctx.clone())),
        PopupKind::Queue => Box::new(queue::QueuePopup::new(ctx.clone())),
        PopupKind::GameSession => Box::new(game_session::GameSessionPopup::new(ctx.clone())),
        PopupKind::Matchmaking => Box::new(matchmaking::MatchmakingPopup::new(ctx.clone())),
        PopupKind::VirtualPlayers => Box::new(virtual_players::VirtualPlayersPopup::new(ctx.clone())),
        PopupKind::PurgeData => Box::new(purge_data::PurgeDataPopup::new(ctx.clone())),
    }
}

/// Split a popup body into content and an alert strip sized to the alerts
pub(crate) fn split_alerts(area: Rect, alerts: &AlertList) -> (Rect, Rect) {
    let height = alerts.height().min(area.height / 2);
    let [content, alert_area] = Layout::vertical([Constraint::Fill(1), Constraint::Length(height)]).areas(area);
    (content, alert_area)
}

/// `label: value` line used by the detail views
pub(crate) fn field_line<'a>(label: &'a str, value: impl Into<String>, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<18}", label), Style::default().fg(theme.text_tertiary)),
        Span::styled(value.into(), Style::default().fg(theme.text_primary)),
    ])
}

/// Tab strip for popups with sub-popups
pub(crate) fn render_tabs(frame: &mut Frame, area: Rect, tabs: &[(&str, &str)], active: Option<&str>, theme: &Theme) {
    let mut spans = Vec::new();
    for (i, (name, label)) in tabs.iter().enumerate() {
        let style = if Some(*name) == active {
            theme.selected_style()
        } else {
            Style::default().fg(theme.text_secondary)
        };
        spans.push(Span::styled(format!(" {} {} ", i + 1, label), style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_events_are_distinct_and_reversible() {
        for kind in PopupKind::ALL {
            assert_eq!(PopupKind::from_show_event(kind.show_event()), Some(kind));
        }
        assert_eq!(PopupKind::from_show_event("ClosePopup"), None);
    }
}
