//! Main console view: fleets, queues and matchmaking configurations.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use log::{debug, info};
use rand::Rng;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::protocol::{
    Fleet, GameSession, MatchmakingConfiguration, Queue, Request, decode, response_errors, response_event,
};
use crate::api::transport::Transport;
use crate::events;
use crate::tui::Theme;
use crate::tui::event_bus::{EventBus, ListenerSet};
use crate::tui::widgets::{AlertList, ListState, table::DataTable};

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAMES_PER_SPINNER_STEP: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Fleets,
    Queues,
    Matchmaking,
}

impl Section {
    fn next(self) -> Self {
        match self {
            Section::Fleets => Section::Queues,
            Section::Queues => Section::Matchmaking,
            Section::Matchmaking => Section::Fleets,
        }
    }

    fn prev(self) -> Self {
        match self {
            Section::Fleets => Section::Matchmaking,
            Section::Queues => Section::Fleets,
            Section::Matchmaking => Section::Queues,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FleetsResponse {
    #[serde(default)]
    fleets: Vec<Fleet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueuesResponse {
    #[serde(default)]
    queues: Vec<Queue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigurationsResponse {
    #[serde(default)]
    configurations: Vec<MatchmakingConfiguration>,
}

#[derive(Default)]
struct DashboardState {
    fleets: Option<Vec<Fleet>>,
    queues: Option<Vec<Queue>>,
    configs: Option<Vec<MatchmakingConfiguration>>,
    fleet_list: ListState,
    queue_list: ListState,
    config_list: ListState,
    focus: Option<Section>,
    animations: bool,
    frame: u64,
    alerts: AlertList,
}

impl DashboardState {
    fn focus(&self) -> Section {
        self.focus.unwrap_or(Section::Fleets)
    }

    fn on_fleets(&mut self, payload: &Value) -> Result<()> {
        let response: FleetsResponse = decode(payload)?;
        self.record_errors(payload);
        self.fleet_list.clamp(response.fleets.len());
        self.fleets = Some(response.fleets);
        Ok(())
    }

    fn on_queues(&mut self, payload: &Value) -> Result<()> {
        let response: QueuesResponse = decode(payload)?;
        self.record_errors(payload);
        self.queue_list.clamp(response.queues.len());
        self.queues = Some(response.queues);
        Ok(())
    }

    fn on_configs(&mut self, payload: &Value) -> Result<()> {
        let response: ConfigurationsResponse = decode(payload)?;
        self.record_errors(payload);
        self.config_list.clamp(response.configurations.len());
        self.configs = Some(response.configurations);
        Ok(())
    }

    fn record_errors(&mut self, payload: &Value) {
        for err in response_errors(payload) {
            self.alerts.error(err);
        }
    }

    fn add_dummy_fleet(&mut self) {
        let mut rng = rand::rng();
        let fleet = Fleet {
            fleet_id: format!("fleet-{}", Uuid::new_v4()),
            name: format!("dummy-fleet-{}", rng.random_range(100..1000)),
            status: "ACTIVE".to_string(),
            instance_type: "c5.large".to_string(),
            game_sessions: Vec::new(),
        };
        info!("Adding dummy fleet {}", fleet.fleet_id);
        let fleets = self.fleets.get_or_insert_with(Vec::new);
        fleets.push(fleet);
        let count = fleets.len();
        self.fleet_list.clamp(count);
    }

    /// Add a few random sessions to the selected fleet, or the first one
    fn add_dummy_game_sessions(&mut self) {
        let index = self.fleet_list.selected().unwrap_or(0);
        let Some(fleet) = self.fleets.as_mut().and_then(|f| f.get_mut(index)) else {
            self.alerts.clear();
            self.alerts.error("Add a fleet before adding game sessions");
            return;
        };

        let mut rng = rand::rng();
        let count = rng.random_range(1..=3);
        for _ in 0..count {
            let maximum = rng.random_range(2..=16);
            fleet.game_sessions.push(GameSession {
                game_session_id: format!("gsess-{}", Uuid::new_v4()),
                fleet_id: fleet.fleet_id.clone(),
                status: "ACTIVE".to_string(),
                location: "us-west-2".to_string(),
                current_player_session_count: rng.random_range(0..=maximum),
                maximum_player_session_count: maximum,
            });
        }
        debug!("Added {} dummy game sessions to {}", count, fleet.fleet_id);
    }

    fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[(self.frame / FRAMES_PER_SPINNER_STEP) as usize % SPINNER_FRAMES.len()]
    }

    fn selected_fleet(&self) -> Option<&Fleet> {
        self.fleets.as_deref().and_then(|f| self.fleet_list.selected_item(f))
    }

    /// Show event requested by a key on the focused section
    fn show_request(&mut self, code: KeyCode) -> Option<(&'static str, Value)> {
        match (self.focus(), code) {
            (Section::Fleets, KeyCode::Enter | KeyCode::Char('c')) => {
                let fleet = self.selected_fleet()?;
                Some((events::SHOW_FLEET_SCALING_POPUP, serde_json::to_value(fleet).ok()?))
            }
            (Section::Fleets, KeyCode::Char('e')) => {
                let fleet = self.selected_fleet()?;
                Some((events::SHOW_FLEET_EVENTS_POPUP, serde_json::to_value(fleet).ok()?))
            }
            (Section::Fleets, KeyCode::Char('g')) => {
                let fleet = self.selected_fleet()?;
                let name = fleet.name.clone();
                let session = fleet.game_sessions.first().and_then(|s| serde_json::to_value(s).ok());
                if session.is_none() {
                    self.alerts.clear();
                    self.alerts.error(format!("Fleet {} has no game sessions", name));
                }
                session.map(|payload| (events::SHOW_GAME_SESSION_POPUP, payload))
            }
            (Section::Queues, KeyCode::Enter) => {
                let queue = self.queues.as_deref().and_then(|q| self.queue_list.selected_item(q))?;
                Some((events::SHOW_QUEUE_POPUP, serde_json::to_value(queue).ok()?))
            }
            (Section::Matchmaking, KeyCode::Enter) => {
                let config = self.configs.as_deref().and_then(|c| self.config_list.selected_item(c))?;
                Some((events::SHOW_MATCHMAKING_POPUP, serde_json::to_value(config).ok()?))
            }
            _ => None,
        }
    }

    fn focused_list(&mut self) -> (&mut ListState, usize) {
        match self.focus() {
            Section::Fleets => (&mut self.fleet_list, self.fleets.as_ref().map_or(0, Vec::len)),
            Section::Queues => (&mut self.queue_list, self.queues.as_ref().map_or(0, Vec::len)),
            Section::Matchmaking => (&mut self.config_list, self.configs.as_ref().map_or(0, Vec::len)),
        }
    }
}

pub struct Dashboard {
    state: Rc<RefCell<DashboardState>>,
    bus: EventBus,
    transport: Rc<dyn Transport>,
    _listeners: ListenerSet,
}

impl Dashboard {
    pub fn new(bus: &EventBus, transport: Rc<dyn Transport>, animations: bool) -> Self {
        let state = Rc::new(RefCell::new(DashboardState {
            animations,
            ..Default::default()
        }));

        let mut listeners = ListenerSet::new(bus);
        listeners.on_state(&response_event("GetFleets"), &state, |s, payload| s.on_fleets(payload));
        listeners.on_state(&response_event("GetQueues"), &state, |s, payload| s.on_queues(payload));
        listeners.on_state(&response_event("GetMatchmakingConfigurations"), &state, |s, payload| {
            s.on_configs(payload)
        });
        listeners.on_state(events::ADD_DUMMY_FLEET, &state, |s, _| {
            s.add_dummy_fleet();
            Ok(())
        });
        listeners.on_state(events::ADD_DUMMY_GAME_SESSIONS, &state, |s, _| {
            s.add_dummy_game_sessions();
            Ok(())
        });
        listeners.on_state(events::ENABLE_ANIMATIONS, &state, |s, _| {
            s.animations = true;
            Ok(())
        });
        listeners.on_state(events::DISABLE_ANIMATIONS, &state, |s, _| {
            s.animations = false;
            Ok(())
        });

        Self {
            state,
            bus: bus.clone(),
            transport,
            _listeners: listeners,
        }
    }

    /// Request fleets, queues and matchmaking configurations
    pub fn refresh(&self) {
        let mut state = self.state.borrow_mut();
        state.alerts.clear();
        for request in [Request::GetFleets, Request::GetQueues, Request::GetMatchmakingConfigurations] {
            if let Err(err) = self.transport.send_object(&request) {
                state.alerts.error(format!("{:#}", err));
            }
        }
    }

    pub fn focus(&self) -> Section {
        self.state.borrow().focus()
    }

    pub fn fleets(&self) -> Vec<Fleet> {
        self.state.borrow().fleets.clone().unwrap_or_default()
    }

    pub fn animations_enabled(&self) -> bool {
        self.state.borrow().animations
    }

    /// Advance per-frame animation state
    pub fn tick(&self) {
        let mut state = self.state.borrow_mut();
        if state.animations {
            state.frame = state.frame.wrapping_add(1);
        }
    }

    /// Returns true when the key was consumed
    pub fn handle_key(&self, key: KeyEvent) -> bool {
        let request = {
            let mut state = self.state.borrow_mut();
            match key.code {
                KeyCode::Tab => {
                    state.focus = Some(state.focus().next());
                    return true;
                }
                KeyCode::BackTab => {
                    state.focus = Some(state.focus().prev());
                    return true;
                }
                KeyCode::Char('r') => {
                    drop(state);
                    self.refresh();
                    return true;
                }
                code => match state.show_request(code) {
                    Some(request) => request,
                    None => {
                        let (list, count) = state.focused_list();
                        return list.handle_key(code, count, 10);
                    }
                },
            }
        };

        let (event, payload) = request;
        debug!("Dashboard requests {}", event);
        self.bus.emit(event, payload);
        true
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let state = &mut *self.state.borrow_mut();
        let alert_height = state.alerts.height().min(area.height / 4);
        let [fleets_area, queues_area, configs_area, alert_area] = Layout::vertical([
            Constraint::Fill(2),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Length(alert_height),
        ])
        .areas(area);

        let focus = state.focus();
        let spinner = state.spinner();
        let animations = state.animations;

        let fleet_rows = state
            .fleets
            .iter()
            .flatten()
            .map(|f| {
                let status = if animations && f.is_active() {
                    format!("{} {}", spinner, f.status)
                } else {
                    f.status.clone()
                };
                vec![
                    f.name.clone(),
                    f.fleet_id.clone(),
                    status,
                    f.instance_type.clone(),
                    f.game_sessions.len().to_string(),
                    f.player_count().to_string(),
                ]
            })
            .collect();
        DataTable::new("Fleets", vec!["Name", "Fleet", "Status", "Instance", "Sessions", "Players"])
            .widths(vec![
                Constraint::Fill(2),
                Constraint::Fill(3),
                Constraint::Length(14),
                Constraint::Length(12),
                Constraint::Length(9),
                Constraint::Length(8),
            ])
            .rows(fleet_rows)
            .status_column(2)
            .focused(focus == Section::Fleets)
            .empty_text(if state.fleets.is_some() { "No fleets" } else { "Loading fleets..." })
            .render(frame, fleets_area, &mut state.fleet_list, theme);

        let queue_rows = state
            .queues
            .iter()
            .flatten()
            .map(|q| {
                vec![
                    q.name.clone(),
                    format!("{}s", q.timeout_in_seconds),
                    q.destinations.len().to_string(),
                ]
            })
            .collect();
        DataTable::new("Queues", vec!["Name", "Timeout", "Destinations"])
            .widths(vec![Constraint::Fill(1), Constraint::Length(10), Constraint::Length(14)])
            .rows(queue_rows)
            .focused(focus == Section::Queues)
            .empty_text(if state.queues.is_some() { "No queues" } else { "Loading queues..." })
            .render(frame, queues_area, &mut state.queue_list, theme);

        let config_rows = state
            .configs
            .iter()
            .flatten()
            .map(|c| {
                vec![
                    c.name.clone(),
                    c.rule_set_name.clone(),
                    format!("{}s", c.request_timeout_seconds),
                ]
            })
            .collect();
        DataTable::new("Matchmaking", vec!["Configuration", "Rule set", "Timeout"])
            .widths(vec![Constraint::Fill(1), Constraint::Fill(1), Constraint::Length(10)])
            .rows(config_rows)
            .focused(focus == Section::Matchmaking)
            .empty_text(if state.configs.is_some() { "No matchmaking configurations" } else { "Loading configurations..." })
            .render(frame, configs_area, &mut state.config_list, theme);

        state.alerts.render(frame, alert_area, theme);
    }

    pub fn hints(&self) -> &'static str {
        match self.focus() {
            Section::Fleets => "Enter/c scaling  e events  g game session  Tab section  r refresh  s settings  Ctrl-Q quit",
            Section::Queues | Section::Matchmaking => "Enter open  Tab section  r refresh  s settings  Ctrl-Q quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::MemoryTransport;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn dashboard() -> (Dashboard, EventBus, Rc<MemoryTransport>) {
        let bus = EventBus::new();
        let transport = Rc::new(MemoryTransport::new());
        let dashboard = Dashboard::new(&bus, transport.clone(), true);
        (dashboard, bus, transport)
    }

    fn load_fleets(bus: &EventBus) {
        bus.emit(
            "GetFleetsResponse",
            json!({"Fleets": [
                {"FleetId": "fleet-1", "Name": "arena", "Status": "ACTIVE", "GameSessions": [
                    {"GameSessionId": "gs-1", "CurrentPlayerSessionCount": 3}
                ]},
                {"FleetId": "fleet-2", "Name": "lobby", "Status": "ACTIVATING"}
            ]}),
        );
    }

    #[test]
    fn test_refresh_requests_all_sections() {
        let (dashboard, _bus, transport) = dashboard();
        dashboard.refresh();
        assert_eq!(
            transport.sent_names(),
            vec!["GetFleets", "GetQueues", "GetMatchmakingConfigurations"]
        );
    }

    #[test]
    fn test_enter_on_fleet_emits_scaling_popup() {
        let (dashboard, bus, _transport) = dashboard();
        let shown = Rc::new(RefCell::new(Vec::new()));
        let log = shown.clone();
        bus.on(events::SHOW_FLEET_SCALING_POPUP, move |payload| {
            log.borrow_mut().push(payload["FleetId"].clone());
            Ok(())
        });

        load_fleets(&bus);
        dashboard.handle_key(KeyEvent::from(KeyCode::Down));
        assert!(dashboard.handle_key(KeyEvent::from(KeyCode::Enter)));
        assert_eq!(*shown.borrow(), vec![json!("fleet-2")]);
    }

    #[test]
    fn test_game_session_uses_first_session() {
        let (dashboard, bus, _transport) = dashboard();
        let shown = Rc::new(RefCell::new(None));
        let log = shown.clone();
        bus.on(events::SHOW_GAME_SESSION_POPUP, move |payload| {
            *log.borrow_mut() = Some(payload.clone());
            Ok(())
        });

        load_fleets(&bus);
        dashboard.handle_key(KeyEvent::from(KeyCode::Char('g')));
        let payload = shown.borrow().clone().unwrap();
        assert_eq!(payload["GameSessionId"], "gs-1");

        // Second fleet has no sessions
        *shown.borrow_mut() = None;
        dashboard.handle_key(KeyEvent::from(KeyCode::Down));
        dashboard.handle_key(KeyEvent::from(KeyCode::Char('g')));
        assert!(shown.borrow().is_none());
    }

    #[test]
    fn test_tab_cycles_sections() {
        let (dashboard, _bus, _transport) = dashboard();
        assert_eq!(dashboard.focus(), Section::Fleets);
        dashboard.handle_key(KeyEvent::from(KeyCode::Tab));
        assert_eq!(dashboard.focus(), Section::Queues);
        dashboard.handle_key(KeyEvent::from(KeyCode::Tab));
        dashboard.handle_key(KeyEvent::from(KeyCode::Tab));
        assert_eq!(dashboard.focus(), Section::Fleets);
        dashboard.handle_key(KeyEvent::from(KeyCode::BackTab));
        assert_eq!(dashboard.focus(), Section::Matchmaking);
    }

    #[test]
    fn test_dummy_entities() {
        let (dashboard, bus, _transport) = dashboard();
        bus.emit(events::ADD_DUMMY_FLEET, json!({}));
        bus.emit(events::ADD_DUMMY_GAME_SESSIONS, json!({}));
        let fleets = dashboard.fleets();
        assert_eq!(fleets.len(), 1);
        assert!(fleets[0].fleet_id.starts_with("fleet-"));
        let sessions = &fleets[0].game_sessions;
        assert!((1..=3).contains(&sessions.len()));
        assert!(sessions
            .iter()
            .all(|s| s.current_player_session_count <= s.maximum_player_session_count));
    }

    #[test]
    fn test_animation_events_and_render() {
        let (dashboard, bus, _transport) = dashboard();
        load_fleets(&bus);
        bus.emit(events::DISABLE_ANIMATIONS, json!({}));
        assert!(!dashboard.animations_enabled());
        dashboard.tick();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                dashboard.render(f, area, &Theme::default());
            })
            .unwrap();
        let text: String = terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("arena"));
        assert!(text.contains("Loading queues"));
        assert!(!text.contains(SPINNER_FRAMES[0]));
    }
}
