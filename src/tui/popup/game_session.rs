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
use crate::api::protocol::{
    GameSession, GameSessionLogs, PlayerSession, Request, decode, response_errors, response_event,
};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::widgets::{AlertList, ListState, table::DataTable};

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlayerSessionsResponse {
    game_session_id: String,
    #[serde(default)]
    player_sessions: Vec<PlayerSession>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LogsResponse {
    game_session_id: String,
    #[serde(flatten)]
    logs: GameSessionLogs,
}

struct SessionView {
    ctx: PopupContext,
    session: Option<GameSession>,
    players: Option<Vec<PlayerSession>>,
    logs: GameSessionLogs,
    list: ListState,
    alerts: AlertList,
}

impl SessionView {
    fn session_id(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.game_session_id.as_str())
    }

    fn request(&mut self) {
        let Some(id) = self.session.as_ref().map(|s| s.game_session_id.clone()) else {
            return;
        };
        self.alerts.clear();
        self.ctx.send(
            &Request::GetPlayerSessions {
                game_session_id: id.clone(),
            },
            &mut self.alerts,
        );
        self.ctx
            .send(&Request::GetGameSessionLogs { game_session_id: id }, &mut self.alerts);
    }

    fn on_players(&mut self, payload: &Value) -> Result<()> {
        let response: PlayerSessionsResponse = decode(payload)?;
        if response.game_session_id != self.session_id() {
            return Ok(());
        }
        for err in response_errors(payload) {
            self.alerts.error(err);
        }
        self.list.clamp(response.player_sessions.len());
        self.players = Some(response.player_sessions);
        Ok(())
    }

    fn on_logs(&mut self, payload: &Value) -> Result<()> {
        let response: LogsResponse = decode(payload)?;
        if response.game_session_id != self.session_id() {
            return Ok(());
        }
        for err in response_errors(payload) {
            self.alerts.error(err);
        }
        self.logs = response.logs;
        Ok(())
    }
}

pub struct GameSessionPopup {
    view: Rc<RefCell<SessionView>>,
    listeners: ListenerSet,
}

impl GameSessionPopup {
    pub fn new(ctx: PopupContext) -> Self {
        let listeners = ListenerSet::new(&ctx.bus);
        Self {
            view: Rc::new(RefCell::new(SessionView {
                ctx,
                session: None,
                players: None,
                logs: GameSessionLogs::default(),
                list: ListState::new(),
                alerts: AlertList::new(),
            })),
            listeners,
        }
    }
}

impl Popup for GameSessionPopup {
    fn kind(&self) -> PopupKind {
        PopupKind::GameSession
    }

    fn set_popup_data(&mut self, data: &Value) -> Result<()> {
        let session: GameSession = decode(data)?;
        let mut view = self.view.borrow_mut();
        view.session = Some(session);
        view.request();
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.listeners
            .on_state(&response_event("GetPlayerSessions"), &self.view, |view, payload| view.on_players(payload));
        self.listeners
            .on_state(&response_event("GetGameSessionLogs"), &self.view, |view, payload| view.on_logs(payload));
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
        let [info, table_area] = Layout::vertical([Constraint::Length(7), Constraint::Fill(1)]).areas(content);

        if let Some(s) = &view.session {
            let lines = vec![
                field_line("Game session", s.game_session_id.clone(), theme),
                field_line("Fleet", s.fleet_id.clone(), theme),
                field_line("Location", s.location.clone(), theme),
                field_line("Status", s.status.clone(), theme),
                field_line(
                    "Players",
                    format!("{}/{}", s.current_player_session_count, s.maximum_player_session_count),
                    theme,
                ),
                field_line("Log group", view.logs.log_group.clone().unwrap_or_default(), theme),
                field_line("Log stream", view.logs.log_stream.clone().unwrap_or_default(), theme),
            ];
            frame.render_widget(Paragraph::new(lines), info);
        }

        let rows = view
            .players
            .iter()
            .flatten()
            .map(|p| {
                vec![
                    p.player_session_id.clone(),
                    p.player_id.clone(),
                    p.status.clone(),
                    p.ip_address.clone().unwrap_or_default(),
                ]
            })
            .collect();
        DataTable::new("Player sessions", vec!["Player session", "Player", "Status", "IP address"])
            .rows(rows)
            .status_column(2)
            .focused(true)
            .empty_text(if view.players.is_some() { "No player sessions" } else { "Loading player sessions..." })
            .render(frame, table_area, &mut view.list, theme);

        view.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let view = &mut *self.view.borrow_mut();
        if key.code == KeyCode::Char('r') {
            view.request();
            return KeyResult::Handled;
        }
        let count = view.players.as_ref().map_or(0, Vec::len);
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
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    #[test]
    fn test_requests_players_and_logs() {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport.clone(), Scheduler::new(), UiSettings::default());
        let mut popup = GameSessionPopup::new(ctx.clone());
        popup.set_popup_data(&json!({"GameSessionId": "gs-1"})).unwrap();
        popup.setup_event_listeners();
        assert_eq!(transport.sent_names(), vec!["GetPlayerSessions", "GetGameSessionLogs"]);

        ctx.bus.emit(
            "GetGameSessionLogsResponse",
            json!({"GameSessionId": "gs-1", "LogStream": "stream-a"}),
        );
        let view = popup.view.borrow();
        assert_eq!(view.logs.log_group, None);
        assert_eq!(view.logs.log_stream.as_deref(), Some("stream-a"));
    }

    #[test]
    fn test_renders_without_logs() {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport, Scheduler::new(), UiSettings::default());
        let mut popup = GameSessionPopup::new(ctx);
        popup.set_popup_data(&json!({"GameSessionId": "gs-1"})).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                popup.render(f, area, &Theme::default());
            })
            .unwrap();
        let text: String = terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Log group"));
        assert!(text.contains("Loading player sessions"));
    }
}
