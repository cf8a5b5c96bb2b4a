//! Matchmaking popup: configuration details, rule set list and a rule set
//! editor, as three sub-popups sharing one draft.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::debug;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use serde::Deserialize;
use serde_json::Value;

use super::{KeyResult, Popup, PopupContext, PopupKind, SubPopup, SubPopupSet, field_line, render_tabs, split_alerts};
use crate::api::protocol::{MatchmakingConfiguration, Request, RuleSet, decode, format_time, response_errors, response_event};
use crate::tui::Theme;
use crate::tui::event_bus::ListenerSet;
use crate::tui::widgets::{AlertList, ListState, TextArea, TextInput, table::DataTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftField {
    Name,
    Body,
}

/// Rule set being edited, shared by the list and the editor
struct Draft {
    name: TextInput,
    body: TextArea,
    focus: DraftField,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            name: TextInput::new().with_max_length(128),
            body: TextArea::new(),
            focus: DraftField::Body,
        }
    }
}

type SharedDraft = Rc<RefCell<Draft>>;

struct ConfigPanel {
    config: Option<MatchmakingConfiguration>,
}

impl SubPopup for ConfigPanel {
    fn name(&self) -> &'static str {
        "config"
    }

    fn label(&self) -> &'static str {
        "Configuration"
    }

    fn activate(&mut self) {}

    fn deactivate(&mut self) {}

    fn listener_count(&self) -> usize {
        0
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let Some(c) = &self.config else {
            let text = Line::styled("No matchmaking configuration selected", Style::default().fg(theme.text_tertiary));
            frame.render_widget(Paragraph::new(text), area);
            return;
        };

        let mut lines = vec![
            field_line("Name", c.name.clone(), theme),
            field_line("Rule set", c.rule_set_name.clone(), theme),
            field_line("Request timeout", format!("{}s", c.request_timeout_seconds), theme),
            field_line("Acceptance", if c.acceptance_required { "required" } else { "not required" }, theme),
            Line::raw(""),
            Line::styled("Queues", theme.header_style()),
        ];
        for arn in &c.game_session_queue_arns {
            lines.push(Line::raw(format!("  {}", arn)));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn handle_key(&mut self, _key: KeyEvent) -> KeyResult {
        KeyResult::Ignored
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RuleSetsResponse {
    #[serde(default)]
    rule_sets: Vec<RuleSet>,
}

struct RuleSetsState {
    ctx: PopupContext,
    rule_sets: Option<Vec<RuleSet>>,
    list: ListState,
    alerts: AlertList,
}

impl RuleSetsState {
    fn request(&mut self) {
        self.ctx.send(&Request::GetMatchmakingRuleSets, &mut self.alerts);
    }

    fn on_rule_sets(&mut self, payload: &Value) -> Result<()> {
        let response: RuleSetsResponse = decode(payload)?;
        let errors = response_errors(payload);
        if !errors.is_empty() {
            self.alerts.show_response(errors, None);
        }
        self.list.clamp(response.rule_sets.len());
        self.rule_sets = Some(response.rule_sets);
        Ok(())
    }

    fn on_deleted(&mut self, payload: &Value) -> Result<()> {
        if !self.alerts.show_response(response_errors(payload), Some("Rule set deleted")) {
            self.request();
        }
        Ok(())
    }

    fn selected(&self) -> Option<&RuleSet> {
        self.rule_sets.as_deref().and_then(|sets| self.list.selected_item(sets))
    }
}

struct RuleSetsPanel {
    state: Rc<RefCell<RuleSetsState>>,
    draft: SharedDraft,
    listeners: ListenerSet,
}

impl SubPopup for RuleSetsPanel {
    fn name(&self) -> &'static str {
        "rulesets"
    }

    fn label(&self) -> &'static str {
        "Rule sets"
    }

    fn activate(&mut self) {
        self.listeners.on_state(&response_event("GetMatchmakingRuleSets"), &self.state, |s, payload| {
            s.on_rule_sets(payload)
        });
        self.listeners.on_state(&response_event("DeleteMatchmakingRuleSet"), &self.state, |s, payload| {
            s.on_deleted(payload)
        });
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
            .rule_sets
            .iter()
            .flatten()
            .map(|r| vec![r.rule_set_name.clone(), format_time(r.creation_time)])
            .collect();
        DataTable::new("Rule sets", vec!["Name", "Created"])
            .widths(vec![Constraint::Fill(1), Constraint::Length(20)])
            .rows(rows)
            .focused(true)
            .empty_text(if state.rule_sets.is_some() { "No rule sets" } else { "Loading rule sets..." })
            .render(frame, content, &mut state.list, theme);
        state.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let state = &mut *self.state.borrow_mut();
        match key.code {
            KeyCode::Enter => {
                let Some(rule_set) = state.selected() else {
                    return KeyResult::Handled;
                };
                let mut draft = self.draft.borrow_mut();
                draft.name.set_value(rule_set.rule_set_name.clone());
                draft.body = TextArea::from_text(&pretty_json(&rule_set.rule_set_body));
                draft.focus = DraftField::Body;
                KeyResult::Switch("editor")
            }
            KeyCode::Char('n') => {
                *self.draft.borrow_mut() = Draft::default();
                KeyResult::Switch("editor")
            }
            KeyCode::Char('d') => {
                if let Some(name) = state.selected().map(|r| r.rule_set_name.clone()) {
                    debug!("Deleting rule set {}", name);
                    state.alerts.clear();
                    let request = Request::DeleteMatchmakingRuleSet { rule_set_name: name };
                    state.ctx.send(&request, &mut state.alerts);
                }
                KeyResult::Handled
            }
            KeyCode::Char('r') => {
                state.request();
                KeyResult::Handled
            }
            code => {
                let count = state.rule_sets.as_ref().map_or(0, Vec::len);
                if state.list.handle_key(code, count, 10) {
                    KeyResult::Handled
                } else {
                    KeyResult::Ignored
                }
            }
        }
    }
}

/// Re-indent a rule set body when it is valid JSON
fn pretty_json(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

struct EditorState {
    ctx: PopupContext,
    validation: Option<String>,
    alerts: AlertList,
}

impl EditorState {
    /// Local JSON check first, then ask the backend
    fn validate(&mut self, draft: &Draft) {
        self.alerts.clear();
        let body = draft.body.text();
        if let Err(err) = serde_json::from_str::<Value>(&body) {
            self.validation = Some(format!("Invalid JSON: {}", err));
            return;
        }
        self.validation = None;
        self.ctx
            .send(&Request::ValidateMatchmakingRuleSet { rule_set_body: body }, &mut self.alerts);
    }

    fn create(&mut self, draft: &Draft) {
        self.alerts.clear();
        let name = draft.name.value().trim().to_string();
        if name.is_empty() {
            self.validation = Some("Rule set name is required".to_string());
            return;
        }
        let body = draft.body.text();
        if let Err(err) = serde_json::from_str::<Value>(&body) {
            self.validation = Some(format!("Invalid JSON: {}", err));
            return;
        }
        self.validation = None;
        self.ctx.send(
            &Request::CreateMatchmakingRuleSet {
                rule_set_name: name,
                rule_set_body: body,
            },
            &mut self.alerts,
        );
    }

    fn on_validated(&mut self, payload: &Value) -> Result<()> {
        let valid = payload.get("Valid").and_then(Value::as_bool).unwrap_or(false);
        let mut errors = response_errors(payload);
        if !valid && errors.is_empty() {
            errors.push("Rule set is not valid".to_string());
        }
        self.alerts.show_response(errors, Some("Rule set is valid"));
        Ok(())
    }

    fn on_created(&mut self, payload: &Value) -> Result<()> {
        self.alerts
            .show_response(response_errors(payload), Some("Rule set created"));
        Ok(())
    }
}

struct EditorPanel {
    state: Rc<RefCell<EditorState>>,
    draft: SharedDraft,
    listeners: ListenerSet,
}

impl SubPopup for EditorPanel {
    fn name(&self) -> &'static str {
        "editor"
    }

    fn label(&self) -> &'static str {
        "Editor"
    }

    fn activate(&mut self) {
        self.listeners.on_state(&response_event("ValidateMatchmakingRuleSet"), &self.state, |s, payload| {
            s.on_validated(payload)
        });
        self.listeners.on_state(&response_event("CreateMatchmakingRuleSet"), &self.state, |s, payload| {
            s.on_created(payload)
        });
    }

    fn deactivate(&mut self) {
        self.listeners.remove_all();
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let state = self.state.borrow();
        let draft = self.draft.borrow();
        let (content, alert_area) = split_alerts(area, &state.alerts);
        let [name_area, body_area, status] =
            Layout::vertical([Constraint::Length(3), Constraint::Fill(1), Constraint::Length(1)]).areas(content);

        let name_text = if draft.focus == DraftField::Name {
            draft.name.display()
        } else {
            draft.name.value().to_string()
        };
        let name = Paragraph::new(name_text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style(draft.focus == DraftField::Name))
                .title(" Name "),
        );
        frame.render_widget(name, name_area);

        let (cursor_row, cursor_col) = draft.body.cursor();
        let show_cursor = draft.focus == DraftField::Body;
        let lines: Vec<Line> = draft
            .body
            .lines()
            .iter()
            .enumerate()
            .map(|(row, text)| {
                if !(show_cursor && row == cursor_row) {
                    return Line::raw(text.clone());
                }
                let split = text.char_indices().nth(cursor_col).map_or(text.len(), |(i, _)| i);
                Line::from(vec![
                    Span::raw(text[..split].to_string()),
                    Span::styled("│", Style::default().fg(theme.accent_primary)),
                    Span::raw(text[split..].to_string()),
                ])
            })
            .collect();
        let visible = body_area.height.saturating_sub(2) as usize;
        let scroll = cursor_row.saturating_sub(visible.saturating_sub(1)) as u16;
        let body = Paragraph::new(lines).scroll((scroll, 0)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style(show_cursor))
                .title(" Rule set body (JSON) "),
        );
        frame.render_widget(body, body_area);

        if let Some(err) = &state.validation {
            frame.render_widget(Paragraph::new(Line::styled(err.as_str(), theme.error_style())), status);
        }
        state.alerts.render(frame, alert_area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        let mut draft = self.draft.borrow_mut();
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('v') => {
                    self.state.borrow_mut().validate(&draft);
                    KeyResult::Handled
                }
                KeyCode::Char('s') => {
                    self.state.borrow_mut().create(&draft);
                    KeyResult::Handled
                }
                KeyCode::Char('n') => {
                    draft.focus = match draft.focus {
                        DraftField::Name => DraftField::Body,
                        DraftField::Body => DraftField::Name,
                    };
                    KeyResult::Handled
                }
                _ => KeyResult::Ignored,
            };
        }

        match draft.focus {
            DraftField::Name => {
                if key.code == KeyCode::Enter {
                    draft.focus = DraftField::Body;
                } else {
                    draft.name.handle_key(key.code);
                }
            }
            DraftField::Body => {
                if draft.body.handle_key(key) {
                    self.state.borrow_mut().validation = None;
                }
            }
        }
        KeyResult::Handled
    }
}

pub struct MatchmakingPopup {
    ctx: PopupContext,
    panels: SubPopupSet,
}

impl MatchmakingPopup {
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

impl Popup for MatchmakingPopup {
    fn kind(&self) -> PopupKind {
        PopupKind::Matchmaking
    }

    fn set_popup_data(&mut self, data: &Value) -> Result<()> {
        // Opened from settings without a configuration the payload is empty
        let config = match data.get("Name") {
            Some(_) => Some(decode::<MatchmakingConfiguration>(data)?),
            None => None,
        };

        let draft: SharedDraft = Rc::new(RefCell::new(Draft::default()));
        let rule_sets = RuleSetsPanel {
            state: Rc::new(RefCell::new(RuleSetsState {
                ctx: self.ctx.clone(),
                rule_sets: None,
                list: ListState::new(),
                alerts: AlertList::new(),
            })),
            draft: draft.clone(),
            listeners: ListenerSet::new(&self.ctx.bus),
        };
        let editor = EditorPanel {
            state: Rc::new(RefCell::new(EditorState {
                ctx: self.ctx.clone(),
                validation: None,
                alerts: AlertList::new(),
            })),
            draft,
            listeners: ListenerSet::new(&self.ctx.bus),
        };

        self.panels = SubPopupSet::new()
            .with(ConfigPanel { config })
            .with(rule_sets)
            .with(editor);
        Ok(())
    }

    fn setup_event_listeners(&mut self) {
        self.panels.switch_to("config");
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
            Some("rulesets") => "Enter edit  n new  d delete  r refresh  Tab next  Esc close",
            Some("editor") => "Ctrl-N name/body  Ctrl-V validate  Ctrl-S create  Tab next  Esc close",
            _ => "Tab/1-3 switch  Esc close",
        }
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

    fn open() -> (MatchmakingPopup, PopupContext, Rc<MemoryTransport>) {
        let transport = Rc::new(MemoryTransport::new());
        let ctx = PopupContext::new(EventBus::new(), transport.clone(), Scheduler::new(), UiSettings::default());
        let mut popup = MatchmakingPopup::new(ctx.clone());
        popup.set_popup_data(&json!({})).unwrap();
        popup.setup_event_listeners();
        (popup, ctx, transport)
    }

    fn press(popup: &mut MatchmakingPopup, code: KeyCode) {
        popup.handle_key(KeyEvent::from(code));
    }

    fn ctrl(popup: &mut MatchmakingPopup, c: char) {
        popup.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    #[test]
    fn test_rule_sets_loaded_and_opened_in_editor() {
        let (mut popup, ctx, transport) = open();
        assert_eq!(popup.active_panel(), Some("config"));

        press(&mut popup, KeyCode::Char('2'));
        assert_eq!(transport.sent_names(), vec!["GetMatchmakingRuleSets"]);

        ctx.bus.emit(
            "GetMatchmakingRuleSetsResponse",
            json!({"RuleSets": [{"RuleSetName": "two-teams", "RuleSetBody": "{\"teams\":[]}"}]}),
        );
        press(&mut popup, KeyCode::Enter);
        assert_eq!(popup.active_panel(), Some("editor"));
        assert_eq!(ctx.bus.listener_count("GetMatchmakingRuleSetsResponse"), 0);
        assert_eq!(ctx.bus.listener_count("ValidateMatchmakingRuleSetResponse"), 1);

        ctrl(&mut popup, 's');
        let sent = transport.sent();
        assert_eq!(
            sent.last(),
            Some(&Request::CreateMatchmakingRuleSet {
                rule_set_name: "two-teams".to_string(),
                rule_set_body: "{\n  \"teams\": []\n}".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_json_is_caught_locally() {
        let (mut popup, _ctx, transport) = open();
        press(&mut popup, KeyCode::Char('3'));
        press(&mut popup, KeyCode::Char('{'));
        ctrl(&mut popup, 'v');
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_invalid_verdict_without_errors_is_reported() {
        let (_popup, ctx, _transport) = open();
        let mut state = EditorState {
            ctx,
            validation: None,
            alerts: AlertList::new(),
        };
        state.on_validated(&json!({"Valid": false})).unwrap();
        assert_eq!(state.alerts.errors().collect::<Vec<_>>(), vec!["Rule set is not valid"]);

        state.on_validated(&json!({"Valid": true})).unwrap();
        assert!(!state.alerts.has_errors());
    }

    #[test]
    fn test_delete_selected_rule_set() {
        let (mut popup, ctx, transport) = open();
        press(&mut popup, KeyCode::Char('2'));
        ctx.bus.emit(
            "GetMatchmakingRuleSetsResponse",
            json!({"RuleSets": [{"RuleSetName": "a"}, {"RuleSetName": "b"}]}),
        );
        press(&mut popup, KeyCode::Down);
        press(&mut popup, KeyCode::Char('d'));
        assert_eq!(
            transport.sent().last(),
            Some(&Request::DeleteMatchmakingRuleSet {
                rule_set_name: "b".to_string()
            })
        );

        ctx.bus.emit("DeleteMatchmakingRuleSetResponse", json!({"Errors": []}));
        assert_eq!(transport.count("GetMatchmakingRuleSets"), 2);
    }
}
