use crossterm::event::{KeyCode, KeyEvent};
use log::{debug, warn};
use ratatui::Frame;
use ratatui::layout::Rect;

use super::KeyResult;
use crate::tui::Theme;

/// A named content panel inside a popup.
///
/// Only the active panel of a [`SubPopupSet`] holds bus registrations.
pub trait SubPopup {
    fn name(&self) -> &'static str;

    fn label(&self) -> &'static str {
        self.name()
    }

    /// Register listeners and issue the panel's initial requests
    fn activate(&mut self);

    /// Remove every listener registered by `activate`
    fn deactivate(&mut self);

    fn listener_count(&self) -> usize;

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult;
}

/// Panels of one popup with at most one active
#[derive(Default)]
pub struct SubPopupSet {
    panels: Vec<Box<dyn SubPopup>>,
    active: Option<usize>,
}

impl SubPopupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, panel: impl SubPopup + 'static) -> Self {
        self.add(Box::new(panel));
        self
    }

    pub fn add(&mut self, panel: Box<dyn SubPopup>) {
        self.panels.push(panel);
    }

    /// (name, label) pairs in tab order
    pub fn tabs(&self) -> Vec<(&'static str, &'static str)> {
        self.panels.iter().map(|p| (p.name(), p.label())).collect()
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.map(|i| self.panels[i].name())
    }

    /// Make `name` the active panel. The previous panel is deactivated
    /// before the new one is activated. Switching to the active panel is a
    /// no-op.
    pub fn switch_to(&mut self, name: &str) -> bool {
        let Some(next) = self.panels.iter().position(|p| p.name() == name) else {
            warn!("Unknown sub-popup '{}'", name);
            return false;
        };
        if self.active == Some(next) {
            return true;
        }

        if let Some(current) = self.active.take() {
            self.panels[current].deactivate();
        }
        debug!("Switching to sub-popup '{}'", name);
        self.panels[next].activate();
        self.active = Some(next);
        true
    }

    pub fn deactivate_all(&mut self) {
        if let Some(current) = self.active.take() {
            self.panels[current].deactivate();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.panels.iter().map(|p| p.listener_count()).sum()
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if let Some(i) = self.active {
            self.panels[i].render(frame, area, theme);
        }
    }

    /// Tab cycles panels. Other keys go to the active panel first; a digit
    /// it ignores picks a panel by position.
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult {
        match key.code {
            KeyCode::Tab => return self.cycle(1),
            KeyCode::BackTab => return self.cycle(self.panels.len().saturating_sub(1)),
            _ => {}
        }

        let result = match self.active {
            Some(i) => self.panels[i].handle_key(key),
            None => KeyResult::Ignored,
        };

        match result {
            KeyResult::Switch(name) => {
                self.switch_to(name);
                KeyResult::Handled
            }
            KeyResult::Ignored => self.digit_switch(key.code),
            other => other,
        }
    }

    fn cycle(&mut self, step: usize) -> KeyResult {
        if self.panels.is_empty() {
            return KeyResult::Ignored;
        }
        let next = self.active.map_or(0, |i| (i + step) % self.panels.len());
        let name = self.panels[next].name();
        self.switch_to(name);
        KeyResult::Handled
    }

    fn digit_switch(&mut self, code: KeyCode) -> KeyResult {
        let KeyCode::Char(c @ '1'..='9') = code else {
            return KeyResult::Ignored;
        };
        let index = c as usize - '1' as usize;
        match self.panels.get(index).map(|p| p.name()) {
            Some(name) => {
                self.switch_to(name);
                KeyResult::Handled
            }
            None => KeyResult::Ignored,
        }
    }
}
