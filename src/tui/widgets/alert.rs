use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Wrap};

use crate::tui::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub text: String,
}

/// Inline alert region of a popup: backend errors, validation failures and
/// success confirmations
#[derive(Debug, Clone, Default)]
pub struct AlertList {
    alerts: Vec<Alert>,
}

impl AlertList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.alerts.push(Alert {
            level: AlertLevel::Error,
            text: text.into(),
        });
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.alerts.push(Alert {
            level: AlertLevel::Success,
            text: text.into(),
        });
    }

    /// Replace the alerts with a response's errors, or `ok` when there are
    /// none. Returns true when the response carried errors.
    pub fn show_response(&mut self, errors: Vec<String>, ok: Option<&str>) -> bool {
        self.clear();
        if errors.is_empty() {
            if let Some(ok) = ok {
                self.success(ok);
            }
            return false;
        }
        for err in errors {
            self.error(err);
        }
        true
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.alerts
            .iter()
            .filter(|a| a.level == AlertLevel::Error)
            .map(|a| a.text.as_str())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Rows needed to draw every alert unwrapped
    pub fn height(&self) -> u16 {
        self.alerts.len() as u16
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if self.alerts.is_empty() || area.height == 0 {
            return;
        }
        let lines: Vec<Line> = self
            .alerts
            .iter()
            .map(|alert| match alert.level {
                AlertLevel::Error => Line::styled(format!("✗ {}", alert.text), theme.error_style()),
                AlertLevel::Success => Line::styled(format!("✓ {}", alert.text), theme.success_style()),
            })
            .collect();
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
    }
}
