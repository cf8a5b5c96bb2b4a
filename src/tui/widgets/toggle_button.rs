//! Two-state buttons.
//!
//! A [`ToggleButton`] owns two mutually exclusive images. Only the visible
//! image is wired for clicks: its hit rectangle is recorded when drawn and
//! [`ToggleButton::hit_test`] ignores the hidden one.

use log::debug;
use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use serde_json::json;

use crate::events::{DISABLE_ANIMATIONS, ENABLE_ANIMATIONS};
use crate::tui::Theme;
use crate::tui::event_bus::EventBus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleImage {
    pub glyph: &'static str,
    pub label: String,
}

impl ToggleImage {
    pub fn new(glyph: &'static str, label: impl Into<String>) -> Self {
        Self {
            glyph,
            label: label.into(),
        }
    }
}

/// Which of the two images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    On,
    Off,
}

/// Internal notification produced by every click or toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleChanged {
    pub on: bool,
}

#[derive(Debug, Clone)]
pub struct ToggleButton {
    on: bool,
    on_image: ToggleImage,
    off_image: ToggleImage,
    interactive: ImageSlot,
    hit_area: Option<Rect>,
}

impl ToggleButton {
    pub fn new(on: bool, on_image: ToggleImage, off_image: ToggleImage) -> Self {
        Self {
            on,
            on_image,
            off_image,
            interactive: if on { ImageSlot::On } else { ImageSlot::Off },
            hit_area: None,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn visible_slot(&self) -> ImageSlot {
        if self.on { ImageSlot::On } else { ImageSlot::Off }
    }

    /// The image currently wired for clicks
    pub fn interactive_slot(&self) -> ImageSlot {
        self.interactive
    }

    pub fn visible_image(&self) -> &ToggleImage {
        match self.visible_slot() {
            ImageSlot::On => &self.on_image,
            ImageSlot::Off => &self.off_image,
        }
    }

    pub fn toggle(&mut self) -> ToggleChanged {
        self.on = !self.on;
        // Unwire the old image, wire the newly visible one
        self.interactive = self.visible_slot();
        self.hit_area = None;
        debug!("Toggle '{}' is now {}", self.visible_image().label, self.on);
        ToggleChanged { on: self.on }
    }

    /// Whether a click at (column, row) lands on the interactive image
    pub fn hit_test(&self, column: u16, row: u16) -> bool {
        self.interactive == self.visible_slot()
            && self
                .hit_area
                .is_some_and(|area| area.contains(Position::new(column, row)))
    }

    /// Toggle when the click lands on the visible image
    pub fn click(&mut self, column: u16, row: u16) -> Option<ToggleChanged> {
        if self.hit_test(column, row) {
            Some(self.toggle())
        } else {
            None
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let image = self.visible_image();
        let glyph_style = if self.on {
            theme.success_style()
        } else {
            Style::default().fg(theme.text_tertiary)
        };
        let line = Line::from(vec![
            Span::styled(image.glyph, glyph_style),
            Span::raw(" "),
            Span::styled(image.label.clone(), Style::default().fg(theme.text_primary)),
        ]);
        let width = (line.width() as u16).min(area.width);
        frame.render_widget(Paragraph::new(line), area);
        self.hit_area = Some(Rect { width, height: area.height.min(1), ..area });
    }
}

/// Toggle that broadcasts `EnableAnimations` / `DisableAnimations`
pub struct AnimationsToggle {
    button: ToggleButton,
    bus: EventBus,
}

impl AnimationsToggle {
    pub fn new(bus: EventBus, enabled: bool) -> Self {
        Self {
            button: ToggleButton::new(
                enabled,
                ToggleImage::new("[x]", "Animations"),
                ToggleImage::new("[ ]", "Animations"),
            ),
            bus,
        }
    }

    pub fn button(&self) -> &ToggleButton {
        &self.button
    }

    pub fn is_on(&self) -> bool {
        self.button.is_on()
    }

    pub fn toggle(&mut self) -> ToggleChanged {
        let changed = self.button.toggle();
        self.broadcast(changed);
        changed
    }

    pub fn click(&mut self, column: u16, row: u16) -> Option<ToggleChanged> {
        let changed = self.button.click(column, row)?;
        self.broadcast(changed);
        Some(changed)
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.button.render(frame, area, theme);
    }

    fn broadcast(&self, changed: ToggleChanged) {
        let event = if changed.on { ENABLE_ANIMATIONS } else { DISABLE_ANIMATIONS };
        self.bus.emit(event, json!({}));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn button() -> ToggleButton {
        ToggleButton::new(false, ToggleImage::new("●", "On"), ToggleImage::new("○", "Off"))
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut b = button();
        let before = (b.visible_slot(), b.interactive_slot(), b.visible_image().clone());

        assert_eq!(b.toggle(), ToggleChanged { on: true });
        assert_eq!(b.visible_slot(), ImageSlot::On);
        assert_eq!(b.interactive_slot(), ImageSlot::On);

        assert_eq!(b.toggle(), ToggleChanged { on: false });
        assert_eq!((b.visible_slot(), b.interactive_slot(), b.visible_image().clone()), before);
    }

    #[test]
    fn test_only_drawn_image_is_clickable() {
        let mut b = button();
        assert!(!b.hit_test(0, 0));

        let mut terminal = Terminal::new(TestBackend::new(20, 2)).unwrap();
        terminal
            .draw(|f| b.render(f, Rect::new(0, 0, 20, 1), &Theme::default()))
            .unwrap();
        assert!(b.hit_test(0, 0));
        assert!(!b.hit_test(0, 1));
        assert!(!b.hit_test(15, 0));

        assert_eq!(b.click(1, 0), Some(ToggleChanged { on: true }));
        // the newly visible image is not wired until drawn
        assert_eq!(b.click(1, 0), None);
    }

    #[test]
    fn test_animations_toggle_emits() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for event in [ENABLE_ANIMATIONS, DISABLE_ANIMATIONS] {
            let seen = seen.clone();
            bus.on(event, move |_| {
                seen.borrow_mut().push(event);
                Ok(())
            });
        }

        let mut toggle = AnimationsToggle::new(bus, true);
        toggle.toggle();
        toggle.toggle();
        assert_eq!(*seen.borrow(), vec![DISABLE_ANIMATIONS, ENABLE_ANIMATIONS]);
        assert!(toggle.is_on());
    }
}
