use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeVariant {
    #[default]
    Mocha, // Dark theme (default)
    Latte, // Light theme
}

#[derive(Debug, Clone)]
pub struct Theme {
    // Accents
    pub accent_primary: Color,   // Focus, selection
    pub accent_secondary: Color, // Section headers, links
    pub accent_tertiary: Color,  // Popup titles
    pub accent_error: Color,     // Backend errors, failed fleets
    pub accent_warning: Color,   // Pending, activating
    pub accent_success: Color,   // Active fleets, success alerts
    pub accent_info: Color,      // Spinner, informational lines
    pub accent_muted: Color,     // Key hints

    // Text
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_tertiary: Color,

    // Structure
    pub border_primary: Color,
    pub border_secondary: Color,
    pub bg_base: Color,
    pub bg_surface: Color,
    pub bg_elevated: Color,
}

impl Theme {
    pub fn new(variant: ThemeVariant) -> Self {
        match variant {
            ThemeVariant::Mocha => Self::mocha(),
            ThemeVariant::Latte => Self::latte(),
        }
    }

    fn mocha() -> Self {
        Self {
            accent_primary: Color::Rgb(0xb4, 0xbe, 0xfe),   // lavender
            accent_secondary: Color::Rgb(0x89, 0xb4, 0xfa), // blue
            accent_tertiary: Color::Rgb(0xcb, 0xa6, 0xf7),  // mauve
            accent_error: Color::Rgb(0xf3, 0x8b, 0xa8),     // red
            accent_warning: Color::Rgb(0xf9, 0xe2, 0xaf),   // yellow
            accent_success: Color::Rgb(0xa6, 0xe3, 0xa1),   // green
            accent_info: Color::Rgb(0x94, 0xe2, 0xd5),      // teal
            accent_muted: Color::Rgb(0xfa, 0xb3, 0x87),     // peach

            text_primary: Color::Rgb(0xcd, 0xd6, 0xf4),
            text_secondary: Color::Rgb(0xba, 0xc2, 0xde),
            text_tertiary: Color::Rgb(0xa6, 0xad, 0xc8),

            border_primary: Color::Rgb(0x7f, 0x84, 0x9c),
            border_secondary: Color::Rgb(0x6c, 0x70, 0x86),
            bg_base: Color::Rgb(0x1e, 0x1e, 0x2e),
            bg_surface: Color::Rgb(0x31, 0x32, 0x44),
            bg_elevated: Color::Rgb(0x45, 0x47, 0x5a),
        }
    }

    fn latte() -> Self {
        Self {
            accent_primary: Color::Rgb(0x72, 0x87, 0xfd),
            accent_secondary: Color::Rgb(0x1e, 0x66, 0xf5),
            accent_tertiary: Color::Rgb(0x88, 0x39, 0xef),
            accent_error: Color::Rgb(0xd2, 0x0f, 0x39),
            accent_warning: Color::Rgb(0xdf, 0x8e, 0x1d),
            accent_success: Color::Rgb(0x40, 0xa0, 0x2b),
            accent_info: Color::Rgb(0x17, 0x92, 0x99),
            accent_muted: Color::Rgb(0xfe, 0x64, 0x0b),

            text_primary: Color::Rgb(0x4c, 0x4f, 0x69),
            text_secondary: Color::Rgb(0x5c, 0x5f, 0x77),
            text_tertiary: Color::Rgb(0x6c, 0x6f, 0x85),

            border_primary: Color::Rgb(0x8c, 0x8f, 0xa1),
            border_secondary: Color::Rgb(0x9c, 0xa0, 0xb0),
            bg_base: Color::Rgb(0xef, 0xf1, 0xf5),
            bg_surface: Color::Rgb(0xcc, 0xd0, 0xda),
            bg_elevated: Color::Rgb(0xbc, 0xc0, 0xcc),
        }
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.accent_error)
    }

    pub fn success_style(&self) -> Style {
        Style::default().fg(self.accent_success)
    }

    pub fn hint_style(&self) -> Style {
        Style::default().fg(self.accent_muted)
    }

    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.accent_secondary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.accent_tertiary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected_style(&self) -> Style {
        Style::default()
            .bg(self.bg_surface)
            .fg(self.accent_primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.accent_primary)
        } else {
            Style::default().fg(self.border_secondary)
        }
    }

    /// Colour for a backend status string (fleet, game session, task...)
    pub fn status_style(&self, status: &str) -> Style {
        let color = match status.to_ascii_uppercase().as_str() {
            "ACTIVE" | "RUNNING" | "FULFILLED" | "COMPLETED" => self.accent_success,
            "ERROR" | "FAILED" | "TERMINATED" | "TIMED_OUT" | "CANCELLED" | "STOPPED" => {
                self.accent_error
            }
            "ACTIVATING" | "PENDING" | "PROVISIONING" | "RESERVED" | "NEW" | "DOWNLOADING"
            | "BUILDING" | "VALIDATING" => self.accent_warning,
            _ => self.text_secondary,
        };
        Style::default().fg(color)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(ThemeVariant::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_colors() {
        let theme = Theme::default();
        assert_eq!(theme.status_style("active").fg, Some(theme.accent_success));
        assert_eq!(theme.status_style("ERROR").fg, Some(theme.accent_error));
        assert_eq!(theme.status_style("Activating").fg, Some(theme.accent_warning));
        assert_eq!(theme.status_style("whatever").fg, Some(theme.text_secondary));
    }
}
