use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use super::ListState;
use crate::tui::Theme;

/// Bordered table with a header row and a selection cursor.
///
/// Built fresh every frame from the owning view's rows.
pub struct DataTable<'a> {
    title: String,
    headers: Vec<&'a str>,
    widths: Vec<Constraint>,
    rows: Vec<Vec<String>>,
    status_column: Option<usize>,
    focused: bool,
    empty_text: &'a str,
}

impl<'a> DataTable<'a> {
    pub fn new(title: impl Into<String>, headers: Vec<&'a str>) -> Self {
        let widths = vec![Constraint::Fill(1); headers.len()];
        Self {
            title: title.into(),
            headers,
            widths,
            rows: Vec::new(),
            status_column: None,
            focused: false,
            empty_text: "Nothing to show",
        }
    }

    pub fn widths(mut self, widths: Vec<Constraint>) -> Self {
        self.widths = widths;
        self
    }

    pub fn rows(mut self, rows: Vec<Vec<String>>) -> Self {
        self.rows = rows;
        self
    }

    /// Colour cells of this column by status
    pub fn status_column(mut self, column: usize) -> Self {
        self.status_column = Some(column);
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn empty_text(mut self, text: &'a str) -> Self {
        self.empty_text = text;
        self
    }

    pub fn render(self, frame: &mut Frame, area: Rect, list: &mut ListState, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style(self.focused))
            .title(Line::styled(format!(" {} ", self.title), theme.header_style()));

        if self.rows.is_empty() {
            let text = Paragraph::new(Line::styled(self.empty_text, Style::default().fg(theme.text_tertiary)))
                .block(block);
            frame.render_widget(text, area);
            return;
        }

        // borders + header row
        let viewport = area.height.saturating_sub(3) as usize;
        list.clamp(self.rows.len());
        list.update_scroll(viewport.max(1), self.rows.len());

        let header = Row::new(self.headers.iter().map(|h| Cell::from(*h))).style(theme.header_style());
        let status_column = self.status_column;
        let rows = self.rows.into_iter().map(|cells| {
            Row::new(cells.into_iter().enumerate().map(|(i, text)| {
                if Some(i) == status_column {
                    let style = theme.status_style(&text);
                    Cell::from(text).style(style)
                } else {
                    Cell::from(text)
                }
            }))
            .style(Style::default().fg(theme.text_primary))
        });

        let highlight = if self.focused {
            theme.selected_style()
        } else {
            Style::default().bg(theme.bg_surface)
        };
        let table = Table::new(rows, self.widths)
            .header(header)
            .block(block)
            .row_highlight_style(highlight)
            .highlight_symbol("▶ ");

        let mut state = list.table_state();
        frame.render_stateful_widget(table, area, &mut state);
    }
}
