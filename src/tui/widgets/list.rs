use crossterm::event::KeyCode;

/// Selection and scroll state for a table of rows
#[derive(Debug, Clone)]
pub struct ListState {
    selected: Option<usize>,
    scroll_offset: usize,
    scroll_off: usize, // Rows from edge before scrolling (like vim scrolloff)
    wrap_around: bool,
}

impl Default for ListState {
    fn default() -> Self {
        Self::new()
    }
}

impl ListState {
    pub fn new() -> Self {
        Self {
            selected: None,
            scroll_offset: 0,
            scroll_off: 2,
            wrap_around: true,
        }
    }

    pub fn with_wrap_around(mut self, wrap_around: bool) -> Self {
        self.wrap_around = wrap_around;
        self
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index;
    }

    /// The selected element of `items`, if any
    pub fn selected_item<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.selected.and_then(|i| items.get(i))
    }

    /// Keep the selection valid after the row set changed.
    /// An empty set clears the selection; a non-empty one always has one.
    pub fn clamp(&mut self, item_count: usize) {
        self.selected = match (self.selected, item_count) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(sel), n) => Some(sel.min(n - 1)),
        };
        if item_count == 0 {
            self.scroll_offset = 0;
        }
    }

    /// Handle navigation key, returns true if handled
    pub fn handle_key(&mut self, key: KeyCode, item_count: usize, visible_height: usize) -> bool {
        if item_count == 0 {
            return false;
        }

        match key {
            KeyCode::Up | KeyCode::Char('k') => self.move_up(item_count),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(item_count),
            KeyCode::PageUp => {
                let sel = self.selected.unwrap_or(0);
                self.selected = Some(sel.saturating_sub(visible_height.max(1)));
            }
            KeyCode::PageDown => {
                let sel = self.selected.unwrap_or(0);
                self.selected = Some((sel + visible_height.max(1)).min(item_count - 1));
            }
            KeyCode::Home => self.selected = Some(0),
            KeyCode::End => self.selected = Some(item_count - 1),
            _ => return false,
        }

        self.update_scroll(visible_height, item_count);
        true
    }

    fn move_up(&mut self, item_count: usize) {
        self.selected = match self.selected {
            Some(0) if self.wrap_around => Some(item_count - 1),
            Some(0) => Some(0),
            Some(sel) => Some(sel - 1),
            None => Some(0),
        };
    }

    fn move_down(&mut self, item_count: usize) {
        self.selected = match self.selected {
            Some(sel) if sel + 1 < item_count => Some(sel + 1),
            Some(_) if self.wrap_around => Some(0),
            Some(sel) => Some(sel),
            None => Some(0),
        };
    }

    /// Update scroll offset so the selection stays visible with scrolloff.
    /// Called during rendering with the real viewport height.
    pub fn update_scroll(&mut self, visible_height: usize, item_count: usize) {
        let Some(sel) = self.selected else {
            return;
        };
        let scroll_off = self.scroll_off.min(visible_height.saturating_sub(1) / 2);

        let min_scroll = sel.saturating_sub(visible_height.saturating_sub(scroll_off + 1));
        let max_scroll = sel.saturating_sub(scroll_off);

        if self.scroll_offset < min_scroll {
            self.scroll_offset = min_scroll;
        } else if self.scroll_offset > max_scroll {
            self.scroll_offset = max_scroll;
        }

        let max_offset = item_count.saturating_sub(visible_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    /// Ratatui table state mirroring this selection
    pub fn table_state(&self) -> ratatui::widgets::TableState {
        ratatui::widgets::TableState::default()
            .with_offset(self.scroll_offset)
            .with_selected(self.selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_at_edges() {
        let mut list = ListState::new();
        list.clamp(3);
        assert_eq!(list.selected(), Some(0));
        list.handle_key(KeyCode::Up, 3, 10);
        assert_eq!(list.selected(), Some(2));
        list.handle_key(KeyCode::Down, 3, 10);
        assert_eq!(list.selected(), Some(0));
    }

    #[test]
    fn test_no_wrap() {
        let mut list = ListState::new().with_wrap_around(false);
        list.clamp(2);
        list.handle_key(KeyCode::Up, 2, 10);
        assert_eq!(list.selected(), Some(0));
    }

    #[test]
    fn test_clamp_after_rows_removed() {
        let mut list = ListState::new();
        list.select(Some(5));
        list.clamp(2);
        assert_eq!(list.selected(), Some(1));
        list.clamp(0);
        assert_eq!(list.selected(), None);
        assert!(!list.handle_key(KeyCode::Down, 0, 10));
    }

    #[test]
    fn test_scroll_follows_selection() {
        let mut list = ListState::new();
        list.clamp(20);
        list.handle_key(KeyCode::End, 20, 5);
        assert_eq!(list.selected(), Some(19));
        assert_eq!(list.scroll_offset(), 15);
        list.handle_key(KeyCode::Home, 20, 5);
        assert_eq!(list.scroll_offset(), 0);
    }
}
