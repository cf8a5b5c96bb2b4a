use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line text field with a character cursor
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    cursor_pos: usize, // Character index (0 = before first char)
    max_length: Option<usize>,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor_pos = self.value.chars().count();
    }

    /// Handle a key press. Returns true if the value changed.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        let char_count = self.value.chars().count();

        match key {
            KeyCode::Char(c) => {
                if self.max_length.is_some_and(|max| char_count >= max) {
                    return false;
                }
                let mut chars: Vec<char> = self.value.chars().collect();
                chars.insert(self.cursor_pos, c);
                self.cursor_pos += 1;
                self.value = chars.into_iter().collect();
                true
            }
            KeyCode::Backspace if self.cursor_pos > 0 => {
                let mut chars: Vec<char> = self.value.chars().collect();
                chars.remove(self.cursor_pos - 1);
                self.cursor_pos -= 1;
                self.value = chars.into_iter().collect();
                true
            }
            KeyCode::Delete if self.cursor_pos < char_count => {
                let mut chars: Vec<char> = self.value.chars().collect();
                chars.remove(self.cursor_pos);
                self.value = chars.into_iter().collect();
                true
            }
            KeyCode::Left => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.cursor_pos = (self.cursor_pos + 1).min(char_count);
                false
            }
            KeyCode::Home => {
                self.cursor_pos = 0;
                false
            }
            KeyCode::End => {
                self.cursor_pos = char_count;
                false
            }
            _ => false,
        }
    }

    /// Value with a bar cursor inserted, for display
    pub fn display(&self) -> String {
        let mut chars: Vec<char> = self.value.chars().collect();
        chars.insert(self.cursor_pos.min(chars.len()), '│');
        chars.into_iter().collect()
    }
}

/// Multi-line text buffer used by the rule set editor
#[derive(Debug, Clone)]
pub struct TextArea {
    lines: Vec<String>,
    row: usize,
    col: usize, // Character index within the row
}

impl Default for TextArea {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
        }
    }
}

impl TextArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self { lines, row: 0, col: 0 }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines[row].chars().count()
    }

    fn byte_index(&self, row: usize, col: usize) -> usize {
        self.lines[row]
            .char_indices()
            .nth(col)
            .map(|(i, _)| i)
            .unwrap_or(self.lines[row].len())
    }

    /// Handle an editing key. Returns true if the text changed.
    /// Keys with Control held are left to the caller.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }

        match key.code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.row, self.col);
                self.lines[self.row].insert(at, c);
                self.col += 1;
                true
            }
            KeyCode::Enter => {
                let at = self.byte_index(self.row, self.col);
                let rest = self.lines[self.row].split_off(at);
                self.lines.insert(self.row + 1, rest);
                self.row += 1;
                self.col = 0;
                true
            }
            KeyCode::Backspace => {
                if self.col > 0 {
                    let at = self.byte_index(self.row, self.col - 1);
                    self.lines[self.row].remove(at);
                    self.col -= 1;
                    true
                } else if self.row > 0 {
                    let line = self.lines.remove(self.row);
                    self.row -= 1;
                    self.col = self.line_len(self.row);
                    self.lines[self.row].push_str(&line);
                    true
                } else {
                    false
                }
            }
            KeyCode::Left => {
                if self.col > 0 {
                    self.col -= 1;
                } else if self.row > 0 {
                    self.row -= 1;
                    self.col = self.line_len(self.row);
                }
                false
            }
            KeyCode::Right => {
                if self.col < self.line_len(self.row) {
                    self.col += 1;
                } else if self.row + 1 < self.lines.len() {
                    self.row += 1;
                    self.col = 0;
                }
                false
            }
            KeyCode::Up if self.row > 0 => {
                self.row -= 1;
                self.col = self.col.min(self.line_len(self.row));
                false
            }
            KeyCode::Down if self.row + 1 < self.lines.len() => {
                self.row += 1;
                self.col = self.col.min(self.line_len(self.row));
                false
            }
            KeyCode::Home => {
                self.col = 0;
                false
            }
            KeyCode::End => {
                self.col = self.line_len(self.row);
                false
            }
            _ => false,
        }
    }
}
