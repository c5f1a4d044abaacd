use crate::ui::conversation::commands::{command_entries, parse_slash_command, CommandEntry, ParsedCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer. Cursor counts chars, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor_position: usize,
}

impl TextAreaState {
    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor_position)
            .map(|(index, _)| index)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Single-line question input with a slash-command palette
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    has_focus: bool,
    locked: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            has_focus: true,
            locked: false,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                let content = self.state.content.clone();
                if let Some(command) = parse_slash_command(&content) {
                    self.clear();
                    return ComposerResult::Command(command);
                }

                if self.show_command_palette && self.apply_selected_command() {
                    return ComposerResult::None;
                }

                // The text stays in place until the reply lands.
                if !self.locked && !content.is_empty() {
                    return ComposerResult::Submitted(content);
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.locked {
                    return ComposerResult::None;
                }
                self.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace if !self.locked => {
                if self.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete if !self.locked => {
                if self.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => {
                self.state.cursor_position = self.state.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.state.cursor_position < self.state.char_len() {
                    self.state.cursor_position += 1;
                }
            }
            KeyCode::Home => {
                self.state.cursor_position = 0;
            }
            KeyCode::End => {
                self.state.cursor_position = self.state.char_len();
            }
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text at the cursor; newlines collapse to spaces
    pub fn insert_str(&mut self, text: &str) {
        if self.locked {
            return;
        }
        for c in text.chars() {
            self.insert_char(if c == '\n' || c == '\r' { ' ' } else { c });
        }
        self.sync_command_palette();
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, c: char) {
        let index = self.state.byte_index();
        self.state.content.insert(index, c);
        self.state.cursor_position += 1;
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.state.cursor_position == 0 {
            return false;
        }
        self.state.cursor_position -= 1;
        let index = self.state.byte_index();
        self.state.content.remove(index);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor_position >= self.state.char_len() {
            return false;
        }
        let index = self.state.byte_index();
        self.state.content.remove(index);
        true
    }

    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        if content.starts_with('/') && !content.contains(char::is_whitespace) {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette();
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        if self.filtered_commands.is_empty() {
            // Nothing matches, so the text is an ordinary question.
            self.close_command_palette();
        } else {
            let index = self.selected_command.unwrap_or(0);
            self.selected_command = Some(index.min(self.filtered_commands.len() - 1));
        }
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index).copied())
        else {
            return false;
        };

        self.state.content = format!("/{} ", entry.keyword);
        self.state.cursor_position = self.state.char_len();
        self.close_command_palette();
        true
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Lock or unlock editing while a reply is pending
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        if locked {
            self.close_command_palette();
        }
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Replace content, e.g. with a sample question
    pub fn set_content(&mut self, content: &str) {
        if self.locked {
            return;
        }
        self.state.content = content.to_string();
        self.state.cursor_position = self.state.char_len();
        self.close_command_palette();
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
        self.close_command_palette();
    }

    fn title(&self) -> &'static str {
        if self.locked {
            "⏳ Waiting for the medical agent"
        } else {
            "💬 Ask a question about patient data"
        }
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.locked {
            Style::default().fg(Color::DarkGray)
        } else if self.has_focus {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Gray)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(border_style);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            if self.has_focus && !self.locked {
                content.insert(self.state.byte_index(), '▌');
            }

            // Keep the cursor end visible on long questions.
            let width = inner_area.width as usize;
            let skip = content.chars().count().saturating_sub(width);
            let visible: String = content.chars().skip(skip).collect();
            let line = Line::from(vec![Span::styled(visible, Style::default().fg(Color::White))]);
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
        }

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            let palette_height = (self.filtered_commands.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in self.filtered_commands.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.selected_command == Some(index) {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" - ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);
                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}
