//! Sidebar: connection status, target database and sample questions

use crate::config::{DATABASE, SAMPLE_QUESTIONS, SCHEMA};
use crate::connection::ConnectionStatus;
use crate::ui::conversation::history::wrap_text;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Selection state for the sample list
#[derive(Debug, Clone, Default)]
pub struct SidebarState {
    selected: usize,
    has_focus: bool,
}

impl SidebarState {
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Returns the chosen sample index on Enter
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<usize> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        let len = SAMPLE_QUESTIONS.len();
        match key.code {
            KeyCode::Up => self.selected = (self.selected + len - 1) % len,
            KeyCode::Down => self.selected = (self.selected + 1) % len,
            KeyCode::Char(c) => {
                let index = c.to_digit(10)? as usize;
                if (1..=len).contains(&index) {
                    self.selected = index - 1;
                    return Some(self.selected);
                }
            }
            KeyCode::Enter => return Some(self.selected),
            _ => {}
        }
        None
    }
}

/// Text shown for a connection status
pub fn status_text(status: Option<&ConnectionStatus>) -> String {
    match status {
        None => "⏳ Checking connection...".to_string(),
        Some(ConnectionStatus::Connected { .. }) => "✅ Connected to Snowflake".to_string(),
        Some(ConnectionStatus::Failed(message)) => format!("❌ Connection error: {}", message),
    }
}

pub struct Sidebar<'a> {
    pub state: &'a SidebarState,
    pub status: Option<&'a ConnectionStatus>,
}

impl Widget for Sidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.state.has_focus {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title("🏥 Hospital Data")
            .border_style(border_style);
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width as usize;
        let status_style = match self.status {
            Some(status) if status.is_connected() => Style::default().fg(Color::Green),
            Some(_) => Style::default().fg(Color::Red),
            None => Style::default().fg(Color::Yellow),
        };

        let mut lines: Vec<Line> = Vec::new();
        for part in wrap_text(&status_text(self.status), width) {
            lines.push(Line::from(Span::styled(part, status_style)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Database: ", Style::default().fg(Color::DarkGray)),
            Span::raw(DATABASE),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Schema: ", Style::default().fg(Color::DarkGray)),
            Span::raw(SCHEMA),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Sample questions",
            Style::default().add_modifier(Modifier::BOLD),
        )));

        for (index, question) in SAMPLE_QUESTIONS.iter().enumerate() {
            let selected = self.state.has_focus && index == self.state.selected();
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            let text = format!("{}. {}", index + 1, question);
            for (i, part) in wrap_text(&text, width.saturating_sub(1)).into_iter().enumerate() {
                let indent = if i == 0 { "" } else { "   " };
                lines.push(Line::from(Span::styled(format!("{}{}", indent, part), style)));
            }
        }

        lines.push(Line::from(""));
        let hints = if self.state.has_focus {
            "↑/↓ select · Enter use · Tab back"
        } else {
            "Tab: sample questions"
        };
        lines.push(Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray))));

        for (i, line) in lines.iter().take(inner.height as usize).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}
