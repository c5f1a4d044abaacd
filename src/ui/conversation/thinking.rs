use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::Duration;

/// Busy line shown while a reply is pending
#[derive(Debug, Clone, Copy)]
pub struct ThinkingIndicator {
    elapsed: Duration,
}

impl ThinkingIndicator {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed }
    }

    fn dots(&self) -> &'static str {
        match (self.elapsed.as_millis() / 300) % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }
}

impl Widget for ThinkingIndicator {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }

        let line = Line::from(vec![
            Span::styled("🤖 Medical Agent is thinking", Style::default().fg(Color::Green)),
            Span::styled(self.dots(), Style::default().fg(Color::Yellow)),
            Span::styled(
                format!(" ({}s)", self.elapsed.as_secs()),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
