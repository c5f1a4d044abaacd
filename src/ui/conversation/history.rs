//! Conversation history display component

use crate::agent::ERROR_MARKER;
use crate::events::{ChatTurn, TurnRole};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Scroll position, counted in lines up from the newest turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryScroll {
    offset: usize,
}

impl HistoryScroll {
    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    /// Follow the newest turn again
    pub fn scroll_to_bottom(&mut self) {
        self.offset = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Read-only view over the session's turns
pub struct HistoryView<'a> {
    turns: &'a [ChatTurn],
    scroll: HistoryScroll,
    show_timestamps: bool,
}

impl<'a> HistoryView<'a> {
    pub fn new(turns: &'a [ChatTurn], scroll: HistoryScroll, show_timestamps: bool) -> Self {
        Self {
            turns,
            scroll,
            show_timestamps,
        }
    }

    fn render_turn(&self, turn: &ChatTurn, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let label_style = match turn.role() {
            TurnRole::User => Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            TurnRole::Assistant => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        };
        let mut header = vec![Span::styled(format!("{}:", turn.role().display_name()), label_style)];
        if self.show_timestamps {
            header.push(Span::styled(
                format!(" {}", turn.timestamp().format("%H:%M:%S")),
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.push(Line::from(header));

        let content_style = content_style(turn);
        for content_line in wrap_text(turn.content(), width.saturating_sub(2) as usize) {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line, content_style),
            ]));
        }

        lines
    }
}

fn content_style(turn: &ChatTurn) -> Style {
    match turn.role() {
        TurnRole::User => Style::default().fg(Color::White),
        TurnRole::Assistant if turn.content().starts_with(ERROR_MARKER) => {
            Style::default().fg(Color::Red)
        }
        TurnRole::Assistant => Style::default().fg(Color::Gray),
    }
}

/// Wrap text to fit within the given width, keeping paragraph breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if word_width > width {
                // Hard-split words wider than the pane, e.g. long URLs.
                if current_width > 0 {
                    lines.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(width).peekable();
                while let Some(chunk) = chunks.next() {
                    let piece: String = chunk.iter().collect();
                    if chunks.peek().is_some() {
                        lines.push(piece);
                    } else {
                        current_width = chunk.len();
                        current_line = piece;
                    }
                }
                continue;
            }
            if current_width > 0 && current_width + word_width + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.scroll.offset() > 0 {
            "💬 Conversation (scrolled, PgDn to follow)"
        } else {
            "💬 Conversation"
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.turns.is_empty() {
            let welcome_lines = [
                Line::from(vec![Span::styled(
                    "Ask a question about patient data.",
                    Style::default().fg(Color::Green),
                )]),
                Line::from(""),
                Line::from(vec![Span::styled(
                    "Pick a sample question from the sidebar with Tab, or type your own below.",
                    Style::default().fg(Color::Gray),
                )]),
            ];

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        let mut all_lines: Vec<Line> = Vec::new();
        for turn in self.turns {
            all_lines.extend(self.render_turn(turn, inner_area.width));
            all_lines.push(Line::from(""));
        }
        all_lines.pop();

        // Window ends `offset` lines above the newest line.
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        let offset = self.scroll.offset().min(max_offset);
        let end = total - offset;
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn render_to_text(view: HistoryView<'_>, width: u16, height: u16) -> Vec<String> {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| frame.render_widget(view, frame.size()))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buffer.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(wrap_text("superlongword", 4), vec!["supe", "rlon", "gwor", "d"]);
        assert_eq!(wrap_text("see abcdefgh now", 4), vec!["see", "abcd", "efgh", "now"]);
    }

    #[test]
    fn test_renders_labels_in_order() {
        let turns = vec![
            ChatTurn::user("How many patients live in Dallas?"),
            ChatTurn::assistant("42 patients"),
        ];
        let rows = render_to_text(HistoryView::new(&turns, HistoryScroll::default(), false), 60, 10);
        let text = rows.join("\n");

        let you = text.find("You:").unwrap();
        let agent = text.find("Medical Agent:").unwrap();
        assert!(you < agent);
        assert!(text.contains("How many patients live in Dallas?"));
        assert!(text.contains("42 patients"));
    }

    #[test]
    fn test_long_word_is_fully_shown() {
        let url = format!("https://example.com/{}END", "a".repeat(60));
        let turns = vec![ChatTurn::assistant(url)];
        let rows = render_to_text(HistoryView::new(&turns, HistoryScroll::default(), false), 40, 8);
        let text = rows.join("\n");
        assert!(text.contains("https://example.com/"));
        assert!(text.contains("END"));
    }

    #[test]
    fn test_empty_history_shows_welcome() {
        let rows = render_to_text(HistoryView::new(&[], HistoryScroll::default(), true), 80, 6);
        assert!(rows.join("\n").contains("Ask a question about patient data."));
    }

    #[test]
    fn test_scroll_reveals_older_lines() {
        let turns: Vec<ChatTurn> = (0..10)
            .map(|i| ChatTurn::user(format!("question {}", i)))
            .collect();

        let bottom = render_to_text(HistoryView::new(&turns, HistoryScroll::default(), false), 40, 6);
        assert!(bottom.join("\n").contains("question 9"));
        assert!(!bottom.join("\n").contains("question 0"));

        let mut scroll = HistoryScroll::default();
        scroll.scroll_up(1000);
        let top = render_to_text(HistoryView::new(&turns, scroll, false), 40, 6);
        assert!(top.join("\n").contains("question 0"));
        assert!(!top.join("\n").contains("question 9"));

        scroll.scroll_to_bottom();
        assert_eq!(scroll.offset(), 0);
    }
}
