use crate::config::SAMPLE_QUESTIONS;
use crate::events::{AppEvent, ChatTurn};
use crate::ui::conversation::{
    ComposerResult, ConversationComposer, HistoryScroll, HistoryView, ParsedCommand, SlashCommand,
    ThinkingIndicator,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};
use std::time::Duration;

const PAGE_LINES: usize = 5;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone)]
pub enum ConversationAction {
    None,
    Submit(String),
    Event(AppEvent),
}

fn slash_command_event(command: ParsedCommand) -> AppEvent {
    match command.command {
        SlashCommand::Clear => AppEvent::ClearHistory,
        SlashCommand::Sample => match command.sample_index() {
            Some(index) => AppEvent::UseSample { index },
            None => AppEvent::ShowInfo {
                message: format!("Usage: /sample 1-{}", SAMPLE_QUESTIONS.len()),
            },
        },
        SlashCommand::Status => AppEvent::RefreshStatus,
        SlashCommand::Help => AppEvent::ShowHelp,
        SlashCommand::Quit => AppEvent::ExitRequest,
    }
}

/// Owns the composer and scroll position; turns come from the session
pub struct ConversationManager {
    composer: ConversationComposer,
    scroll: HistoryScroll,
    show_timestamps: bool,
}

impl ConversationManager {
    pub fn new(show_timestamps: bool) -> Self {
        Self {
            composer: ConversationComposer::new("e.g., How many patients live in Dallas?"),
            scroll: HistoryScroll::default(),
            show_timestamps,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind == KeyEventKind::Press {
            match key.code {
                KeyCode::PageUp => {
                    self.scroll.scroll_up(PAGE_LINES);
                    return ConversationAction::None;
                }
                KeyCode::PageDown => {
                    self.scroll.scroll_down(PAGE_LINES);
                    return ConversationAction::None;
                }
                _ => {}
            }
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(question) => {
                self.scroll.scroll_to_bottom();
                ConversationAction::Submit(question)
            }
            ComposerResult::Command(command) => {
                ConversationAction::Event(slash_command_event(command))
            }
            ComposerResult::None => ConversationAction::None,
        }
    }

    pub fn insert_str(&mut self, text: &str) {
        self.composer.insert_str(text);
    }

    /// Put a sample question into the composer
    pub fn use_sample(&mut self, question: &str) {
        self.composer.set_content(question);
    }

    /// Lock while a reply is pending; unlocking after a reply also clears the input
    pub fn set_awaiting(&mut self, awaiting: bool) {
        self.composer.set_locked(awaiting);
        if !awaiting {
            self.composer.clear();
            self.scroll.scroll_to_bottom();
        }
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.composer.set_focus(has_focus);
    }

    pub fn is_palette_open(&self) -> bool {
        self.composer.is_palette_open()
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        self.composer.content()
    }

    pub fn reset_scroll(&mut self) {
        self.scroll.scroll_to_bottom();
    }

    /// Render history, busy line and composer
    pub fn render(
        &self,
        area: Rect,
        buf: &mut Buffer,
        turns: &[ChatTurn],
        pending: Option<Duration>,
    ) {
        let busy_height = if pending.is_some() { 1 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(busy_height),
                Constraint::Length(3),
            ])
            .split(area);

        HistoryView::new(turns, self.scroll, self.show_timestamps).render(chunks[0], buf);
        if let Some(elapsed) = pending {
            ThinkingIndicator::new(elapsed).render(chunks[1], buf);
        }
        self.composer.render(chunks[2], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_line(manager: &mut ConversationManager, text: &str) -> ConversationAction {
        for c in text.chars() {
            manager.handle_key(press(KeyCode::Char(c)));
        }
        manager.handle_key(press(KeyCode::Enter))
    }

    #[test]
    fn test_submit_question() {
        let mut manager = ConversationManager::new(false);
        match type_line(&mut manager, "How many patients live in Dallas?") {
            ConversationAction::Submit(question) => {
                assert_eq!(question, "How many patients live in Dallas?")
            }
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn test_slash_commands_map_to_events() {
        let mut manager = ConversationManager::new(false);
        assert!(matches!(
            type_line(&mut manager, "/clear"),
            ConversationAction::Event(AppEvent::ClearHistory)
        ));
        assert!(matches!(
            type_line(&mut manager, "/sample 2"),
            ConversationAction::Event(AppEvent::UseSample { index: 1 })
        ));
        assert!(matches!(
            type_line(&mut manager, "/sample 9"),
            ConversationAction::Event(AppEvent::ShowInfo { .. })
        ));
        assert!(matches!(
            type_line(&mut manager, "/quit"),
            ConversationAction::Event(AppEvent::ExitRequest)
        ));
    }

    #[test]
    fn test_palette_prefix_completes_before_running() {
        let mut manager = ConversationManager::new(false);
        assert!(matches!(type_line(&mut manager, "/he"), ConversationAction::None));
        assert_eq!(manager.input(), "/help ");
        assert!(matches!(
            manager.handle_key(press(KeyCode::Enter)),
            ConversationAction::Event(AppEvent::ShowHelp)
        ));
    }

    #[test]
    fn test_reply_unlocks_and_clears_input() {
        let mut manager = ConversationManager::new(false);
        type_line(&mut manager, "question");
        manager.set_awaiting(true);
        assert!(matches!(type_line(&mut manager, "more"), ConversationAction::None));
        assert_eq!(manager.input(), "question");

        manager.set_awaiting(false);
        assert_eq!(manager.input(), "");
    }
}
