//! Terminal application: owns the session and drives the event loop

use crate::agent::AgentClient;
use crate::config::{Config, SAMPLE_QUESTIONS};
use crate::connection::{ConnectionProvider, ConnectionStatus, SnowflakeConnector};
use crate::events::AppEvent;
use crate::session::{ChatSession, RequestState};
use crate::ui::conversation::{get_help_text, ConversationAction, ConversationManager};
use crate::ui::sidebar::{Sidebar, SidebarState};
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

const SIDEBAR_WIDTH: u16 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Composer,
    Samples,
}

pub struct App {
    session: ChatSession,
    provider: Arc<ConnectionProvider>,
    agent: AgentClient,
    conversation: ConversationManager,
    sidebar: SidebarState,
    focus: Focus,
    status: Option<ConnectionStatus>,
    notice: Option<String>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config, provider: ConnectionProvider) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session: ChatSession::new(),
            provider: Arc::new(provider),
            agent: AgentClient::from_config(config),
            conversation: ConversationManager::new(config.ui.show_timestamps),
            sidebar: SidebarState::default(),
            focus: Focus::Composer,
            status: None,
            notice: None,
            events_tx,
            events_rx,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn status(&self) -> Option<&ConnectionStatus> {
        self.status.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    #[cfg(test)]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.sidebar.set_focus(focus == Focus::Samples);
        self.conversation.set_focus(focus == Focus::Composer);
    }

    /// Route a key press to the focused component
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return self.dispatch(AppEvent::ExitRequest),
            KeyCode::Char('l') if ctrl => return self.dispatch(AppEvent::ClearHistory),
            KeyCode::Esc if !self.conversation.is_palette_open() => {
                return self.dispatch(AppEvent::ExitRequest);
            }
            KeyCode::Tab if !self.conversation.is_palette_open() => {
                let next = match self.focus {
                    Focus::Composer => Focus::Samples,
                    Focus::Samples => Focus::Composer,
                };
                return self.set_focus(next);
            }
            _ => {}
        }

        match self.focus {
            Focus::Samples => {
                if let Some(index) = self.sidebar.handle_key(key) {
                    self.dispatch(AppEvent::UseSample { index });
                }
            }
            Focus::Composer => match self.conversation.handle_key(key) {
                ConversationAction::Submit(question) => {
                    self.dispatch(AppEvent::Submit { question })
                }
                ConversationAction::Event(event) => self.dispatch(event),
                ConversationAction::None => {}
            },
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        if self.focus == Focus::Composer {
            self.conversation.insert_str(text);
        }
    }

    /// Apply one event. Remote work is spawned and reports back on the channel.
    pub fn dispatch(&mut self, event: AppEvent) {
        match event {
            AppEvent::Submit { question } => self.submit(question),
            AppEvent::UseSample { index } => {
                if self.session.is_awaiting() {
                    self.notice = Some("Wait for the current reply first".to_string());
                } else if let Some(question) = SAMPLE_QUESTIONS.get(index) {
                    self.conversation.use_sample(question);
                    self.set_focus(Focus::Composer);
                }
            }
            AppEvent::ClearHistory => match self.session.clear() {
                Ok(()) => {
                    self.conversation.reset_scroll();
                    self.notice = Some("Conversation cleared".to_string());
                    self.dispatch(AppEvent::RefreshStatus);
                }
                Err(e) => self.notice = Some(format!("Cannot clear: {}", e)),
            },
            AppEvent::RefreshStatus => {
                let provider = Arc::clone(&self.provider);
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let status = provider.status().await;
                    let _ = tx.send(AppEvent::StatusChecked { status });
                });
            }
            AppEvent::StatusChecked { status } => {
                tracing::debug!(connected = status.is_connected(), "status checked");
                self.status = Some(status);
            }
            AppEvent::ReplyReceived { request_id, reply } => {
                if self.session.pending_request() != Some(request_id) {
                    tracing::debug!(request_id = %request_id, "dropping stale reply");
                    return;
                }
                if let Err(e) = self.session.finish(&reply) {
                    tracing::warn!(error = %e, "reply could not be recorded");
                }
                self.conversation.set_awaiting(false);
                self.dispatch(AppEvent::RefreshStatus);
            }
            AppEvent::ShowHelp => self.notice = Some(get_help_text()),
            AppEvent::ExitRequest => self.should_quit = true,
            AppEvent::ShowInfo { message } => self.notice = Some(message),
        }
    }

    fn submit(&mut self, question: String) {
        let request_id = match self.session.begin(&question) {
            Ok(request_id) => request_id,
            Err(e) => {
                self.notice = Some(e.to_string());
                return;
            }
        };

        self.notice = None;
        self.conversation.set_awaiting(true);

        let provider = Arc::clone(&self.provider);
        let agent = self.agent.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let reply = agent.ask_with_provider(&provider, &question).await;
            if tx.send(AppEvent::ReplyReceived { request_id, reply }).is_err() {
                tracing::debug!(request_id = %request_id, "app closed before reply");
            }
        });
    }

    /// Apply everything that finished since the last frame
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event);
        }
    }

    /// Wait for the next background event and apply it
    #[cfg(test)]
    pub async fn next_event(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.dispatch(event);
        }
    }

    pub fn draw(&self, frame: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(8),
                Constraint::Length(1),
            ])
            .split(frame.size());

        let header = Line::from(vec![
            Span::styled(
                "🏥 Medical Agent Chatbot",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  Ask questions about patient data",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(Paragraph::new(header), rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(rows[1]);

        frame.render_widget(
            Sidebar {
                state: &self.sidebar,
                status: self.status(),
            },
            columns[0],
        );

        let pending = match self.session.state() {
            RequestState::Awaiting { started, .. } => Some(started.elapsed()),
            RequestState::Idle => None,
        };
        self.conversation
            .render(columns[1], frame.buffer_mut(), self.session.turns(), pending);

        let footer = match self.notice() {
            Some(notice) => Line::from(Span::styled(notice, Style::default().fg(Color::Yellow))),
            None => Line::from(Span::styled(get_help_text(), Style::default().fg(Color::DarkGray))),
        };
        frame.render_widget(Paragraph::new(footer), rows[2]);
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>, config: &Config) -> Result<()> {
        self.dispatch(AppEvent::RefreshStatus);

        while !self.should_quit() {
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(config.tick_rate())? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Paste(text) => self.handle_paste(&text),
                    _ => {}
                }
            }

            self.drain_events();
        }

        Ok(())
    }
}

/// Run the terminal UI until the user quits
pub async fn run(config: Config) -> Result<()> {
    let provider = ConnectionProvider::new(SnowflakeConnector::new(config.clone()));
    let mut app = App::new(&config, provider);
    tracing::info!(session_id = %app.session().id(), "starting terminal UI");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableBracketedPaste) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }

    let result = match Terminal::new(CrosstermBackend::new(io::stdout())) {
        Ok(mut terminal) => {
            let result = app.event_loop(&mut terminal, &config).await;
            let _ = terminal.show_cursor();
            result
        }
        Err(e) => Err(e.into()),
    };

    // Restore before reporting any loop error.
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableBracketedPaste)?;

    tracing::info!(turns = app.session().turns().len(), "terminal UI closed");
    result
}
