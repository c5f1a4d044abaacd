use std::time::Instant;
use uuid::Uuid;

use crate::agent::{AgentClient, Reply};
use crate::connection::ConnectionProvider;
use crate::error::SessionError;
use crate::events::ChatTurn;

/// Append-only, in-memory list of chat turns
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn all(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Whether a question is waiting on the agent
#[derive(Debug, Clone)]
pub enum RequestState {
    Idle,
    Awaiting {
        request_id: Uuid,
        question: String,
        started: Instant,
    },
}

/// State owned by one interactive session
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    conversation: Conversation,
    state: RequestState,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session_id = %id, "session started");
        Self {
            id,
            conversation: Conversation::new(),
            state: RequestState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.conversation.all()
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, RequestState::Awaiting { .. })
    }

    /// Id of the in-flight request, if any
    pub fn pending_request(&self) -> Option<Uuid> {
        match &self.state {
            RequestState::Awaiting { request_id, .. } => Some(*request_id),
            RequestState::Idle => None,
        }
    }

    /// Record the user turn and enter `Awaiting`. Returns the request id.
    pub fn begin(&mut self, question: &str) -> Result<Uuid, SessionError> {
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if self.is_awaiting() {
            return Err(SessionError::Busy);
        }

        let request_id = Uuid::new_v4();
        self.conversation.append(ChatTurn::user(question));
        self.state = RequestState::Awaiting {
            request_id,
            question: question.to_string(),
            started: Instant::now(),
        };
        tracing::debug!(session_id = %self.id, request_id = %request_id, "awaiting reply");
        Ok(request_id)
    }

    /// Record the assistant turn for the in-flight request and return to `Idle`
    pub fn finish(&mut self, reply: &Reply) -> Result<(), SessionError> {
        let RequestState::Awaiting { request_id, started, .. } = &self.state else {
            return Err(SessionError::NotAwaiting);
        };

        tracing::debug!(
            session_id = %self.id,
            request_id = %request_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            answered = reply.is_answer(),
            "reply recorded"
        );
        self.conversation.append(ChatTurn::assistant(reply.text()));
        self.state = RequestState::Idle;
        Ok(())
    }

    /// Empty the history. Refused while a reply is pending.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.is_awaiting() {
            return Err(SessionError::Busy);
        }
        if !self.conversation.is_empty() {
            tracing::debug!(session_id = %self.id, turns = self.conversation.len(), "history cleared");
        }
        self.conversation.clear();
        Ok(())
    }

    /// Run one full exchange: user turn, agent call, assistant turn
    pub async fn exchange(
        &mut self,
        agent: &AgentClient,
        provider: &ConnectionProvider,
        question: &str,
    ) -> Result<Reply, SessionError> {
        self.begin(question)?;
        let question = match &self.state {
            RequestState::Awaiting { question, .. } => question.clone(),
            RequestState::Idle => return Err(SessionError::NotAwaiting),
        };
        let reply = agent.ask_with_provider(provider, &question).await;
        self.finish(&reply)?;
        Ok(reply)
    }
}
