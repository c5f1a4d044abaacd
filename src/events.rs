use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::agent::Reply;
use crate::connection::ConnectionStatus;

/// Internal application events for coordinating between components
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Send the question to the medical agent
    Submit { question: String },

    /// Copy a sample question into the input field
    UseSample { index: usize },

    /// Empty the conversation
    ClearHistory,

    /// Re-check the connection status
    RefreshStatus,

    /// A status check finished
    StatusChecked { status: ConnectionStatus },

    /// The in-flight request finished
    ReplyReceived { request_id: Uuid, reply: Reply },

    /// Show help in the status line
    ShowHelp,

    /// Request to exit the application
    ExitRequest,

    /// Show info message
    ShowInfo { message: String },
}

/// Originator of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            TurnRole::User => "You",
            TurnRole::Assistant => "🏥 Medical Agent",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    role: TurnRole,
    content: String,
    timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Turns are equal when role and content match; timestamps are display-only
impl PartialEq for ChatTurn {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role && self.content == other.content
    }
}

impl Eq for ChatTurn {}
