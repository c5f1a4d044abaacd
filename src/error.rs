//! Error types for the connection, agent, and session layers.

use std::time::Duration;

/// Failures establishing the handle to Snowflake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("no Snowflake account configured (set SNOWFLAKE_ACCOUNT or SNOWFLAKE_HOST)")]
    MissingAccount,
    #[error("no Snowflake token available (set SNOWFLAKE_TOKEN or mount {0})")]
    MissingToken(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("Snowflake unreachable: {0}")]
    Unreachable(String),
    #[error("Snowflake rejected the session ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Failures asking the medical agent a question.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("{0}")]
    Request(String),
    #[error("no response received from the medical agent")]
    EmptyResponse,
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Violations of the one-request-in-flight conversation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("a question is already awaiting a reply")]
    Busy,
    #[error("no question is awaiting a reply")]
    NotAwaiting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::Rejected {
            status: 401,
            message: "bad token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Snowflake rejected the session (401): bad token"
        );

        let err = ConnectionError::MissingToken("/snowflake/session/token".to_string());
        assert!(err.to_string().contains("/snowflake/session/token"));
    }

    #[test]
    fn test_agent_error_display() {
        assert_eq!(
            AgentError::Timeout(Duration::from_secs(60)).to_string(),
            "request timed out after 60s"
        );
        assert_eq!(
            AgentError::Request("SQL compilation error".to_string()).to_string(),
            "SQL compilation error"
        );
        assert_eq!(
            AgentError::EmptyResponse.to_string(),
            "no response received from the medical agent"
        );
    }

    #[test]
    fn test_agent_error_from_connection_error() {
        let err: AgentError = ConnectionError::MissingAccount.into();
        assert!(matches!(err, AgentError::Connection(_)));
        assert!(err.to_string().starts_with("connection error: "));
    }

    #[test]
    fn test_session_error_display() {
        assert_eq!(SessionError::Busy.to_string(), "a question is already awaiting a reply");
        assert_eq!(SessionError::EmptyQuestion.to_string(), "question cannot be empty");
    }
}
