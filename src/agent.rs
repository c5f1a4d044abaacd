use crate::config::{Config, RESPONSE_COLUMN};
use crate::connection::{Connection, ConnectionProvider};
use crate::error::AgentError;
use crate::snowflake::agent_statement;
use std::time::{Duration, Instant};

/// Marker prefixed to every failure rendered into the conversation
pub const ERROR_MARKER: &str = "❌";

/// Text shown when the agent answers with nothing
pub const NO_RESPONSE_MESSAGE: &str = "❌ No response received from the medical agent.";

/// Outcome of one question, always renderable as an assistant turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Failed(AgentError),
}

impl Reply {
    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer(_))
    }

    /// Text for the assistant turn
    pub fn text(&self) -> String {
        match self {
            Reply::Answer(answer) => answer.clone(),
            Reply::Failed(AgentError::EmptyResponse) => NO_RESPONSE_MESSAGE.to_string(),
            Reply::Failed(error) => {
                format!("{} Error calling medical agent: {}", ERROR_MARKER, error)
            }
        }
    }
}

impl From<Result<String, AgentError>> for Reply {
    fn from(result: Result<String, AgentError>) -> Self {
        match result {
            Ok(answer) => Reply::Answer(answer),
            Err(error) => Reply::Failed(error),
        }
    }
}

/// Client for the HOSPITAL.PUBLIC.MEDICALAGENT question-answering method
#[derive(Debug, Clone)]
pub struct AgentClient {
    timeout: Duration,
    bind_parameters: bool,
}

impl AgentClient {
    pub fn new(timeout: Duration, bind_parameters: bool) -> Self {
        Self {
            timeout,
            bind_parameters,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.request_timeout(), config.agent.bind_parameters)
    }

    /// Ask a question, returning the answer verbatim or a typed failure
    pub async fn try_ask(&self, connection: &Connection, question: &str) -> Result<String, AgentError> {
        if question.is_empty() {
            return Err(AgentError::Request("question cannot be empty".to_string()));
        }

        let statement = agent_statement(question, self.bind_parameters);
        let rows = tokio::time::timeout(self.timeout, connection.execute(&statement))
            .await
            .map_err(|_| AgentError::Timeout(self.timeout))??;

        rows.first_text(RESPONSE_COLUMN)
            .map(str::to_string)
            .ok_or(AgentError::EmptyResponse)
    }

    /// Ask a question; failures come back as a renderable reply, never an error
    pub async fn ask(&self, connection: &Connection, question: &str) -> Reply {
        let started = Instant::now();
        let reply = Reply::from(self.try_ask(connection, question).await);
        log_reply(&reply, question, started);
        reply
    }

    /// Fetch the session connection first, then ask
    pub async fn ask_with_provider(&self, provider: &ConnectionProvider, question: &str) -> Reply {
        match provider.get_connection().await {
            Ok(connection) => self.ask(&connection, question).await,
            Err(error) => {
                tracing::warn!(error = %error, "cannot ask without a connection");
                Reply::Failed(error.into())
            }
        }
    }
}

fn log_reply(reply: &Reply, question: &str, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match reply {
        Reply::Answer(answer) => tracing::info!(
            question_chars = question.chars().count(),
            answer_chars = answer.chars().count(),
            elapsed_ms,
            "medical agent answered"
        ),
        Reply::Failed(error) => tracing::warn!(
            question_chars = question.chars().count(),
            elapsed_ms,
            error = %error,
            "medical agent call failed"
        ),
    }
    tracing::debug!(question, "question text");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{MockConnector, MockWarehouse, response_rows};
    use crate::error::ConnectionError;
    use std::sync::Arc;

    async fn connected(warehouse: MockWarehouse) -> (Arc<MockWarehouse>, Connection) {
        let connector = MockConnector::new(warehouse);
        let warehouse = connector.warehouse.clone();
        let provider = ConnectionProvider::new(connector);
        let connection = provider.get_connection().await.unwrap();
        (warehouse, connection)
    }

    fn client() -> AgentClient {
        AgentClient::new(Duration::from_secs(5), true)
    }

    #[tokio::test]
    async fn test_answer_is_returned_verbatim() {
        let (_, connection) = connected(MockWarehouse::answering("  42 patients\n")).await;
        let reply = client().ask(&connection, "How many patients live in Dallas?").await;
        assert_eq!(reply, Reply::Answer("  42 patients\n".to_string()));
        assert_eq!(reply.text(), "  42 patients\n");
    }

    #[tokio::test]
    async fn test_quoted_question_reaches_service_intact() {
        let (warehouse, connection) = connected(MockWarehouse::answering("none")).await;
        client().ask(&connection, "O'Brien's chart").await;

        let statements = warehouse.statements.lock().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].bindings, vec!["O'Brien's chart".to_string()]);
    }

    #[tokio::test]
    async fn test_inline_mode_escapes_question() {
        let (warehouse, connection) = connected(MockWarehouse::answering("none")).await;
        AgentClient::new(Duration::from_secs(5), false)
            .ask(&connection, "O'Brien's chart")
            .await;

        let statements = warehouse.statements.lock().unwrap();
        assert!(statements[0].sql.contains("ASK('O''Brien''s chart')"));
        assert!(statements[0].bindings.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_answer_is_an_answer() {
        let (_, connection) = connected(MockWarehouse::answering("  ")).await;
        let reply = client().ask(&connection, "anything").await;
        assert_eq!(reply, Reply::Answer("  ".to_string()));
    }

    #[tokio::test]
    async fn test_zero_rows_is_no_response() {
        let (_, connection) = connected(MockWarehouse::new(vec![Ok(response_rows(&[]))])).await;
        let reply = client().ask(&connection, "anything").await;
        assert_eq!(reply, Reply::Failed(AgentError::EmptyResponse));
        assert_eq!(reply.text(), NO_RESPONSE_MESSAGE);
    }

    #[tokio::test]
    async fn test_null_and_empty_answers_are_no_response() {
        let warehouse = MockWarehouse::new(vec![
            Ok(response_rows(&[None])),
            Ok(response_rows(&[Some("")])),
        ]);
        let (_, connection) = connected(warehouse).await;
        assert_eq!(client().ask(&connection, "a").await.text(), NO_RESPONSE_MESSAGE);
        assert_eq!(client().ask(&connection, "b").await.text(), NO_RESPONSE_MESSAGE);
    }

    #[tokio::test]
    async fn test_transport_fault_becomes_marked_text() {
        let warehouse = MockWarehouse::new(vec![Err(AgentError::Request(
            "transport error: connection reset by peer".to_string(),
        ))]);
        let (_, connection) = connected(warehouse).await;
        let reply = client().ask(&connection, "anything").await;

        assert!(!reply.is_answer());
        let text = reply.text();
        assert!(text.starts_with(ERROR_MARKER));
        assert!(text.contains("connection reset by peer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_marked_text() {
        let warehouse = MockWarehouse::answering("late").with_delay(Duration::from_secs(120));
        let (_, connection) = connected(warehouse).await;
        let reply = AgentClient::new(Duration::from_secs(30), true)
            .ask(&connection, "slow question")
            .await;

        assert_eq!(reply, Reply::Failed(AgentError::Timeout(Duration::from_secs(30))));
        assert_eq!(
            reply.text(),
            "❌ Error calling medical agent: request timed out after 30s"
        );
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_before_sending() {
        let (warehouse, connection) = connected(MockWarehouse::answering("x")).await;
        let reply = client().ask(&connection, "").await;
        assert!(reply.text().starts_with(ERROR_MARKER));
        assert!(warehouse.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_is_rendered() {
        let provider = ConnectionProvider::new(
            MockConnector::new(MockWarehouse::answering("x")).failing_first(1),
        );
        let reply = client().ask_with_provider(&provider, "anything").await;
        assert_eq!(
            reply,
            Reply::Failed(AgentError::Connection(ConnectionError::Unreachable(
                "connection refused".to_string()
            )))
        );
        assert!(reply.text().contains("connection refused"));
    }
}
