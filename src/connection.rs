//! Lazily established, memoized handle to the remote warehouse.

use crate::config::Config;
use crate::error::{AgentError, ConnectionError};
use crate::snowflake::{Credentials, ResultSet, SqlApiClient, SqlApiError, Statement};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Something that can run a statement and hand back rows
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, AgentError>;
}

/// Establishes a warehouse handle from ambient credentials
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Warehouse>, ConnectionError>;
}

#[async_trait]
impl Warehouse for SqlApiClient {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, AgentError> {
        SqlApiClient::execute(self, statement)
            .await
            .map_err(|e| AgentError::Request(e.to_string()))
    }
}

/// Connector backed by the Snowflake SQL API
pub struct SnowflakeConnector {
    config: Config,
}

impl SnowflakeConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    async fn connect(&self) -> Result<Arc<dyn Warehouse>, ConnectionError> {
        let credentials = Credentials::from_env(&self.config.snowflake)?;
        tracing::info!(
            base_url = %credentials.base_url,
            token_type = %credentials.token_type,
            warehouse = ?credentials.warehouse,
            "establishing Snowflake connection"
        );

        let client = SqlApiClient::new(
            credentials,
            self.config.request_timeout(),
            self.config.poll_interval(),
        )?;

        client
            .execute(&Statement::new("SELECT 1"))
            .await
            .map_err(probe_error)?;

        let warehouse: Arc<dyn Warehouse> = Arc::new(client);
        Ok(warehouse)
    }
}

fn probe_error(err: SqlApiError) -> ConnectionError {
    match err {
        SqlApiError::Api { status, message } => ConnectionError::Rejected { status, message },
        SqlApiError::Transport(message) | SqlApiError::Decode(message) => {
            ConnectionError::Unreachable(message)
        }
    }
}

/// Shared handle to the remote service; clones refer to the same resource
#[derive(Clone)]
pub struct Connection {
    id: Uuid,
    warehouse: Arc<dyn Warehouse>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn execute(&self, statement: &Statement) -> Result<ResultSet, AgentError> {
        self.warehouse.execute(statement).await
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Connection state as shown in the sidebar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected { id: Uuid },
    Failed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected { .. })
    }
}

/// Get-or-create provider for the session's single connection
pub struct ConnectionProvider {
    connector: Box<dyn Connector>,
    connection: OnceCell<Connection>,
}

impl ConnectionProvider {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            connection: OnceCell::new(),
        }
    }

    /// Return the cached connection, establishing it on first use.
    ///
    /// A failed attempt is not cached; the next call tries again.
    pub async fn get_connection(&self) -> Result<Connection, ConnectionError> {
        self.connection
            .get_or_try_init(|| async {
                let warehouse = self.connector.connect().await.map_err(|e| {
                    tracing::warn!(error = %e, "connection attempt failed");
                    e
                })?;
                let connection = Connection {
                    id: Uuid::new_v4(),
                    warehouse,
                };
                tracing::info!(connection_id = %connection.id, "connection established");
                Ok::<_, ConnectionError>(connection)
            })
            .await
            .cloned()
    }

    pub async fn status(&self) -> ConnectionStatus {
        match self.get_connection().await {
            Ok(connection) => ConnectionStatus::Connected { id: connection.id() },
            Err(e) => ConnectionStatus::Failed(e.to_string()),
        }
    }

    #[cfg(test)]
    pub fn is_established(&self) -> bool {
        self.connection.initialized()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MockConnector, MockWarehouse};
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_connection_is_memoized() {
        let connector = MockConnector::new(MockWarehouse::answering("ok"));
        let attempts = connector.attempts.clone();
        let provider = ConnectionProvider::new(connector);

        assert!(!provider.is_established());
        let first = provider.get_connection().await.unwrap();
        let second = provider.get_connection().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(provider.is_established());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_establishment() {
        let connector = MockConnector::new(MockWarehouse::answering("ok"));
        let attempts = connector.attempts.clone();
        let provider = Arc::new(ConnectionProvider::new(connector));

        let (a, b) = tokio::join!(provider.get_connection(), provider.get_connection());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let connector = MockConnector::new(MockWarehouse::answering("ok")).failing_first(1);
        let attempts = connector.attempts.clone();
        let provider = ConnectionProvider::new(connector);

        let status = provider.status().await;
        assert_eq!(
            status,
            ConnectionStatus::Failed("Snowflake unreachable: connection refused".to_string())
        );
        assert!(!provider.is_established());

        let status = provider.status().await;
        assert!(status.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_providers_are_isolated() {
        let one = ConnectionProvider::new(MockConnector::new(MockWarehouse::answering("a")));
        let two = ConnectionProvider::new(MockConnector::new(MockWarehouse::answering("b")));
        assert_ne!(
            one.get_connection().await.unwrap(),
            two.get_connection().await.unwrap()
        );
    }

    #[test]
    fn test_probe_error_mapping() {
        let err = probe_error(SqlApiError::Api {
            status: 401,
            message: "expired".to_string(),
        });
        assert_eq!(
            err,
            ConnectionError::Rejected {
                status: 401,
                message: "expired".to_string()
            }
        );
        assert!(matches!(
            probe_error(SqlApiError::Transport("refused".to_string())),
            ConnectionError::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_surface_as_connection_error() {
        // Only meaningful when the test environment carries no token of its own.
        if std::env::var("SNOWFLAKE_TOKEN").is_ok() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(dir.path()).unwrap();
        config.snowflake.host = Some("acme.snowflakecomputing.com".to_string());
        config.snowflake.token_file = Some(dir.path().join("no-token"));
        let provider = ConnectionProvider::new(SnowflakeConnector::new(config));
        assert!(matches!(
            provider.get_connection().await,
            Err(ConnectionError::MissingToken(_))
        ));
    }
}
