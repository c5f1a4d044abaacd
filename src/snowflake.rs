//! Snowflake SQL API v2 client: statement building, execution and result decoding.

use crate::config::{
    AGENT_METHOD, AGENT_OBJECT, DATABASE, DEFAULT_TOKEN_FILE, SCHEMA, SnowflakeConfig,
};
use crate::error::ConnectionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const DEFAULT_TOKEN_TYPE: &str = "OAUTH";
const MAX_ERROR_BODY: usize = 200;
/// Slack given to each HTTP call so the caller's own deadline fires first
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Errors from a single SQL API round trip
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("Snowflake returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// A SQL statement plus positional text bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    /// Bind the next `?` placeholder as TEXT
    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.bindings.push(value.into());
        self
    }
}

/// Escape text for use inside a single-quoted Snowflake string literal.
///
/// Snowflake treats backslash as an escape character inside literals, so
/// backslashes are doubled along with single quotes.
pub fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '\'' => escaped.push_str("''"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Build the medical agent invocation for a question
pub fn agent_statement(question: &str, bind_parameters: bool) -> Statement {
    let target = format!("{}.{}.{}!{}", DATABASE, SCHEMA, AGENT_OBJECT, AGENT_METHOD);
    if bind_parameters {
        Statement::new(format!("SELECT {}(?) AS response", target)).bind(question)
    } else {
        Statement::new(format!(
            "SELECT {}('{}') AS response",
            target,
            escape_literal(question)
        ))
    }
}

/// Decoded rows of a finished statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    /// First row's value in `column` (case-insensitive), if present and not empty
    pub fn first_text(&self, column: &str) -> Option<&str> {
        let index = self
            .columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))?;
        self.rows
            .first()?
            .get(index)?
            .as_deref()
            .filter(|value| !value.is_empty())
    }
}

/// Connection parameters resolved from the environment
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub token: String,
    pub token_type: String,
    pub warehouse: Option<String>,
    pub role: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from process environment, falling back to config defaults
    pub fn from_env(config: &SnowflakeConfig) -> Result<Self, ConnectionError> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    pub fn resolve<F>(config: &SnowflakeConfig, lookup: F) -> Result<Self, ConnectionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = if let Some(host) = var("SNOWFLAKE_HOST").or_else(|| config.host.clone()) {
            host_url(&host)
        } else if let Some(account) = var("SNOWFLAKE_ACCOUNT").or_else(|| config.account.clone()) {
            account_url(&account)
        } else {
            return Err(ConnectionError::MissingAccount);
        };

        let token = match var("SNOWFLAKE_TOKEN") {
            Some(token) => token,
            None => {
                let path = var("SNOWFLAKE_TOKEN_FILE")
                    .map(PathBuf::from)
                    .or_else(|| config.token_file.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE));
                std::fs::read_to_string(&path)
                    .ok()
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| ConnectionError::MissingToken(path.display().to_string()))?
            }
        };

        if token.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ConnectionError::InvalidToken(
                "token contains whitespace or control characters".to_string(),
            ));
        }

        let token_type = var("SNOWFLAKE_TOKEN_TYPE")
            .or_else(|| config.token_type.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string())
            .to_uppercase();

        Ok(Self {
            base_url,
            token,
            token_type,
            warehouse: var("SNOWFLAKE_WAREHOUSE").or_else(|| config.warehouse.clone()),
            role: var("SNOWFLAKE_ROLE").or_else(|| config.role.clone()),
        })
    }
}

fn host_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn account_url(account: &str) -> String {
    format!(
        "https://{}.snowflakecomputing.com",
        account.trim().to_lowercase().replace('_', "-")
    )
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    schema: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding<'a>>,
}

#[derive(Debug, Serialize)]
struct Binding<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    code: Option<String>,
    message: Option<String>,
    statement_status_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}

fn http_timeout(statement_timeout: Duration) -> Duration {
    statement_timeout.saturating_add(HTTP_TIMEOUT_MARGIN)
}

/// HTTP client for the Snowflake SQL API
#[derive(Clone)]
pub struct SqlApiClient {
    http: reqwest::Client,
    credentials: Credentials,
    statement_timeout: Duration,
    poll_interval: Duration,
}

impl SqlApiClient {
    pub fn new(
        credentials: Credentials,
        statement_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, ConnectionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(http_timeout(statement_timeout))
            .user_agent(concat!("medchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectionError::Client(e.to_string()))?;

        Ok(Self {
            http,
            credentials,
            statement_timeout,
            poll_interval,
        })
    }

    /// Submit a statement and wait for its result, polling while Snowflake reports it running
    pub async fn execute(&self, statement: &Statement) -> Result<ResultSet, SqlApiError> {
        let url = format!("{}{}", self.credentials.base_url, STATEMENTS_PATH);
        let body = self.request_body(statement);

        tracing::debug!(url = %url, bindings = statement.bindings.len(), "submitting statement");

        let response = self
            .authorized(self.http.post(&url))
            .query(&[("requestId", uuid::Uuid::new_v4().to_string())])
            .json(&body)
            .send()
            .await
            .map_err(|e| SqlApiError::Transport(e.to_string()))?;

        self.settle(response).await
    }

    async fn settle(&self, mut response: reqwest::Response) -> Result<ResultSet, SqlApiError> {
        loop {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| SqlApiError::Transport(e.to_string()))?;

            match status {
                200 => return parse_result_set(&text),
                202 => {
                    let pending = parse_response(&text)?;
                    let status_url = pending.statement_status_url.ok_or_else(|| {
                        SqlApiError::Decode("statement still running but no status URL".to_string())
                    })?;
                    tracing::debug!(status_url = %status_url, "statement still running, polling");

                    tokio::time::sleep(self.poll_interval).await;
                    let url = format!("{}{}", self.credentials.base_url, status_url);
                    response = self
                        .authorized(self.http.get(&url))
                        .send()
                        .await
                        .map_err(|e| SqlApiError::Transport(e.to_string()))?;
                }
                _ => {
                    return Err(SqlApiError::Api {
                        status,
                        message: api_error_message(&text),
                    });
                }
            }
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.credentials.token)
            .header(
                "X-Snowflake-Authorization-Token-Type",
                &self.credentials.token_type,
            )
            .header(reqwest::header::ACCEPT, "application/json")
    }

    fn request_body<'a>(&'a self, statement: &'a Statement) -> StatementRequest<'a> {
        let bindings = statement
            .bindings
            .iter()
            .enumerate()
            .map(|(index, value)| {
                (
                    (index + 1).to_string(),
                    Binding {
                        kind: "TEXT",
                        value,
                    },
                )
            })
            .collect();

        StatementRequest {
            statement: &statement.sql,
            timeout: self.statement_timeout.as_secs(),
            database: DATABASE,
            schema: SCHEMA,
            warehouse: self.credentials.warehouse.as_deref(),
            role: self.credentials.role.as_deref(),
            bindings,
        }
    }
}

fn parse_response(text: &str) -> Result<StatementResponse, SqlApiError> {
    serde_json::from_str(text).map_err(|e| SqlApiError::Decode(e.to_string()))
}

fn parse_result_set(text: &str) -> Result<ResultSet, SqlApiError> {
    let response = parse_response(text)?;
    let columns = response
        .result_set_meta_data
        .unwrap_or_default()
        .row_type
        .into_iter()
        .map(|column| column.name)
        .collect();

    Ok(ResultSet {
        columns,
        rows: response.data,
    })
}

/// Pull a readable message out of an error body, falling back to the raw text
fn api_error_message(text: &str) -> String {
    if let Ok(response) = serde_json::from_str::<StatementResponse>(text) {
        if let Some(message) = response.message.filter(|m| !m.trim().is_empty()) {
            return match response.code {
                Some(code) => format!("{} (code {})", message.trim(), code),
                None => message.trim().to_string(),
            };
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        "empty error body".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_BODY).collect()
    }
}
