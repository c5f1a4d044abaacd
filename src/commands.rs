use anyhow::Result;

use crate::agent::AgentClient;
use crate::config::{Config, DATABASE, SAMPLE_QUESTIONS, SCHEMA};
use crate::connection::{ConnectionProvider, ConnectionStatus, SnowflakeConnector};
use crate::session::ChatSession;
use crate::ui::sidebar::status_text;

/// One exchange without the terminal UI. Failures are printed like any other reply.
pub async fn ask(config: Config, question: &str) -> Result<()> {
    let agent = AgentClient::from_config(&config);
    let provider = ConnectionProvider::new(SnowflakeConnector::new(config));
    let mut session = ChatSession::new();

    let reply = session.exchange(&agent, &provider, question).await?;
    println!("{}", reply.text());
    Ok(())
}

/// Print the connection status; returns whether it is connected
pub async fn status(config: Config) -> bool {
    let provider = ConnectionProvider::new(SnowflakeConnector::new(config));
    let status = provider.status().await;

    println!("{}", status_text(Some(&status)));
    println!("Database: {}", DATABASE);
    println!("Schema: {}", SCHEMA);
    if let ConnectionStatus::Connected { id } = &status {
        tracing::debug!(connection_id = %id, "status check connected");
    }
    status.is_connected()
}

pub fn samples() {
    println!("💡 Sample questions:\n");
    for (index, question) in SAMPLE_QUESTIONS.iter().enumerate() {
        println!("  {}. {}", index + 1, question);
    }
}
