use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database holding the medical agent
pub const DATABASE: &str = "HOSPITAL";

/// Schema holding the medical agent
pub const SCHEMA: &str = "PUBLIC";

/// Agent object and the method invoked on it
pub const AGENT_OBJECT: &str = "MEDICALAGENT";
pub const AGENT_METHOD: &str = "ASK";

/// Column the agent's answer is returned under
pub const RESPONSE_COLUMN: &str = "RESPONSE";

/// Token file mounted by Snowflake's container runtime
pub const DEFAULT_TOKEN_FILE: &str = "/snowflake/session/token";

/// Questions offered in the sidebar
pub const SAMPLE_QUESTIONS: [&str; 5] = [
    "How many patients live in Dallas?",
    "Show me patient encounters with chief complaint as a rash",
    "What are the chronic conditions of patients over 60?",
    "Which patients have allergies to penicillin?",
    "Show me patients with Medicare insurance",
];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing directive
    pub log_level: String,

    /// Snowflake connection defaults (environment wins)
    pub snowflake: SnowflakeConfig,

    /// Agent request behaviour
    pub agent: AgentConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// medchat home directory
    #[serde(skip)]
    pub home: PathBuf,
}

/// Connection defaults. The token itself never lives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowflakeConfig {
    pub account: Option<String>,
    pub host: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub token_type: Option<String>,
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub bind_parameters: bool,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_timestamps: bool,
    pub tick_rate_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            poll_interval_ms: 500,
            bind_parameters: true,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            tick_rate_ms: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            log_level: "medchat=info".to_string(),
            snowflake: SnowflakeConfig::default(),
            agent: AgentConfig::default(),
            ui: UiConfig::default(),
            home: home.join(".medchat"),
        }
    }
}

impl Config {
    /// Load configuration from ~/.medchat/config.toml
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".medchat"))
    }

    /// Load configuration rooted at an explicit medchat home
    pub fn load_from(medchat_home: &Path) -> Result<Self> {
        fs::create_dir_all(medchat_home).context("Failed to create .medchat directory")?;

        let config_path = medchat_home.join("config.toml");
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home = medchat_home.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home).context("Failed to create .medchat directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(self.config_path(), content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Where the UI writes its log, since stdout belongs to the terminal
    pub fn log_path(&self) -> PathBuf {
        self.home.join("medchat.log")
    }

    /// Per-request budget, at least one second
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.agent.poll_interval_ms.max(50))
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms.max(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(config.agent.bind_parameters);
        assert!(config.snowflake.account.is_none());
        assert_eq!(config.log_level, "medchat=info");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".medchat");
        let config = Config::load_from(&home).unwrap();
        assert!(home.exists());
        assert_eq!(config.home, home);
        assert_eq!(config.agent.poll_interval_ms, 500);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(dir.path()).unwrap();
        config.snowflake.account = Some("xy12345".to_string());
        config.snowflake.warehouse = Some("COMPUTE_WH".to_string());
        config.agent.request_timeout_secs = 45;
        config.save().unwrap();

        let loaded = Config::load_from(dir.path()).unwrap();
        assert_eq!(loaded.snowflake.account.as_deref(), Some("xy12345"));
        assert_eq!(loaded.snowflake.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(loaded.request_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[agent]\nbind_parameters = false\n",
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert!(!config.agent.bind_parameters);
        assert_eq!(config.agent.request_timeout_secs, 60);
        assert!(config.ui.show_timestamps);
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let mut config = Config::default();
        config.agent.request_timeout_secs = 0;
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), "agent = [").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }

    #[test]
    fn test_sample_questions() {
        assert_eq!(SAMPLE_QUESTIONS.len(), 5);
        assert_eq!(SAMPLE_QUESTIONS[0], "How many patients live in Dallas?");
    }
}
