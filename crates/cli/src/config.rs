use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;
const DEFAULT_TOOL_LIMIT: usize = 100;
const DEFAULT_ARCADE_BASE_URL: &str = "https://api.arcade.dev";

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model provider configuration.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Arcade tool service configuration.
    #[serde(default)]
    pub arcade: ArcadeConfig,

    /// Checkpoint storage configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Operator identity, from `ARCADE_USER_ID` only.
    #[serde(skip)]
    pub user_id: Option<String>,
}

/// Model provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model id, from `OPENAI_MODEL` only.
    #[serde(skip)]
    pub model: String,
    /// API key (env overrides applied at load time; see `Config::load`).
    #[serde(default)]
    pub api_key: String,
    /// Explicit API base URL for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
    /// Maximum tool-call rounds per turn before bailing out.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Replaces the built-in system prompt with the file's contents.
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key: String::new(),
            base_url: None,
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt_file: None,
        }
    }
}

/// Arcade tool service config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcadeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_arcade_base_url")]
    pub base_url: String,
    /// Toolkits whose every tool is offered to the model.
    #[serde(default = "default_toolkits")]
    pub toolkits: Vec<String>,
    /// Individual tools offered in addition to the toolkits.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Maximum tool definitions fetched per toolkit.
    #[serde(default = "default_tool_limit")]
    pub limit: usize,
    /// Model-facing tool names whose calls need operator approval.
    #[serde(default)]
    pub require_approval: Vec<String>,
}

impl Default for ArcadeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_arcade_base_url(),
            toolkits: default_toolkits(),
            tools: Vec::new(),
            limit: default_tool_limit(),
            require_approval: Vec::new(),
        }
    }
}

/// Where thread checkpoints live.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Process-local; threads end with the process.
    #[default]
    Memory,
    /// SQLite file; threads can be resumed with `--thread`.
    Sqlite,
}

/// Checkpoint storage config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// SQLite file path.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            url: default_database_url(),
        }
    }
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

fn default_tool_limit() -> usize {
    DEFAULT_TOOL_LIMIT
}

fn default_arcade_base_url() -> String {
    DEFAULT_ARCADE_BASE_URL.to_string()
}

fn default_toolkits() -> Vec<String> {
    vec!["Firecrawl".to_string()]
}

pub(crate) fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

fn default_database_url() -> String {
    home_dir()
        .join(".toolbot")
        .join("checkpoints.db")
        .to_string_lossy()
        .into_owned()
}

/// Reads an environment variable, treating empty values as unset.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            // Look in current dir, then home dir
            let cwd = std::env::current_dir().ok()?.join("config.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home_config = home_dir().join(".toolbot").join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        config.user_id = env_value("ARCADE_USER_ID");
        if let Some(model) = env_value("OPENAI_MODEL") {
            config.agent.model = model;
        }
        if let Some(key) = env_value("OPENAI_API_KEY") {
            config.agent.api_key = key;
        }
        if let Some(url) = env_value("OPENAI_BASE_URL") {
            config.agent.base_url = Some(url);
        }
        if let Some(key) = env_value("ARCADE_API_KEY") {
            config.arcade.api_key = key;
        }
        if let Some(url) = env_value("ARCADE_BASE_URL") {
            config.arcade.base_url = url;
        }
        if let Some(url) = env_value("TOOLBOT_DATABASE_URL") {
            config.persistence.url = url;
            config.persistence.backend = PersistenceBackend::Sqlite;
        }

        debug!(
            model = %config.agent.model,
            base_url = ?config.agent.base_url,
            toolkits = ?config.arcade.toolkits,
            backend = ?config.persistence.backend,
            "Config loaded"
        );
        Ok(config)
    }

    /// Operator identity used for tool authorization.
    pub fn require_user_id(&self) -> Result<&str, ConfigError> {
        self.user_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv("ARCADE_USER_ID".to_string()))
    }

    /// Model identifier.
    pub fn require_model(&self) -> Result<&str, ConfigError> {
        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::MissingEnv("OPENAI_MODEL".to_string()));
        }
        Ok(&self.agent.model)
    }

    /// Checks every value the chat loop cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_user_id()?;
        self.require_model()?;
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.max_tool_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The system prompt: the configured file, else the built-in one.
    pub fn system_prompt(&self) -> Result<String, ConfigError> {
        match &self.agent.system_prompt_file {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Ok(crate::prompt::FIRECRAWL_SYSTEM_PROMPT.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remove_env_var, set_env_var, with_locked_env};

    const ENV_KEYS: &[&str] = &[
        "ARCADE_USER_ID",
        "OPENAI_MODEL",
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "ARCADE_API_KEY",
        "ARCADE_BASE_URL",
        "TOOLBOT_DATABASE_URL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            remove_env_var(key);
        }
    }

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.max_tool_rounds, 25);
        assert_eq!(cfg.arcade.toolkits, vec!["Firecrawl"]);
        assert_eq!(cfg.arcade.limit, 100);
        assert_eq!(cfg.arcade.base_url, "https://api.arcade.dev");
        assert!(cfg.arcade.require_approval.is_empty());
        assert_eq!(cfg.persistence.backend, PersistenceBackend::Memory);
        assert!(cfg.persistence.url.ends_with("checkpoints.db"));
    }

    #[test]
    fn load_reads_file_and_applies_env_overrides() {
        with_locked_env(|| {
            clear_env();
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = write_config(
                tmp.path(),
                r#"
[agent]
api_key = "file-key"
max_tool_rounds = 5

[arcade]
toolkits = ["Firecrawl", "Gmail"]
tools = ["Slack.SendMessage"]
require_approval = ["Gmail_SendEmail"]

[persistence]
backend = "sqlite"
url = "/tmp/toolbot.db"
"#,
            );
            set_env_var("ARCADE_USER_ID", "user@example.com");
            set_env_var("OPENAI_MODEL", "gpt-4o-mini");
            set_env_var("OPENAI_API_KEY", "env-key");
            set_env_var("ARCADE_BASE_URL", "http://localhost:9099");

            let cfg = Config::load(Some(path.as_path())).expect("config should load");
            clear_env();

            assert_eq!(cfg.user_id.as_deref(), Some("user@example.com"));
            assert_eq!(cfg.agent.model, "gpt-4o-mini");
            assert_eq!(cfg.agent.api_key, "env-key");
            assert_eq!(cfg.agent.max_tool_rounds, 5);
            assert_eq!(cfg.arcade.toolkits, vec!["Firecrawl", "Gmail"]);
            assert_eq!(cfg.arcade.tools, vec!["Slack.SendMessage"]);
            assert_eq!(cfg.arcade.require_approval, vec!["Gmail_SendEmail"]);
            assert_eq!(cfg.arcade.base_url, "http://localhost:9099");
            assert_eq!(cfg.arcade.limit, 100);
            assert_eq!(cfg.persistence.backend, PersistenceBackend::Sqlite);
            assert_eq!(cfg.persistence.url, "/tmp/toolbot.db");
        });
    }

    #[test]
    fn missing_model_is_reported_by_name() {
        with_locked_env(|| {
            clear_env();
            set_env_var("ARCADE_USER_ID", "user@example.com");
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = write_config(tmp.path(), "");

            let cfg = Config::load(Some(path.as_path())).expect("config should load");
            clear_env();

            let err = cfg.validate().expect_err("model is required");
            assert_eq!(
                err.to_string(),
                "Missing OPENAI_MODEL. Add it to your .env file."
            );
        });
    }

    #[test]
    fn missing_or_empty_user_id_is_reported_by_name() {
        with_locked_env(|| {
            clear_env();
            set_env_var("ARCADE_USER_ID", "  ");
            set_env_var("OPENAI_MODEL", "gpt-4o");
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = write_config(tmp.path(), "");

            let cfg = Config::load(Some(path.as_path())).expect("config should load");
            clear_env();

            let err = cfg.validate().expect_err("user id is required");
            assert!(matches!(err, ConfigError::MissingEnv(ref name) if name == "ARCADE_USER_ID"));
        });
    }

    #[test]
    fn database_url_env_selects_sqlite_backend() {
        with_locked_env(|| {
            clear_env();
            set_env_var("TOOLBOT_DATABASE_URL", "/tmp/threads.db");
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = write_config(tmp.path(), "");

            let cfg = Config::load(Some(path.as_path())).expect("config should load");
            clear_env();

            assert_eq!(cfg.persistence.backend, PersistenceBackend::Sqlite);
            assert_eq!(cfg.persistence.url, "/tmp/threads.db");
        });
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        with_locked_env(|| {
            clear_env();
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = write_config(tmp.path(), "[agent\nmodel = ");
            let err = Config::load(Some(path.as_path())).expect_err("bad toml");
            assert!(matches!(err, ConfigError::Toml(_)));
        });
    }

    #[test]
    fn zero_tool_rounds_is_rejected() {
        let mut cfg = Config::default();
        cfg.user_id = Some("user@example.com".to_string());
        cfg.agent.model = "gpt-4o".to_string();
        cfg.agent.max_tool_rounds = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "agent.max_tool_rounds"
        ));
    }

    #[test]
    fn system_prompt_defaults_to_builtin_and_reads_file() {
        let cfg = Config::default();
        let prompt = cfg.system_prompt().expect("builtin prompt");
        assert!(prompt.starts_with("# Firecrawl ReAct Agent"));

        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("prompt.md");
        std::fs::write(&path, "You are terse.").expect("write prompt");
        let mut cfg = Config::default();
        cfg.agent.system_prompt_file = Some(path);
        assert_eq!(cfg.system_prompt().expect("file prompt"), "You are terse.");
    }
}
