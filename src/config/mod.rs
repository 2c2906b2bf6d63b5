//! Configuration management for chatdeck

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::openai::OPENAI_BASE_URL;
use crate::llm::{DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest multipart body accepted by `POST /chat`
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub base_url: String,
    /// Longest gap allowed between two chunks of a streamed response
    pub stream_timeout_secs: u64,
    /// Only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_store_id: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            stream_timeout_secs: 120,
            api_key: None,
            vector_store_id: None,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("stream_timeout_secs", &self.stream_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("vector_store_id", &self.vector_store_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// Hosted tools declared to the model
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolsConfig {
    pub web_search: ToolToggle,
    pub file_search: FileSearchConfig,
    pub image_generation: ImageGenerationConfig,
    pub code_interpreter: ToolToggle,
    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolToggle {
    pub enabled: bool,
}

impl Default for ToolToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSearchConfig {
    pub enabled: bool,
    pub max_num_results: u32,
}

impl Default for FileSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_num_results: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageGenerationConfig {
    pub enabled: bool,
    /// "low", "medium", "high" or "auto"
    pub quality: String,
    pub output_format: String,
    /// Preview frames streamed before the final image (0-3)
    pub partial_images: u32,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: "auto".to_string(),
            output_format: "jpeg".to_string(),
            partial_images: 1,
        }
    }
}

/// Remote MCP server exposed as a hosted tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub enabled: bool,
    pub server_url: String,
    pub server_label: String,
    pub server_description: String,
    pub require_approval: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: "https://mcp.context7.com/mcp".to_string(),
            server_label: "Context7".to_string(),
            server_description: "Use this to get the docs from software projects.".to_string(),
            require_approval: "never".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub conversation_id: String,
    pub db_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            conversation_id: "chat-history".to_string(),
            db_path: PathBuf::from("chat-gpt-clone-memory.db"),
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "chatdeck") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables
    ///
    /// Empty values count as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(id) = get("VECTOR_STORE_ID") {
            self.openai.vector_store_id = Some(id);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(model) = get("CHATDECK_MODEL") {
            self.openai.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_hosted_setup() {
        let config = Config::default();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.session.conversation_id, "chat-history");
        assert_eq!(
            config.session.db_path,
            PathBuf::from("chat-gpt-clone-memory.db")
        );
        assert_eq!(config.tools.file_search.max_num_results, 3);
        assert_eq!(config.tools.mcp.server_label, "Context7");
        assert!(config.openai.vector_store_id.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[tools.mcp]
enabled = false

[session]
db_path = "/tmp/other.db"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.tools.mcp.enabled);
        assert!(config.tools.web_search.enabled);
        assert_eq!(config.session.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.session.conversation_id, "chat-history");
    }

    #[test]
    fn test_invalid_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "server = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("VECTOR_STORE_ID", "vs_42"),
            ("OPENAI_BASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai.vector_store_id.as_deref(), Some("vs_42"));
        // Empty value leaves the default alone
        assert_eq!(config.openai.base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_api_key_never_serialized_or_printed() {
        let mut config = Config::default();
        config.openai.api_key = Some("sk-secret".to_string());

        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("sk-secret"));
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
