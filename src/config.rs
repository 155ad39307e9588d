use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PaintwiseConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub conversation: ConversationConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub api_base: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_cache_size: usize,
    pub max_user_sessions: usize,
    pub preview_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_algorithm: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_paintwise_dir()
            .join("catalog.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-ada-002".into(),
            dimensions: 1536,
            api_base: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            timeout_secs: 20,
            batch_size: 10,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            api_base: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            temperature: 0.3,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 20,
            default_threshold: 0.7,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 100,
            max_user_sessions: 50,
            preview_chars: 100,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_algorithm: "HS256".into(),
        }
    }
}

/// Returns `~/.paintwise/`
pub fn default_paintwise_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".paintwise")
}

/// Returns the default config file path: `~/.paintwise/config.toml`
pub fn default_config_path() -> PathBuf {
    default_paintwise_dir().join("config.toml")
}

impl PaintwiseConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            PaintwiseConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `OPENAI_API_KEY` feeds both the embedding and generation clients unless
    /// they were given their own key in the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PAINTWISE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("PAINTWISE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if self.embedding.api_key.is_empty() {
                self.embedding.api_key = val.clone();
            }
            if self.generation.api_key.is_empty() {
                self.generation.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("OPENAI_MODEL") {
            self.generation.model = val;
        }
        if let Ok(val) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("PAINTWISE_JWT_SECRET") {
            self.auth.jwt_secret = val;
        }
        if let Some(val) = env_usize("CONVERSATION_MAX_CACHE_SIZE") {
            self.conversation.max_cache_size = val;
        }
        if let Some(val) = env_usize("CONVERSATION_MAX_USER_SESSIONS") {
            self.conversation.max_user_sessions = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(val) => Some(val),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric env override");
            None
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
