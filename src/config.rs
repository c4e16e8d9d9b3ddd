use crate::analysis::SplitStrategy;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Default Anthropic Messages API endpoint.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
/// Model used when `LLM_MODEL` is not provided.
pub const DEFAULT_LLM_MODEL: &str = "claude-3-haiku-20240307";
/// Upload and paste cap applied when `MAX_UPLOAD_BYTES` is not provided (10MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the LegalLens server and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote model provider used for classification and chat.
    pub llm_provider: LlmProvider,
    /// API key forwarded to the Anthropic Messages API.
    pub anthropic_api_key: Option<String>,
    /// Base URL of the Anthropic Messages API.
    pub anthropic_api_url: String,
    /// Model identifier passed to the provider.
    pub llm_model: String,
    /// Token budget for clause classification requests.
    pub llm_max_tokens: u32,
    /// Upper bound on a single remote call before falling back locally.
    pub llm_timeout_secs: u64,
    /// Maximum number of classification requests in flight at once.
    pub classify_concurrency: usize,
    /// Splitter used to cut documents into candidate clauses.
    pub split_strategy: SplitStrategy,
    /// Size cap for uploaded files and pasted text.
    pub max_upload_bytes: usize,
    /// Number of prior conversation turns forwarded to the model.
    pub chat_history_limit: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported remote model backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    /// Hosted Anthropic Messages API.
    Anthropic,
    /// No remote model; every request uses the local fallbacks.
    None,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value source, applying the same defaults and validation
    /// as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let anthropic_api_key = load_optional(&lookup, "ANTHROPIC_API_KEY");
        let llm_provider = match load_optional(&lookup, "LLM_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("LLM_PROVIDER".to_string()))?,
            None if anthropic_api_key.is_some() => LlmProvider::Anthropic,
            None => LlmProvider::None,
        };
        if llm_provider == LlmProvider::Anthropic && anthropic_api_key.is_none() {
            return Err(ConfigError::MissingVariable("ANTHROPIC_API_KEY".to_string()));
        }

        Ok(Self {
            llm_provider,
            anthropic_api_key,
            anthropic_api_url: load_optional(&lookup, "ANTHROPIC_API_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_URL.to_string()),
            llm_model: load_optional(&lookup, "LLM_MODEL")
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_max_tokens: parse_optional(&lookup, "LLM_MAX_TOKENS")?.unwrap_or(1024),
            llm_timeout_secs: parse_optional(&lookup, "LLM_TIMEOUT_SECS")?.unwrap_or(30),
            classify_concurrency: parse_optional::<usize, _>(&lookup, "CLASSIFY_CONCURRENCY")?
                .unwrap_or(5)
                .max(1),
            split_strategy: load_optional(&lookup, "SPLIT_STRATEGY")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("SPLIT_STRATEGY".to_string()))
                })
                .transpose()?
                .unwrap_or_default(),
            max_upload_bytes: parse_optional(&lookup, "MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            chat_history_limit: parse_optional(&lookup, "CHAT_HISTORY_LIMIT")?.unwrap_or(10),
            server_port: parse_optional(&lookup, "SERVER_PORT")?,
        })
    }

    /// Configuration that never reaches a remote model. Used by tests and the offline CLI mode.
    pub fn offline() -> Self {
        Self {
            llm_provider: LlmProvider::None,
            anthropic_api_key: None,
            anthropic_api_url: DEFAULT_ANTHROPIC_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_max_tokens: 1024,
            llm_timeout_secs: 30,
            classify_concurrency: 5,
            split_strategy: SplitStrategy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            chat_history_limit: 10,
            server_port: None,
        }
    }
}

fn load_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    load_optional(lookup, key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "none" | "offline" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    install(config);
}

/// Install an explicit configuration, ignoring the call if one is already present.
pub fn install(config: Config) {
    tracing::debug!(
        provider = ?config.llm_provider,
        model = %config.llm_model,
        strategy = ?config.split_strategy,
        max_upload_bytes = config.max_upload_bytes,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    if CONFIG.set(config).is_err() {
        tracing::debug!("Configuration already initialized; keeping existing values");
    }
}
