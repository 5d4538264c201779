use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::gateway::prompts::{ASSISTANT_SYSTEM_PROMPT, CHAT_SYSTEM_PROMPT};

/// Main configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared outbound HTTP client configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Recipe data source configuration
    #[serde(default)]
    pub data_source: DataSourceConfig,
    /// OpenAI-style completion provider
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Anthropic-style completion provider
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    /// Per-endpoint completion settings
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Demographics database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists, falling back to defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in Self::default_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Candidate config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::home_dir().map(|h| h.join(".switch-gateway").join("config.toml")),
            dirs::config_dir().map(|c| c.join("switch-gateway").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Include internal error text in 500 responses
    #[serde(default)]
    pub debug: bool,
    /// Deadline for a whole inbound request, outbound calls included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum accepted request body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            debug: false,
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Transport timeout for each outbound call in seconds
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

/// Recipe data source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    /// Base URL that record references are appended to
    #[serde(default = "default_data_source_base_url")]
    pub base_url: String,
    /// Namespace segment placed before bare (single-segment) references
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_data_source_base_url(),
            default_namespace: default_namespace(),
        }
    }
}

fn default_data_source_base_url() -> String {
    "https://api-gateway-switchproject.posti.world/api-refactoring/api/v1/bo/SWITCH_FOOD_EX_RECIPES"
        .to_string()
}

fn default_namespace() -> String {
    "ae941ce8-efc6-49b0-baee-7f7b512a7c31".to_string()
}

/// OpenAI API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (`/chat/completions` is appended)
    #[serde(default = "default_openai_api_url")]
    pub api_url: String,
    /// Environment variable name for API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_url: default_openai_api_url(),
            api_key_env: default_openai_api_key_env(),
        }
    }
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Anthropic API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicConfig {
    /// API base URL (`/messages` is appended)
    #[serde(default = "default_anthropic_api_url")]
    pub api_url: String,
    /// Environment variable name for API key
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,
    /// Value of the `anthropic-version` header
    #[serde(default = "default_anthropic_version")]
    pub version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_url: default_anthropic_api_url(),
            api_key_env: default_anthropic_api_key_env(),
            version: default_anthropic_version(),
        }
    }
}

fn default_anthropic_api_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

/// Completion provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

/// Logical gateway endpoints, each backed by its own gateway instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// General completion, data optional
    Completion,
    /// Recipe assistant, data required
    Assistant,
    /// App helper chat with conversation history
    Chat,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Completion, Endpoint::Assistant, Endpoint::Chat];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Completion => "completion",
            Endpoint::Assistant => "assistant",
            Endpoint::Chat => "chat",
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            Endpoint::Completion => "/completion",
            Endpoint::Assistant => "/api/assistant",
            Endpoint::Chat => "/api/chat",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(name.trim()))
    }

    fn defaults(&self) -> EndpointSettings {
        match self {
            Endpoint::Completion => EndpointSettings {
                provider: ProviderKind::OpenAi,
                model: "gpt-4o".to_string(),
                max_tokens: 1000,
                temperature: 0.7,
                require_data: false,
                system_prompt: ASSISTANT_SYSTEM_PROMPT.to_string(),
            },
            Endpoint::Assistant => EndpointSettings {
                provider: ProviderKind::OpenAi,
                model: "gpt-4o".to_string(),
                max_tokens: 1000,
                temperature: 0.7,
                require_data: true,
                system_prompt: ASSISTANT_SYSTEM_PROMPT.to_string(),
            },
            Endpoint::Chat => EndpointSettings {
                provider: ProviderKind::Anthropic,
                model: "claude-sonnet-4-20250514".to_string(),
                max_tokens: 1024,
                temperature: 1.0,
                require_data: false,
                system_prompt: CHAT_SYSTEM_PROMPT.to_string(),
            },
        }
    }
}

/// Overrides for a single endpoint; unset fields keep the endpoint default
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EndpointConfig {
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub require_data: Option<bool>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EndpointsConfig {
    #[serde(default)]
    pub completion: EndpointConfig,
    #[serde(default)]
    pub assistant: EndpointConfig,
    #[serde(default)]
    pub chat: EndpointConfig,
}

impl EndpointsConfig {
    /// Effective settings for an endpoint: its defaults with overrides applied
    pub fn resolve(&self, endpoint: Endpoint) -> EndpointSettings {
        let overrides = match endpoint {
            Endpoint::Completion => &self.completion,
            Endpoint::Assistant => &self.assistant,
            Endpoint::Chat => &self.chat,
        };
        let defaults = endpoint.defaults();

        EndpointSettings {
            provider: overrides.provider.unwrap_or(defaults.provider),
            model: overrides.model.clone().unwrap_or(defaults.model),
            max_tokens: overrides.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            require_data: overrides.require_data.unwrap_or(defaults.require_data),
            system_prompt: overrides
                .system_prompt
                .clone()
                .unwrap_or(defaults.system_prompt),
        }
    }
}

/// Fully resolved settings for one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub require_data: bool,
    pub system_prompt: String,
}

/// Demographics database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL; takes precedence over `url_env`
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the connection URL
    #[serde(default = "default_database_url_env")]
    pub url_env: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// The connection URL, if configured directly or through the environment
    pub fn connection_url(&self) -> Option<String> {
        self.url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.url_env)
                    .ok()
                    .filter(|u| !u.trim().is_empty())
            })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_env: default_database_url_env(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Read an API key from the named environment variable
pub fn read_api_key(env_name: &str) -> Result<String> {
    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(GatewayError::Config(format!(
            "API key env var '{env_name}' not set"
        ))),
    }
}
