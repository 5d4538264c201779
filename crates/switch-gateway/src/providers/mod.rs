//! Completion provider abstraction for multi-provider support

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, ProviderKind};
use crate::error::Result;
use crate::gateway::CompletionRequest;

/// Completion failures (mapped to 500)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Provider answered with a non-2xx status
    #[error("completion provider returned status {status}")]
    Http { status: u16 },

    /// Connection, timeout or body read failure
    #[error("completion request failed: {0}")]
    Transport(String),

    /// 2xx without any extractable answer text
    #[error("completion provider returned no answer")]
    EmptyAnswer,
}

impl CompletionError {
    /// Stable machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            CompletionError::Http { .. } => "http_error",
            CompletionError::Transport(_) => "transport_error",
            CompletionError::EmptyAnswer => "empty_answer",
        }
    }
}

/// Trait for LLM completion providers
///
/// Implementations handle the differences between providers like OpenAI and
/// Anthropic in terms of request envelope and response parsing.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one completion request and return the trimmed answer text
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, CompletionError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Construct the provider of the given kind, reading its API key once
pub fn build_provider(
    kind: ProviderKind,
    config: &Config,
    client: Client,
) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client, &config.openai)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(client, &config.anthropic)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(CompletionError::Http { status: 429 }.reason(), "http_error");
        assert_eq!(
            CompletionError::Transport("timeout".into()).reason(),
            "transport_error"
        );
        assert_eq!(CompletionError::EmptyAnswer.reason(), "empty_answer");
    }

    #[test]
    fn test_build_provider_requires_api_key() {
        let mut config = Config::default();
        config.anthropic.api_key_env = "SWITCH_GATEWAY_UNSET_ANTHROPIC_KEY".to_string();

        let result = build_provider(ProviderKind::Anthropic, &config, Client::new());
        let err = result.err().expect("missing key must fail");
        assert!(err.to_string().contains("SWITCH_GATEWAY_UNSET_ANTHROPIC_KEY"));
    }
}
