use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{AnthropicConfig, read_api_key};
use crate::error::Result;
use crate::gateway::CompletionRequest;
use crate::providers::{CompletionError, CompletionProvider};

/// Anthropic messages API provider
pub struct AnthropicProvider {
    client: Client,
    api_url: String,
    api_key: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

impl AnthropicProvider {
    /// Reads the API key from the environment variable named in config
    pub fn new(client: Client, config: &AnthropicConfig) -> Result<Self> {
        let api_key = read_api_key(&config.api_key_env)?;
        Ok(Self::with_api_key(
            client,
            config.api_url.clone(),
            api_key,
            config.version.clone(),
        ))
    }

    pub fn with_api_key(
        client: Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            version: version.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let messages = request
            .history
            .iter()
            .map(|turn| Message {
                role: turn.role.as_str(),
                content: &turn.content,
            })
            .chain(std::iter::once(Message {
                role: "user",
                content: &request.user_prompt,
            }))
            .collect();

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system_prompt,
            messages,
        };

        let url = self.endpoint();
        debug!("Calling Anthropic API at: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                error_type = "completion",
                provider = "anthropic",
                status = status.as_u16(),
                body_length = error_text.len(),
                "Anthropic API request failed"
            );
            debug!("Anthropic error body: {}", error_text);
            return Err(CompletionError::Http {
                status: status.as_u16(),
            });
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Anthropic response is not valid JSON: {e}");
                return Err(CompletionError::EmptyAnswer);
            }
        };

        parse_response_content(&payload).ok_or(CompletionError::EmptyAnswer)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

/// Concatenated `text` blocks of `content`, trimmed, if non-blank
pub(crate) fn parse_response_content(response_body: &Value) -> Option<String> {
    let content = response_body.get("content")?.as_array()?;
    let mut result = String::new();

    for block in content {
        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
            if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                result.push_str(text);
            }
        }
    }

    let trimmed = result.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChatMessage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "Sei un assistente esperto".to_string(),
            history: vec![ChatMessage::user("Ciao"), ChatMessage::assistant("Ciao! 👋")],
            user_prompt: "Come calcolo la CO2?".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            temperature: 1.0,
        }
    }

    #[test]
    fn test_anthropic_parse_text_blocks() {
        let response = json!({
            "content": [
                {"type": "text", "text": "Prima parte. "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "Seconda parte."}
            ]
        });
        assert_eq!(
            parse_response_content(&response),
            Some("Prima parte. Seconda parte.".to_string())
        );
    }

    #[test]
    fn test_anthropic_parse_missing_text() {
        assert_eq!(parse_response_content(&json!({"content": []})), None);
        assert_eq!(parse_response_content(&json!({"content": "text"})), None);
        assert_eq!(
            parse_response_content(&json!({"content": [{"type": "text"}]})),
            None
        );
        assert_eq!(parse_response_content(&json!({})), None);
    }

    #[tokio::test]
    async fn test_anthropic_complete_sends_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 1024,
                "system": "Sei un assistente esperto",
                "messages": [
                    {"role": "user", "content": "Ciao"},
                    {"role": "assistant", "content": "Ciao! 👋"},
                    {"role": "user", "content": "Come calcolo la CO2?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Usa il calcolatore 💧"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::with_api_key(
            Client::new(),
            format!("{}/v1", mock_server.uri()),
            "sk-ant-test",
            "2023-06-01",
        );

        let answer = provider.complete(&request()).await.unwrap();
        assert_eq!(answer, "Usa il calcolatore 💧");
    }

    #[tokio::test]
    async fn test_anthropic_complete_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let provider =
            AnthropicProvider::with_api_key(Client::new(), mock_server.uri(), "k", "2023-06-01");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err, CompletionError::Http { status: 529 });
        assert_eq!(err.reason(), "http_error");
    }

    #[tokio::test]
    async fn test_anthropic_complete_no_text_is_empty_answer() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&mock_server)
            .await;

        let provider =
            AnthropicProvider::with_api_key(Client::new(), mock_server.uri(), "k", "2023-06-01");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err, CompletionError::EmptyAnswer);
    }
}
