use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{OpenAiConfig, read_api_key};
use crate::error::Result;
use crate::gateway::CompletionRequest;
use crate::providers::{CompletionError, CompletionProvider};

/// OpenAI chat completions provider
pub struct OpenAiProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

impl OpenAiProvider {
    /// Reads the API key from the environment variable named in config
    pub fn new(client: Client, config: &OpenAiConfig) -> Result<Self> {
        let api_key = read_api_key(&config.api_key_env)?;
        Ok(Self::with_api_key(client, config.api_url.clone(), api_key))
    }

    pub fn with_api_key(
        client: Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(Message {
            role: "system",
            content: &request.system_prompt,
        });
        for turn in &request.history {
            messages.push(Message {
                role: turn.role.as_str(),
                content: &turn.content,
            });
        }
        messages.push(Message {
            role: "user",
            content: &request.user_prompt,
        });

        let body = ChatCompletionRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = self.endpoint();
        debug!("Calling OpenAI API at: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                error_type = "completion",
                provider = "openai",
                status = status.as_u16(),
                body_length = error_text.len(),
                "OpenAI API request failed"
            );
            debug!("OpenAI error body: {}", error_text);
            return Err(CompletionError::Http {
                status: status.as_u16(),
            });
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("OpenAI response is not valid JSON: {e}");
                return Err(CompletionError::EmptyAnswer);
            }
        };

        parse_response_content(&payload).ok_or(CompletionError::EmptyAnswer)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Answer text at `choices[0].message.content`, trimmed, if non-blank
pub(crate) fn parse_response_content(response_body: &Value) -> Option<String> {
    response_body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
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
            system_prompt: "Sei Switch Assistant".to_string(),
            history: vec![ChatMessage::user("Ciao"), ChatMessage::assistant("Ciao!")],
            user_prompt: "Quali sono gli ingredienti?".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    #[test]
    fn test_openai_parse_response_content() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "  Hello World \n"
                }
            }]
        });

        assert_eq!(
            parse_response_content(&response),
            Some("Hello World".to_string())
        );
    }

    #[test]
    fn test_openai_parse_response_content_empty() {
        assert_eq!(parse_response_content(&json!({"choices": []})), None);
        assert_eq!(
            parse_response_content(&json!({"choices": [{"message": {"content": "   "}}]})),
            None
        );
        assert_eq!(
            parse_response_content(&json!({"choices": [{"message": {"content": null}}]})),
            None
        );
        assert_eq!(parse_response_content(&json!("unexpected")), None);
    }

    #[tokio::test]
    async fn test_openai_complete_sends_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "max_tokens": 1000,
                "messages": [
                    {"role": "system", "content": "Sei Switch Assistant"},
                    {"role": "user", "content": "Ciao"},
                    {"role": "assistant", "content": "Ciao!"},
                    {"role": "user", "content": "Quali sono gli ingredienti?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Pasta e pesto 🌱"}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::with_api_key(
            Client::new(),
            format!("{}/v1", mock_server.uri()),
            "test-key",
        );

        let answer = provider.complete(&request()).await.unwrap();
        assert_eq!(answer, "Pasta e pesto 🌱");
    }

    #[tokio::test]
    async fn test_openai_complete_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
            )
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::with_api_key(Client::new(), mock_server.uri(), "wrong");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err, CompletionError::Http { status: 401 });
    }

    #[tokio::test]
    async fn test_openai_complete_malformed_body_is_empty_answer() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("definitely not json"))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::with_api_key(Client::new(), mock_server.uri(), "k");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err, CompletionError::EmptyAnswer);
    }
}
