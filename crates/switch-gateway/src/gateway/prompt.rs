//! Prompt building: resolved context + question -> completion request
//!
//! Pure and deterministic. History is passed through untruncated; its size
//! is bounded only by the provider's input limit.

use serde_json::Value;

use crate::config::EndpointSettings;
use crate::gateway::prompts::{ANSWER_INSTRUCTION, QUESTION_LABEL, RECORD_HEADER};
use crate::gateway::request::{ChatMessage, InboundRequest};
use crate::gateway::resolver::ResolvedContext;

/// Provider-independent completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Prior turns, oldest first, sent before `user_prompt`
    pub history: Vec<ChatMessage>,
    pub user_prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// History followed by the new user turn
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(self.user_prompt.clone()));
        messages
    }
}

/// Builds completion requests for one endpoint
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl PromptBuilder {
    pub fn new(settings: &EndpointSettings) -> Self {
        Self {
            system_prompt: settings.system_prompt.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    pub fn build(&self, context: &ResolvedContext, inbound: &InboundRequest) -> CompletionRequest {
        CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            history: inbound.history.clone(),
            user_prompt: user_prompt(context.data.as_ref(), &inbound.question),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Record (pretty JSON) and question, or the bare question without a record
pub fn user_prompt(data: Option<&Value>, question: &str) -> String {
    match data {
        Some(record) => {
            let record_text =
                serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string());
            format!("{RECORD_HEADER}\n\n{record_text}\n\n{QUESTION_LABEL} {question}\n\n{ANSWER_INSTRUCTION}")
        }
        None => question.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoint, EndpointsConfig};
    use crate::gateway::prompts::{ASSISTANT_SYSTEM_PROMPT, CHAT_SYSTEM_PROMPT};
    use crate::gateway::resolver::ContextSource;
    use serde_json::json;

    fn inbound(question: &str, history: Vec<ChatMessage>) -> InboundRequest {
        InboundRequest {
            question: question.to_string(),
            data_ref: None,
            inline_data: None,
            history,
        }
    }

    fn carbonara() -> ResolvedContext {
        ResolvedContext {
            data: Some(json!({
                "recipeName": "Carbonara",
                "ingredients": ["pasta", "guanciale", "uova"]
            })),
            source: ContextSource::Inline,
        }
    }

    #[test]
    fn test_record_prompt_contains_record_and_question() {
        let builder = PromptBuilder::new(&EndpointsConfig::default().resolve(Endpoint::Assistant));
        let req = builder.build(&carbonara(), &inbound("Quali sono gli ingredienti?", vec![]));

        assert!(req.user_prompt.starts_with("Ecco i dettagli della ricetta:"));
        assert!(req.user_prompt.contains("\"Carbonara\""));
        assert!(req.user_prompt.contains("\"guanciale\""));
        assert!(req.user_prompt.contains("Domanda dell'utente: Quali sono gli ingredienti?"));
        assert!(req.user_prompt.ends_with("Fornisci una risposta utile, concisa e in italiano."));
        assert_eq!(req.system_prompt, ASSISTANT_SYSTEM_PROMPT);
        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.max_tokens, 1000);
    }

    #[test]
    fn test_prompt_without_record_is_question() {
        let builder = PromptBuilder::new(&EndpointsConfig::default().resolve(Endpoint::Chat));
        let req = builder.build(&ResolvedContext::none(), &inbound("Come funziona l'app?", vec![]));

        assert_eq!(req.user_prompt, "Come funziona l'app?");
        assert_eq!(req.system_prompt, CHAT_SYSTEM_PROMPT);
        assert!(req.history.is_empty());
    }

    #[test]
    fn test_history_precedes_new_question() {
        let builder = PromptBuilder::new(&EndpointsConfig::default().resolve(Endpoint::Chat));
        let history = vec![
            ChatMessage::user("Ciao"),
            ChatMessage::assistant("Ciao! Come posso aiutarti? 🌱"),
        ];
        let req = builder.build(&ResolvedContext::none(), &inbound("Cos'è la fascia rossa?", history));

        let messages = req.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], ChatMessage::user("Ciao"));
        assert_eq!(messages[2], ChatMessage::user("Cos'è la fascia rossa?"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::new(&EndpointsConfig::default().resolve(Endpoint::Assistant));
        let question = inbound("Quanta CO2?", vec![]);

        let first = builder.build(&carbonara(), &question);
        let second = builder.build(&carbonara(), &question);
        assert_eq!(first, second);
        assert_eq!(first.user_prompt.as_bytes(), second.user_prompt.as_bytes());
    }
}
