//! Inbound request validation
//!
//! Turns a raw JSON body into an [`InboundRequest`]. The field names of the
//! earlier serverless handlers (`recipeId`, `recipeJson`, `messages`) and the
//! chat widget's `recipe` attachment are accepted alongside the canonical ones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Reasons an inbound request is rejected with 400
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("`{canonical}` and `{alias}` name the same field; send only one")]
    ConflictingFields {
        canonical: &'static str,
        alias: &'static str,
    },

    #[error("question is required and must not be empty")]
    MissingQuestion,

    #[error("question must be a string")]
    QuestionNotString,

    #[error("a dataRef or inlineData is required")]
    MissingData,

    #[error("invalid dataRef: {0}")]
    InvalidDataRef(String),

    #[error("inlineData must be a JSON object")]
    InvalidInlineData,

    #[error("invalid history: {0}")]
    InvalidHistory(String),
}

impl ValidationError {
    /// Short client-facing summary used as the `error` field
    pub fn summary(&self) -> &'static str {
        match self {
            ValidationError::MalformedBody(_) => "Invalid request body",
            ValidationError::MissingQuestion
            | ValidationError::QuestionNotString
            | ValidationError::MissingData => "Missing question or recipe data",
            ValidationError::ConflictingFields { .. }
            | ValidationError::InvalidDataRef(_)
            | ValidationError::InvalidInlineData
            | ValidationError::InvalidHistory(_) => "Invalid request",
        }
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A normalized record reference
///
/// One segment is a bare id, more than one is a compound `tenant/id` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRef {
    segments: Vec<String>,
}

impl DataRef {
    /// Trim whitespace and surrounding `/`, then split into path segments
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidDataRef(
                "identifier is empty".to_string(),
            ));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" => {
                    return Err(ValidationError::InvalidDataRef(
                        "identifier contains an empty path segment".to_string(),
                    ));
                }
                "." | ".." => {
                    return Err(ValidationError::InvalidDataRef(format!(
                        "identifier contains a relative segment '{segment}'"
                    )));
                }
                s => segments.push(s.to_string()),
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_compound(&self) -> bool {
        self.segments.len() > 1
    }
}

impl fmt::Display for DataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A validated request, immutable once produced
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// Trimmed, non-empty question
    pub question: String,
    pub data_ref: Option<DataRef>,
    pub inline_data: Option<Map<String, Value>>,
    /// Prior turns, oldest first
    pub history: Vec<ChatMessage>,
}

/// Canonical field names and the legacy names deserialized into them
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("dataRef", &["recipeId"]),
    ("inlineData", &["recipeJson", "recipe"]),
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    #[serde(default)]
    question: Option<Value>,
    #[serde(default, alias = "recipeId")]
    data_ref: Option<Value>,
    #[serde(default, alias = "recipeJson", alias = "recipe")]
    inline_data: Option<Value>,
    #[serde(default)]
    history: Option<Value>,
    #[serde(default)]
    messages: Option<Value>,
}

/// Validate a raw body for an endpoint that may or may not require data
pub fn validate(body: &[u8], require_data: bool) -> Result<InboundRequest, ValidationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(ValidationError::MalformedBody(
            "expected a JSON object".to_string(),
        ));
    };
    check_aliases(object)?;
    let raw: RawRequest = serde_json::from_value(value)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    let (question, history) = match (raw.question, raw.messages) {
        (Some(question), _) => {
            let history = match raw.history {
                Some(history) => parse_messages(history)?,
                None => Vec::new(),
            };
            (parse_question(question)?, history)
        }
        (None, Some(messages)) => split_messages(messages)?,
        (None, None) => return Err(ValidationError::MissingQuestion),
    };

    let data_ref = raw
        .data_ref
        .map(|value| match value {
            Value::String(s) => DataRef::parse(&s),
            _ => Err(ValidationError::InvalidDataRef(
                "must be a string".to_string(),
            )),
        })
        .transpose()?;

    let inline_data = raw
        .inline_data
        .map(|value| match value {
            Value::Object(map) => Ok(map),
            _ => Err(ValidationError::InvalidInlineData),
        })
        .transpose()?;

    if require_data && data_ref.is_none() && inline_data.is_none() {
        return Err(ValidationError::MissingData);
    }

    Ok(InboundRequest {
        question,
        data_ref,
        inline_data,
        history,
    })
}

/// Reject bodies naming one field twice under different names
fn check_aliases(object: &Map<String, Value>) -> Result<(), ValidationError> {
    for (canonical, aliases) in FIELD_ALIASES {
        let mut present = std::iter::once(*canonical)
            .chain(aliases.iter().copied())
            .filter(|name| object.contains_key(*name));
        if let (Some(canonical), Some(alias)) = (present.next(), present.next()) {
            return Err(ValidationError::ConflictingFields { canonical, alias });
        }
    }
    Ok(())
}

fn parse_question(value: Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(ValidationError::MissingQuestion)
            } else {
                Ok(trimmed.to_string())
            }
        }
        Value::Null => Err(ValidationError::MissingQuestion),
        _ => Err(ValidationError::QuestionNotString),
    }
}

fn parse_messages(value: Value) -> Result<Vec<ChatMessage>, ValidationError> {
    if !value.is_array() {
        return Err(ValidationError::InvalidHistory(
            "expected an array of messages".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| ValidationError::InvalidHistory(e.to_string()))
}

/// Last message is the question, earlier ones are the history
fn split_messages(value: Value) -> Result<(String, Vec<ChatMessage>), ValidationError> {
    let mut messages = parse_messages(value)?;
    match messages.pop() {
        Some(last) if last.role == Role::User => {
            let question = parse_question(Value::String(last.content))?;
            Ok((question, messages))
        }
        Some(_) => Err(ValidationError::InvalidHistory(
            "last message must come from the user".to_string(),
        )),
        None => Err(ValidationError::MissingQuestion),
    }
}
