//! Response normalization: pipeline outcome -> HTTP status and JSON body

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::gateway::PipelineError;
use crate::gateway::resolver::UpstreamFetchError;
use crate::providers::CompletionError;

/// JSON body of every non-success gateway response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    /// Internal error text, only populated in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            reason: None,
            upstream_url: None,
            detail: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

/// Terminal outcome of one gateway request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    Success { answer: String },
    Error { status: StatusCode, body: ErrorBody },
}

#[derive(Serialize)]
struct SuccessBody<'a> {
    success: bool,
    answer: &'a str,
}

impl GatewayResponse {
    pub fn success(answer: impl Into<String>) -> Self {
        GatewayResponse::Success {
            answer: answer.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayResponse::Success { .. } => StatusCode::OK,
            GatewayResponse::Error { status, .. } => *status,
        }
    }

    /// Map a pipeline failure to its status and body
    ///
    /// Internal error text only reaches the client when `debug` is set.
    pub fn from_error(error: &PipelineError, debug: bool) -> Self {
        let (status, body) = match error {
            PipelineError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(e.summary()).with_details(e.to_string()),
            ),
            PipelineError::UpstreamFetch(e) => (StatusCode::BAD_GATEWAY, upstream_body(e)),
            PipelineError::Completion(e) => (StatusCode::INTERNAL_SERVER_ERROR, completion_body(e)),
            PipelineError::Unhandled(message) => {
                let mut body = ErrorBody::new("Internal server error");
                if debug {
                    body.detail = Some(message.clone());
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };

        GatewayResponse::Error { status, body }
    }
}

fn upstream_body(error: &UpstreamFetchError) -> ErrorBody {
    match error {
        UpstreamFetchError::Status { url, .. } => {
            let mut body = ErrorBody::new("Impossibile recuperare la ricetta")
                .with_details(error.to_string());
            body.upstream_url = Some(url.clone());
            body
        }
        UpstreamFetchError::Parse(_) => ErrorBody::new("Recipe data is not valid JSON"),
        UpstreamFetchError::Transport(_) | UpstreamFetchError::InvalidUrl(_) => {
            ErrorBody::new("Impossibile recuperare la ricetta")
        }
    }
}

fn completion_body(error: &CompletionError) -> ErrorBody {
    let summary = match error {
        CompletionError::EmptyAnswer => "No answer generated",
        CompletionError::Http { .. } | CompletionError::Transport(_) => {
            "Assistant service unavailable"
        }
    };
    ErrorBody::new(summary).with_reason(error.reason())
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            GatewayResponse::Success { answer } => (
                StatusCode::OK,
                Json(SuccessBody {
                    success: true,
                    answer: &answer,
                }),
            )
                .into_response(),
            GatewayResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}
