use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::AppState;
use crate::config::Endpoint;
use crate::demographics::submit as submit_demographics;
use crate::gateway::{GatewayResponse, PipelineError};

pub(super) async fn completion(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    run_gateway(&state, Endpoint::Completion, body).await
}

pub(super) async fn assistant(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    run_gateway(&state, Endpoint::Assistant, body).await
}

pub(super) async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    run_gateway(&state, Endpoint::Chat, body).await
}

async fn run_gateway(state: &AppState, endpoint: Endpoint, body: Bytes) -> Response {
    let gateway = state.gateway(endpoint);
    let span = info_span!(
        "gateway_request",
        request_id = %Uuid::new_v4(),
        endpoint = endpoint.name(),
        provider = gateway.provider_name(),
    );

    gateway.handle(&body).instrument(span).await.into_response()
}

pub(super) async fn demographics(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let span = info_span!("demographics_request", request_id = %Uuid::new_v4());

    submit_demographics(state.demographics.as_deref(), &body, state.debug)
        .instrument(span)
        .await
        .into_response()
}

/// Health check endpoint - returns JSON status
pub(super) async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Bare `OPTIONS` without CORS request headers
pub(super) async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub(super) async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}

/// Render a handler panic as the unhandled 500
pub(super) fn panic_response(err: Box<dyn Any + Send + 'static>, debug: bool) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(
        error_type = "unhandled",
        error_message = %message,
        "Handler panicked"
    );

    GatewayResponse::from_error(&PipelineError::Unhandled(message), debug).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_panic_response_hides_message() {
        let response = panic_response(Box::new("slice index out of range"), false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_panic_response_debug_detail() {
        let response = panic_response(Box::new(String::from("boom")), true);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Internal server error", "detail": "boom"})
        );
    }
}
