//! HTTP server: one gateway per endpoint behind a shared axum router
//!
//! Routes:
//! - `POST /completion`, `POST /api/assistant`, `POST /api/chat`
//! - `POST /api/demographics`
//! - `GET /health`

mod handlers;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, Endpoint, ProviderKind};
use crate::demographics::{DemographicsStore, PgDemographicsStore};
use crate::error::{GatewayError, Result};
use crate::gateway::{DataSource, Gateway, HttpDataSource};
use crate::providers::{CompletionProvider, build_provider};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub completion: Arc<Gateway>,
    pub assistant: Arc<Gateway>,
    pub chat: Arc<Gateway>,
    /// `None` when no database is configured
    pub demographics: Option<Arc<dyn DemographicsStore>>,
    pub debug: bool,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build the production state: shared HTTP client, the record service
    /// and one provider per provider kind in use.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Server(format!("Failed to create HTTP client: {e}")))?;

        let data_source: Arc<dyn DataSource> =
            Arc::new(HttpDataSource::new(client.clone(), &config.data_source)?);

        let demographics = PgDemographicsStore::from_config(&config.database)?
            .map(|store| Arc::new(store) as Arc<dyn DemographicsStore>);

        let mut providers: HashMap<ProviderKind, Arc<dyn CompletionProvider>> = HashMap::new();
        Self::assemble(
            config,
            data_source,
            |kind| {
                if let Some(provider) = providers.get(&kind) {
                    return Ok(provider.clone());
                }
                let provider = build_provider(kind, config, client.clone())?;
                providers.insert(kind, provider.clone());
                Ok(provider)
            },
            demographics,
        )
    }

    /// Wire the endpoint gateways from explicit collaborators
    pub fn assemble(
        config: &Config,
        data_source: Arc<dyn DataSource>,
        mut provider_for: impl FnMut(ProviderKind) -> Result<Arc<dyn CompletionProvider>>,
        demographics: Option<Arc<dyn DemographicsStore>>,
    ) -> Result<Self> {
        let debug = config.server.debug;

        let mut gateway = |endpoint: Endpoint| -> Result<Arc<Gateway>> {
            let settings = config.endpoints.resolve(endpoint);
            let provider = provider_for(settings.provider)?;
            tracing::info!(
                endpoint = endpoint.name(),
                route = endpoint.route(),
                provider = settings.provider.as_str(),
                model = %settings.model,
                require_data = settings.require_data,
                "Endpoint configured"
            );
            Ok(Arc::new(Gateway::new(
                endpoint,
                &settings,
                data_source.clone(),
                provider,
                debug,
            )))
        };

        Ok(Self {
            completion: gateway(Endpoint::Completion)?,
            assistant: gateway(Endpoint::Assistant)?,
            chat: gateway(Endpoint::Chat)?,
            demographics,
            debug,
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    pub fn gateway(&self, endpoint: Endpoint) -> &Gateway {
        match endpoint {
            Endpoint::Completion => &self.completion,
            Endpoint::Assistant => &self.assistant,
            Endpoint::Chat => &self.chat,
        }
    }
}

/// The gateway HTTP server
pub struct GatewayServer {
    config: Config,
}

impl GatewayServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the state, bind and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let state = Arc::new(AppState::from_config(&self.config)?);
        if state.demographics.is_none() {
            tracing::info!("No database configured; /api/demographics will answer 503");
        }

        let app = create_router(state);

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting gateway server on {addr}");
        tracing::info!("Record service: {}", self.config.data_source.base_url);
        if self.config.server.debug {
            tracing::warn!("Debug mode enabled: internal error detail is returned to clients");
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(format!("Server error: {e}")))?;

        tracing::info!("Gateway server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes and layers configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let debug = state.debug;
    let request_timeout = state.request_timeout;
    let max_body_bytes = state.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            Endpoint::Completion.route(),
            post(handlers::completion)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            Endpoint::Assistant.route(),
            post(handlers::assistant)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            Endpoint::Chat.route(),
            post(handlers::chat)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/demographics",
            post(handlers::demographics)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(
            move |err: Box<dyn Any + Send + 'static>| handlers::panic_response(err, debug),
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDemographicsStore, RecordingDataSource, ScriptedProvider};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn create_test_state(
        provider: Arc<ScriptedProvider>,
        store: Option<Arc<MemoryDemographicsStore>>,
    ) -> Arc<AppState> {
        let source = Arc::new(RecordingDataSource::returning(json!({"recipeName": "Pesto"})));
        let state = AppState::assemble(
            &Config::default(),
            source,
            |_| Ok(provider.clone() as Arc<dyn CompletionProvider>),
            store.map(|s| s as Arc<dyn DemographicsStore>),
        )
        .unwrap();
        Arc::new(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state(Arc::new(ScriptedProvider::answering("x")), None));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_assemble_resolves_provider_per_endpoint() {
        let mut kinds = Vec::new();
        let provider = Arc::new(ScriptedProvider::answering("x"));
        AppState::assemble(
            &Config::default(),
            Arc::new(RecordingDataSource::returning(json!({}))),
            |kind| {
                kinds.push(kind);
                Ok(provider.clone() as Arc<dyn CompletionProvider>)
            },
            None,
        )
        .unwrap();

        assert_eq!(
            kinds,
            vec![ProviderKind::OpenAi, ProviderKind::OpenAi, ProviderKind::Anthropic]
        );
    }

    #[tokio::test]
    async fn test_options_answers_empty_200() {
        let app = create_router(create_test_state(Arc::new(ScriptedProvider::answering("x")), None));

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/assistant")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_method_returns_405_json() {
        let app = create_router(create_test_state(Arc::new(ScriptedProvider::answering("x")), None));

        let response = app
            .oneshot(Request::builder().uri("/api/chat").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await, json!({"error": "Method not allowed"}));
    }

    #[tokio::test]
    async fn test_completion_route_answers() {
        let provider = Arc::new(ScriptedProvider::answering("Basilico fresco 🌿"));
        let app = create_router(create_test_state(provider.clone(), None));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/completion")
                    .header("content-type", "application/json")
                    .header("origin", "https://switch.example.org")
                    .body(Body::from(r#"{"question": "Che erbe servono?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "answer": "Basilico fresco 🌿"})
        );
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_demographics_route_saves() {
        let store = Arc::new(MemoryDemographicsStore::new());
        let app = create_router(create_test_state(
            Arc::new(ScriptedProvider::answering("x")),
            Some(store.clone()),
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/demographics")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"age": "41", "gender": "M", "profession": "Insegnante", "fruitsVegetables": "5+"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["id"], 1);
        assert_eq!(store.rows()[0].age, 41);
    }

    #[tokio::test]
    async fn test_body_limit_rejects_oversized_request() {
        let source = Arc::new(RecordingDataSource::returning(json!({})));
        let provider = Arc::new(ScriptedProvider::answering("x"));
        let mut config = Config::default();
        config.server.max_body_bytes = 64;
        let state = AppState::assemble(
            &config,
            source,
            |_| Ok(provider.clone() as Arc<dyn CompletionProvider>),
            None,
        )
        .unwrap();
        let app = create_router(Arc::new(state));

        let question = "x".repeat(200);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/completion")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"question": "{question}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(provider.call_count(), 0);
    }
}
