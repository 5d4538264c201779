//! Request gateway pipeline
//!
//! `VALIDATE -> RESOLVE -> BUILD_PROMPT -> DISPATCH -> NORMALIZE`, linear,
//! each stage short-circuiting to its own error outcome. Nothing is retried.

pub mod prompt;
pub mod prompts;
pub mod request;
pub mod resolver;
pub mod response;

pub use prompt::{CompletionRequest, PromptBuilder};
pub use request::{ChatMessage, DataRef, InboundRequest, Role, ValidationError, validate};
pub use resolver::{
    ContextSource, DataSource, HttpDataSource, ResolvedContext, UpstreamFetchError, resolve,
};
pub use response::{ErrorBody, GatewayResponse};

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::{Endpoint, EndpointSettings};
use crate::providers::{CompletionError, CompletionProvider};

/// Failure of any pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    UpstreamFetch(#[from] UpstreamFetchError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// Catch-all for failures outside the pipeline's own error classes
    #[error("unhandled error: {0}")]
    Unhandled(String),
}

impl PipelineError {
    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::UpstreamFetch(_) => "upstream_fetch",
            PipelineError::Completion(_) => "completion",
            PipelineError::Unhandled(_) => "unhandled",
        }
    }
}

/// One endpoint's pipeline: static mode, prompt settings and provider
pub struct Gateway {
    endpoint: Endpoint,
    require_data: bool,
    prompts: PromptBuilder,
    data_source: Arc<dyn DataSource>,
    provider: Arc<dyn CompletionProvider>,
    debug: bool,
}

impl Gateway {
    pub fn new(
        endpoint: Endpoint,
        settings: &EndpointSettings,
        data_source: Arc<dyn DataSource>,
        provider: Arc<dyn CompletionProvider>,
        debug: bool,
    ) -> Self {
        Self {
            endpoint,
            require_data: settings.require_data,
            prompts: PromptBuilder::new(settings),
            data_source,
            provider,
            debug,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Validate, resolve and build the completion request without dispatching it
    pub async fn prepare(&self, body: &[u8]) -> Result<CompletionRequest, PipelineError> {
        let inbound = validate(body, self.require_data)?;
        let context = resolve(&inbound, self.data_source.as_ref()).await?;
        debug!(
            source = ?context.source,
            history_len = inbound.history.len(),
            "Context resolved"
        );
        Ok(self.prompts.build(&context, &inbound))
    }

    /// Run the whole pipeline up to the extracted answer
    pub async fn answer(&self, body: &[u8]) -> Result<String, PipelineError> {
        let completion = self.prepare(body).await?;
        let answer = self.provider.complete(&completion).await?;
        Ok(answer)
    }

    /// Run the pipeline and normalize the outcome
    pub async fn handle(&self, body: &[u8]) -> GatewayResponse {
        match self.answer(body).await {
            Ok(answer) => {
                debug!(
                    endpoint = self.endpoint.name(),
                    provider = self.provider.name(),
                    answer_len = answer.len(),
                    "Answer generated"
                );
                GatewayResponse::success(answer)
            }
            Err(e) => {
                match &e {
                    PipelineError::Validation(_) => warn!(
                        error_type = e.category(),
                        endpoint = self.endpoint.name(),
                        error_message = %e,
                        "Rejected request"
                    ),
                    _ => error!(
                        error_type = e.category(),
                        endpoint = self.endpoint.name(),
                        error_message = %e,
                        "Request failed"
                    ),
                }
                GatewayResponse::from_error(&e, self.debug)
            }
        }
    }
}
