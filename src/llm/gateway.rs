//! Model gateway with ordered provider fallback.
//!
//! A request is sent to each backend in chain order until one answers. A
//! failing backend is never retried within the same request.

use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{QuillError, Result};
use crate::llm::types::{with_system_prompt, Message};
use crate::llm::{create_client, LlmClient, LlmProvider};

/// One backend in the chain.
pub struct Backend {
    provider: LlmProvider,
    client: Box<dyn LlmClient>,
}

impl Backend {
    /// Wraps a client for the given provider.
    pub fn new(provider: LlmProvider, client: Box<dyn LlmClient>) -> Self {
        Self { provider, client }
    }
}

/// Unifies several LLM backends behind one `complete` call.
pub struct ModelGateway {
    backends: Vec<Backend>,
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("providers", &self.providers())
            .finish()
    }
}

/// Orders providers: primary, explicit fallbacks, then the default chain.
///
/// Duplicates are dropped. The mock provider only appears when it is primary.
pub fn resolve_chain(primary: LlmProvider, fallback: &[LlmProvider]) -> Vec<LlmProvider> {
    let mut chain = Vec::new();
    let candidates = std::iter::once(primary)
        .chain(fallback.iter().copied())
        .chain(LlmProvider::DEFAULT_CHAIN);

    for provider in candidates {
        if provider == LlmProvider::Mock && primary != LlmProvider::Mock {
            continue;
        }
        if !chain.contains(&provider) {
            chain.push(provider);
        }
    }
    chain
}

impl ModelGateway {
    /// Creates a gateway over already-built backends, in order.
    pub fn new(backends: Vec<Backend>) -> Self {
        Self { backends }
    }

    /// Creates a gateway with a single backend.
    pub fn single(provider: LlmProvider, client: Box<dyn LlmClient>) -> Self {
        Self::new(vec![Backend::new(provider, client)])
    }

    /// Builds every configured backend in chain order.
    ///
    /// Providers whose client cannot be built (typically a missing API key)
    /// are skipped. Fails when no backend remains.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut backends = Vec::new();

        for provider in resolve_chain(config.primary, &config.fallback) {
            match create_client(provider, &config.settings_for(provider)) {
                Ok(client) => backends.push(Backend::new(provider, client)),
                Err(e) => debug!("Skipping LLM backend {}: {}", provider, e),
            }
        }

        if backends.is_empty() {
            return Err(QuillError::config("No LLM backend is configured"));
        }

        let gateway = Self::new(backends);
        debug!("LLM backend chain: {:?}", gateway.providers());
        Ok(gateway)
    }

    /// Returns the providers in chain order.
    pub fn providers(&self) -> Vec<LlmProvider> {
        self.backends.iter().map(|b| b.provider).collect()
    }

    /// Sends the request to each backend in order until one succeeds.
    ///
    /// The system prompt, when given, is prepended as a system message.
    pub async fn complete(&self, messages: &[Message], system_prompt: Option<&str>) -> Result<String> {
        let messages = with_system_prompt(messages, system_prompt);
        let mut failures = Vec::new();

        for backend in &self.backends {
            match backend.client.complete(&messages).await {
                Ok(text) => {
                    info!("LLM request served by {}", backend.provider);
                    return Ok(text);
                }
                Err(e) => {
                    warn!("LLM backend {} failed: {}", backend.provider, e);
                    failures.push(format!("{}: {}", backend.provider, e));
                }
            }
        }

        if failures.is_empty() {
            return Err(QuillError::llm("No LLM backend is configured"));
        }

        Err(QuillError::llm(format!(
            "All LLM backends failed ({})",
            failures.join("; ")
        )))
    }
}
