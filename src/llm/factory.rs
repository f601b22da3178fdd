//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use crate::config::ProviderSettings;
use crate::error::{QuillError, Result};
use crate::llm::{
    AnthropicClient, AnthropicConfig, GeminiClient, GeminiConfig, LlmClient, LlmProvider,
    MockLlmClient, OllamaClient, OllamaConfig, OpenAiClient, OpenAiConfig,
};

/// Returns the model used when neither config nor environment names one.
pub fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "gpt-4o",
        LlmProvider::Anthropic => "claude-sonnet-4-20250514",
        LlmProvider::Ollama => "llama3",
        LlmProvider::Groq => "llama-3.1-8b-instant",
        LlmProvider::Gemini => "gemini-1.5-flash",
        LlmProvider::Mock => "mock",
    }
}

/// Environment variables holding the API key, in lookup order.
fn api_key_vars(provider: LlmProvider) -> &'static [&'static str] {
    match provider {
        LlmProvider::OpenAi => &["OPENAI_API_KEY"],
        LlmProvider::Anthropic => &["ANTHROPIC_API_KEY"],
        LlmProvider::Groq => &["GROQ_API_KEY"],
        LlmProvider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        LlmProvider::Ollama | LlmProvider::Mock => &[],
    }
}

fn model_var(provider: LlmProvider) -> Option<&'static str> {
    match provider {
        LlmProvider::OpenAi => Some("OPENAI_MODEL"),
        LlmProvider::Anthropic => Some("ANTHROPIC_MODEL"),
        LlmProvider::Groq => Some("GROQ_MODEL"),
        LlmProvider::Gemini => Some("GEMINI_MODEL"),
        LlmProvider::Ollama => Some("OLLAMA_MODEL"),
        LlmProvider::Mock => None,
    }
}

fn resolve_api_key(provider: LlmProvider, settings: &ProviderSettings) -> Result<String> {
    let vars = api_key_vars(provider);
    settings
        .api_key
        .clone()
        .or_else(|| vars.iter().find_map(|var| std::env::var(var).ok()))
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            QuillError::llm(format!(
                "No API key configured for {provider}. Set {} or add api_key under [llm.providers.{provider}].",
                vars.join(" or ")
            ))
        })
}

fn resolve_model(provider: LlmProvider, settings: &ProviderSettings) -> String {
    settings
        .model
        .clone()
        .or_else(|| model_var(provider).and_then(|var| std::env::var(var).ok()))
        .unwrap_or_else(|| default_model(provider).to_string())
}

/// Creates an LLM client for the given provider.
///
/// Settings from the config file take precedence over environment
/// variables. Providers that require an API key fail when none resolves.
pub fn create_client(
    provider: LlmProvider,
    settings: &ProviderSettings,
) -> Result<Box<dyn LlmClient>> {
    let model = resolve_model(provider, settings);

    match provider {
        LlmProvider::OpenAi | LlmProvider::Groq => {
            let key = resolve_api_key(provider, settings)?;
            let mut config = if provider == LlmProvider::Groq {
                OpenAiConfig::groq(key, model)
            } else {
                OpenAiConfig::new(key, model)
            };
            if let Some(url) = &settings.base_url {
                config = config.with_url(url.clone());
            }
            if let Some(timeout) = settings.timeout_secs {
                config = config.with_timeout(timeout);
            }
            Ok(Box::new(OpenAiClient::new(config)?))
        }
        LlmProvider::Anthropic => {
            let key = resolve_api_key(provider, settings)?;
            let mut config = AnthropicConfig::new(key, model);
            if let Some(timeout) = settings.timeout_secs {
                config = config.with_timeout(timeout);
            }
            Ok(Box::new(AnthropicClient::new(config)?))
        }
        LlmProvider::Gemini => {
            let key = resolve_api_key(provider, settings)?;
            let mut config = GeminiConfig::new(key, model);
            if let Some(url) = &settings.base_url {
                config = config.with_url(url.clone());
            }
            if let Some(timeout) = settings.timeout_secs {
                config = config.with_timeout(timeout);
            }
            Ok(Box::new(GeminiClient::new(config)?))
        }
        LlmProvider::Ollama => {
            let mut config = OllamaConfig::new(model);
            if let Some(url) = settings
                .base_url
                .clone()
                .or_else(|| std::env::var("OLLAMA_URL").ok())
            {
                config = config.with_url(url);
            }
            if let Some(timeout) = settings.timeout_secs {
                config = config.with_timeout(timeout);
            }
            Ok(Box::new(OllamaClient::new(config)?))
        }
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}
