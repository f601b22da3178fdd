//! Request refinement: rewrites loose phrasing into canonical database terms.

use std::sync::Arc;

use crate::error::Result;
use crate::llm::prompt::REFINE_SYSTEM_PROMPT;
use crate::llm::{Message, ModelGateway};

const REFINED_LABEL: &str = "refined request:";

/// Rewrites raw user requests before validation and generation.
#[derive(Debug, Clone)]
pub struct QueryRefiner {
    gateway: Arc<ModelGateway>,
}

impl QueryRefiner {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Returns the refined request.
    ///
    /// A failing model call is returned as an error. An empty answer keeps
    /// the raw request.
    pub async fn refine(&self, raw: &str) -> Result<String> {
        let response = self
            .gateway
            .complete(&[Message::user(raw)], Some(REFINE_SYSTEM_PROMPT))
            .await?;

        Ok(clean_refinement(&response).unwrap_or_else(|| raw.trim().to_string()))
    }
}

/// Strips labels and wrapping quotes from a refinement answer.
pub fn clean_refinement(response: &str) -> Option<String> {
    let mut text = response.trim();

    if text
        .get(..REFINED_LABEL.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(REFINED_LABEL))
    {
        text = text[REFINED_LABEL.len()..].trim();
    }

    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].trim();
            break;
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
