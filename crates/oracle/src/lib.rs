//! The decision oracle: the component that, given the conversation so far
//! and the operation catalogue, decides what happens next.
//!
//! The dispatch loop only sees the [`Oracle`] trait, so tests can drive it
//! with a scripted oracle and production wires in an OpenAI-compatible chat
//! completions backend.

pub mod openai;

use async_trait::async_trait;
use serde_json::Value;

use webpilot_core::config::AgentConfig;
use webpilot_core::{ChatMessage, Error, OracleResponse, Result};

pub use openai::OpenAiOracle;

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Produce the next decision: a terminal answer (no tool calls) or one
    /// or more requested operations.
    async fn decide(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<OracleResponse>;
}

/// Build the production oracle from configuration.
pub fn create_oracle(config: &AgentConfig, api_key: &str) -> Result<Box<dyn Oracle>> {
    if api_key.is_empty() {
        return Err(Error::Config(
            "No API key configured. Set agent.apiKey in the config file or the OPENAI_API_KEY environment variable.".to_string(),
        ));
    }
    Ok(Box::new(OpenAiOracle::new(
        api_key,
        config.api_base.as_deref(),
        &config.model,
        config.max_tokens,
        config.temperature,
    )))
}
