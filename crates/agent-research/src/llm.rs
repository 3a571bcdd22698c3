//! Thin text-in, text-out wrapper over an [`LLMProvider`]

use crate::config::{LlmSettings, ResearchConfig};
use crate::error::Result;
use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
use agent_llm::{CompletionRequest, LLMError, LLMProvider};
use std::sync::Arc;
use tracing::debug;

/// Shared handle used by every node that prompts the model
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl LlmClient {
    /// Wrap a provider
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: LlmSettings::default().max_tokens,
            temperature: None,
        }
    }

    /// Set the completion length cap
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the OpenAI-compatible client described by the configuration
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let settings = &config.llm;
        let provider = OpenAIProvider::with_config(
            OpenAIConfig::new(settings.api_key.clone().unwrap_or_default())
                .with_api_base(settings.api_base.clone())
                .with_timeout(config.request_timeout.as_secs()),
        )?;

        Ok(Self::new(Arc::new(provider), settings.model.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature))
    }

    /// Model name requests are sent to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single-turn prompt and return the trimmed reply
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let mut builder = CompletionRequest::builder(self.model.clone())
            .add_message(agent_llm::Message::user(prompt))
            .max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        let response = self.provider.complete(builder.build()).await?;
        let text = response.text().ok_or(LLMError::EmptyResponse)?;
        debug!(provider = self.provider.name(), chars = text.len(), "llm reply");
        Ok(text.to_string())
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResearchError;
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_generate_returns_reply() {
        let llm = ScriptedLlm::new("fallback").reply("revenue", "Revenue grew 20%");
        let client = llm.client();

        let text = client.generate("What happened to revenue?").await.unwrap();
        assert_eq!(text, "Revenue grew 20%");
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_reply_is_an_error() {
        let llm = ScriptedLlm::new("   ");
        let err = llm.client().generate("anything").await.unwrap_err();
        assert!(matches!(err, ResearchError::Llm(LLMError::EmptyResponse)));
    }

    #[test]
    fn test_from_config_without_key_builds() {
        let client = LlmClient::from_config(&ResearchConfig::default()).unwrap();
        assert_eq!(client.model(), "gemini-1.5-pro");
    }
}
