use crate::any::AnyProvider;
use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Ordered fallback chain: each call goes to the first provider that succeeds.
#[derive(Debug, Clone)]
pub struct RouterProvider {
    providers: Vec<AnyProvider>,
}

impl RouterProvider {
    #[must_use]
    pub fn new(providers: Vec<AnyProvider>) -> Self {
        Self { providers }
    }

    #[must_use]
    pub fn providers(&self) -> &[AnyProvider] {
        &self.providers
    }
}

impl LlmProvider for RouterProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        for p in &self.providers {
            match p.chat(messages).await {
                Ok(r) => return Ok(r),
                Err(e) => {
                    tracing::warn!(provider = p.name(), error = %e, "router fallback");
                }
            }
        }
        Err(LlmError::NoProviders)
    }

    async fn chat_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> Result<String, LlmError> {
        for p in &self.providers {
            match p.chat_structured(messages, schema).await {
                Ok(r) => return Ok(r),
                Err(e) => {
                    tracing::warn!(provider = p.name(), error = %e, "router structured fallback");
                }
            }
        }
        Err(LlmError::NoProviders)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        for p in &self.providers {
            if !p.supports_embeddings() {
                continue;
            }
            match p.embed(text).await {
                Ok(r) => return Ok(r),
                Err(e) => {
                    tracing::warn!(provider = p.name(), error = %e, "router embed fallback");
                }
            }
        }
        Err(LlmError::NoProviders)
    }

    fn supports_embeddings(&self) -> bool {
        self.providers.iter().any(LlmProvider::supports_embeddings)
    }

    fn name(&self) -> &'static str {
        "router"
    }
}
