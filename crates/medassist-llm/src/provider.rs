use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{LazyLock, Mutex};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

pub type EmbedFuture = Pin<Box<dyn Future<Output = Result<Vec<f32>, LlmError>> + Send>>;

/// Type-erased embedding function, handed to consumers that only need vectors.
pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

static SCHEMA_CACHE: LazyLock<Mutex<HashMap<TypeId, serde_json::Value>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// JSON Schema for `T`, generated once per type.
///
/// # Errors
///
/// Returns `LlmError::StructuredParse` if the schema cannot be serialized.
pub fn cached_schema<T: JsonSchema + 'static>() -> Result<serde_json::Value, LlmError> {
    let key = TypeId::of::<T>();
    if let Ok(cache) = SCHEMA_CACHE.lock()
        && let Some(schema) = cache.get(&key)
    {
        return Ok(schema.clone());
    }
    let schema = schemars::schema_for!(T);
    let value =
        serde_json::to_value(&schema).map_err(|e| LlmError::StructuredParse(e.to_string()))?;
    if let Ok(mut cache) = SCHEMA_CACHE.lock() {
        cache.insert(key, value.clone());
    }
    Ok(value)
}

/// Extract the JSON object from a model reply, tolerating markdown code fences
/// and leading or trailing prose.
#[must_use]
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map_or(trimmed, str::trim);
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the model and return the assistant reply as plain text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Send messages with a JSON Schema output contract and return the raw JSON text.
    ///
    /// The text is not validated against the schema; callers decide how to
    /// treat malformed output.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or returns no content.
    fn chat_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Structured call deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::StructuredParse` when the reply does not match `T`,
    /// or any error from [`LlmProvider::chat_structured`].
    fn chat_typed<T>(&self, messages: &[Message]) -> impl Future<Output = Result<T, LlmError>> + Send
    where
        T: DeserializeOwned + JsonSchema + Send + 'static,
        Self: Sized,
    {
        async move {
            let schema = cached_schema::<T>()?;
            let raw = self.chat_structured(messages, &schema).await?;
            serde_json::from_str::<T>(extract_json(&raw))
                .map_err(|e| LlmError::StructuredParse(e.to_string()))
        }
    }

    /// Embed `text` into a dense vector.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::EmbedUnsupported` when the backend has no embedding model.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn supports_embeddings(&self) -> bool;

    fn name(&self) -> &'static str;
}
