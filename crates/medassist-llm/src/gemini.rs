use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MAX_RETRIES: u32 = 2;
const MAX_SCHEMA_DEPTH: usize = 16;

/// Google Gemini backend using the `generateContent` REST API.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    max_output_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String, model: String, max_output_tokens: u32) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model,
            embedding_model: None,
            max_output_tokens,
            temperature: 0.2,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn send_generate(
        &self,
        messages: &[Message],
        schema: Option<serde_json::Value>,
    ) -> Result<String, LlmError> {
        let (system, contents) = split_messages(messages);
        let structured = schema.is_some();
        let body = GenerateRequest {
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: structured.then_some("application/json"),
                response_schema: schema,
            },
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = send_with_retry("gemini", MAX_RETRIES, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!(%status, body = %text, "Gemini API error");
            return Err(LlmError::Api {
                provider: "gemini",
                status: status.as_u16(),
            });
        }

        let resp: GenerateResponse = serde_json::from_str(&text)?;
        tracing::debug!(model = %self.model, structured, "Gemini response received");
        extract_text(resp)
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.send_generate(messages, None).await
    }

    async fn chat_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> Result<String, LlmError> {
        self.send_generate(messages, Some(gemini_schema(schema)))
            .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "gemini" })?;

        let body = EmbedRequest {
            model: format!("models/{model}"),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };
        let url = format!("{}/v1beta/models/{model}:embedContent", self.base_url);

        let response = send_with_retry("gemini", MAX_RETRIES, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!(%status, body = %text, "Gemini embedding API error");
            return Err(LlmError::Api {
                provider: "gemini",
                status: status.as_u16(),
            });
        }

        let resp: EmbedResponse = serde_json::from_str(&text)?;
        if resp.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "gemini" });
        }
        Ok(resp.embedding.values)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

fn split_messages(messages: &[Message]) -> (Option<&str>, Vec<Content<'_>>) {
    let mut system: Option<&str> = None;
    let mut contents = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            // Gemini accepts a single system instruction; later ones win.
            Role::System => system = Some(msg.content.as_str()),
            Role::User => contents.push(Content {
                role: Some("user"),
                parts: vec![Part { text: &msg.content }],
            }),
            Role::Assistant => contents.push(Content {
                role: Some("model"),
                parts: vec![Part { text: &msg.content }],
            }),
        }
    }
    (system, contents)
}

fn extract_text(resp: GenerateResponse) -> Result<String, LlmError> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Blocked {
            provider: "gemini",
            reason,
        });
    }
    Err(LlmError::EmptyResponse { provider: "gemini" })
}

/// Convert a JSON Schema document into the OpenAPI subset accepted by
/// `generationConfig.responseSchema`.
///
/// `$ref`s are inlined from `$defs`/`definitions`, nullable unions become
/// `nullable: true`, and keywords Gemini rejects are dropped.
#[must_use]
pub fn gemini_schema(schema: &serde_json::Value) -> serde_json::Value {
    let defs = schema
        .get("$defs")
        .or_else(|| schema.get("definitions"))
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    convert_schema_node(schema, &defs, 0)
}

fn convert_schema_node(
    node: &serde_json::Value,
    defs: &serde_json::Value,
    depth: usize,
) -> serde_json::Value {
    use serde_json::{Map, Value};

    let Value::Object(obj) = node else {
        return node.clone();
    };
    if depth > MAX_SCHEMA_DEPTH {
        return serde_json::json!({ "type": "string" });
    }

    if let Some(Value::String(reference)) = obj.get("$ref") {
        let name = reference.rsplit('/').next().unwrap_or_default();
        return match defs.get(name) {
            Some(target) => convert_schema_node(target, defs, depth + 1),
            None => serde_json::json!({ "type": "string" }),
        };
    }

    // Option<T> where T is a referenced type: anyOf [T, {"type": "null"}].
    if let Some(Value::Array(variants)) = obj.get("anyOf").or_else(|| obj.get("oneOf")) {
        let non_null: Vec<&Value> = variants
            .iter()
            .filter(|v| v.get("type").and_then(Value::as_str) != Some("null"))
            .collect();
        if non_null.len() == 1 && non_null.len() < variants.len() {
            let mut inner = convert_schema_node(non_null[0], defs, depth + 1);
            if let Value::Object(ref mut m) = inner {
                m.insert("nullable".into(), Value::Bool(true));
            }
            return inner;
        }
        if non_null.iter().all(|v| v.get("const").is_some()) {
            let values: Vec<Value> = non_null.iter().filter_map(|v| v.get("const").cloned()).collect();
            return serde_json::json!({ "type": "string", "enum": values });
        }
    }

    let mut out = Map::new();
    for (key, value) in obj {
        match key.as_str() {
            "type" => match value {
                Value::Array(types) => {
                    let concrete: Vec<&Value> =
                        types.iter().filter(|t| t.as_str() != Some("null")).collect();
                    if let Some(first) = concrete.first() {
                        out.insert("type".into(), (*first).clone());
                    }
                    if concrete.len() < types.len() {
                        out.insert("nullable".into(), Value::Bool(true));
                    }
                }
                other => {
                    out.insert("type".into(), other.clone());
                }
            },
            "properties" => {
                if let Value::Object(props) = value {
                    let converted: Map<String, Value> = props
                        .iter()
                        .map(|(name, prop)| (name.clone(), convert_schema_node(prop, defs, depth + 1)))
                        .collect();
                    out.insert("properties".into(), Value::Object(converted));
                }
            }
            "items" => {
                out.insert("items".into(), convert_schema_node(value, defs, depth + 1));
            }
            "anyOf" | "oneOf" => {
                if let Value::Array(variants) = value {
                    let converted: Vec<Value> = variants
                        .iter()
                        .map(|v| convert_schema_node(v, defs, depth + 1))
                        .collect();
                    out.insert("anyOf".into(), Value::Array(converted));
                }
            }
            "const" => {
                out.insert("enum".into(), Value::Array(vec![value.clone()]));
            }
            "description" | "enum" | "required" | "nullable" | "minItems" | "maxItems"
            | "minimum" | "maximum" => {
                out.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    Value::Object(out)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key".into(), "gemini-2.0-flash".into(), 512)
            .with_base_url(server.uri())
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn chat_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("OPD opens at 9")))
            .mount(&server)
            .await;

        let reply = provider(&server)
            .chat(&[Message::user("When does OPD open?")])
            .await
            .unwrap();
        assert_eq!(reply, "OPD opens at 9");
    }

    #[tokio::test]
    async fn chat_sends_system_instruction_separately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "be brief" }] },
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("hi")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .chat(&[Message::system("be brief"), Message::user("hello")])
            .await
            .unwrap();
        assert_eq!(reply, "hi");
    }

    #[tokio::test]
    async fn chat_structured_requests_json_mime_type_and_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": { "type": "object" }
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(candidate_body(r#"{"answer":"ok"}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "Answer",
            "type": "object",
            "properties": { "answer": { "type": "string" } },
            "required": ["answer"]
        });
        let raw = provider(&server)
            .chat_structured(&[Message::user("q")], &schema)
            .await
            .unwrap();
        assert_eq!(raw, r#"{"answer":"ok"}"#);
    }

    #[tokio::test]
    async fn chat_http_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::Api {
                provider: "gemini",
                status: 503
            }
        ));
    }

    #[tokio::test]
    async fn chat_blocked_prompt_reports_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Blocked { ref reason, .. } if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn chat_empty_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { provider: "gemini" }));
    }

    #[tokio::test]
    async fn embed_returns_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:embedContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
            )
            .mount(&server)
            .await;

        let p = provider(&server).with_embedding_model("text-embedding-004");
        assert!(p.supports_embeddings());
        let v = p.embed("cardiology").await.unwrap();
        assert_eq!(v.len(), 3);
    }

    #[tokio::test]
    async fn embed_without_model_is_unsupported() {
        let p = GeminiProvider::new("k".into(), "m".into(), 10);
        assert!(!p.supports_embeddings());
        let err = p.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = GeminiProvider::new("super-secret".into(), "m".into(), 10);
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slashes_trimmed() {
        let p = GeminiProvider::new("k".into(), "m".into(), 10)
            .with_base_url("http://localhost:8080//".into());
        assert_eq!(p.base_url, "http://localhost:8080");
    }

    #[test]
    fn split_messages_maps_assistant_to_model() {
        let msgs = vec![
            Message::system("sys"),
            Message::user("u"),
            Message {
                role: Role::Assistant,
                content: "a".into(),
            },
        ];
        let (system, contents) = split_messages(&msgs);
        assert_eq!(system, Some("sys"));
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1].role, Some("model"));
    }

    #[test]
    fn gemini_schema_drops_unsupported_keywords() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "Out",
            "type": "object",
            "additionalProperties": false,
            "properties": { "a": { "type": "string", "format": "uuid" } },
            "required": ["a"]
        });
        let converted = gemini_schema(&schema);
        assert!(converted.get("$schema").is_none());
        assert!(converted.get("title").is_none());
        assert!(converted.get("additionalProperties").is_none());
        assert!(converted["properties"]["a"].get("format").is_none());
        assert_eq!(converted["required"], json!(["a"]));
    }

    #[test]
    fn gemini_schema_maps_nullable_type_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {
                "items": { "type": ["array", "null"], "items": { "type": "string" } }
            }
        });
        let converted = gemini_schema(&schema);
        let items = &converted["properties"]["items"];
        assert_eq!(items["type"], "array");
        assert_eq!(items["nullable"], true);
        assert_eq!(items["items"]["type"], "string");
    }

    #[test]
    fn gemini_schema_inlines_refs() {
        let schema = json!({
            "type": "object",
            "properties": { "intent": { "$ref": "#/$defs/Intent" } },
            "$defs": { "Intent": { "type": "string", "enum": ["greeting", "identity"] } }
        });
        let converted = gemini_schema(&schema);
        assert!(converted.get("$defs").is_none());
        assert_eq!(converted["properties"]["intent"]["enum"], json!(["greeting", "identity"]));
    }

    #[test]
    fn gemini_schema_collapses_optional_ref() {
        let schema = json!({
            "type": "object",
            "properties": {
                "page": { "anyOf": [{ "$ref": "#/$defs/Page" }, { "type": "null" }] }
            },
            "$defs": { "Page": { "type": "integer" } }
        });
        let converted = gemini_schema(&schema);
        assert_eq!(converted["properties"]["page"]["type"], "integer");
        assert_eq!(converted["properties"]["page"]["nullable"], true);
    }

    #[test]
    fn gemini_schema_turns_const_variants_into_enum() {
        let schema = json!({
            "oneOf": [{ "const": "a", "type": "string" }, { "const": "b", "type": "string" }]
        });
        let converted = gemini_schema(&schema);
        assert_eq!(converted["enum"], json!(["a", "b"]));
    }
}
