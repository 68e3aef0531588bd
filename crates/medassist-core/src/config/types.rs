use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_hospital_name")]
    pub hospital_name: String,
}

fn default_assistant_name() -> String {
    "MedAssist".into()
}

fn default_hospital_name() -> String {
    "the hospital".into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            hospital_name: default_hospital_name(),
        }
    }
}

/// Generative model backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Backends tried in order after `provider` fails.
    #[serde(default)]
    pub fallback: Vec<ProviderKind>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}

fn default_max_output_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            fallback: Vec::new(),
            max_output_tokens: default_max_output_tokens(),
            gemini: GeminiConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            embedding_model: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            embedding_model: None,
        }
    }
}

/// Vector index backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Pinecone,
    Qdrant,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: IndexKind,
    /// Namespace used when a caller does not name one.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
}

fn default_index_provider() -> IndexKind {
    IndexKind::Pinecone
}

fn default_namespace() -> String {
    "hospital-docs".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            namespace: default_namespace(),
            pinecone: PineconeConfig::default(),
            qdrant: QdrantConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PineconeConfig {
    /// Index host, e.g. `my-index-abc123.svc.us-east-1.pinecone.io`.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub text_field: Option<String>,
    #[serde(default)]
    pub page_field: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub collection_prefix: String,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Ceiling for a caller-supplied `top_k`.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_context_multiplier")]
    pub context_multiplier: usize,
    #[serde(default = "default_max_sub_queries")]
    pub max_sub_queries: usize,
    #[serde(default = "default_classify_timeout")]
    pub classify_timeout_secs: u64,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    50
}

fn default_context_multiplier() -> usize {
    2
}

fn default_max_sub_queries() -> usize {
    5
}

fn default_classify_timeout() -> u64 {
    8
}

fn default_search_timeout() -> u64 {
    10
}

fn default_generate_timeout() -> u64 {
    15
}

fn default_max_suggestions() -> usize {
    6
}

fn default_max_snippet_chars() -> usize {
    2000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            context_multiplier: default_context_multiplier(),
            max_sub_queries: default_max_sub_queries(),
            classify_timeout_secs: default_classify_timeout(),
            search_timeout_secs: default_search_timeout(),
            generate_timeout_secs: default_generate_timeout(),
            max_suggestions: default_max_suggestions(),
            max_snippet_chars: default_max_snippet_chars(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }

    #[must_use]
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    #[must_use]
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    /// Requests per minute per client IP; 0 disables limiting.
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8090
}

fn default_gateway_rate_limit() -> u32 {
    60
}

fn default_gateway_max_body() -> usize {
    65_536
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            auth_token: None,
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

/// API keys resolved from the environment at startup.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub gemini_api_key: Option<Secret>,
    pub openai_api_key: Option<Secret>,
    pub pinecone_api_key: Option<Secret>,
    pub qdrant_api_key: Option<Secret>,
}
