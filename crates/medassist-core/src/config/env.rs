use std::fmt::Display;
use std::str::FromStr;

use super::Config;

/// Read a numeric override. Unparsable values are logged and skipped.
fn parse_override<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let value = std::env::var(key).ok()?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(key, %value, error = %e, "ignoring invalid numeric override");
            None
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_models();
        self.apply_env_overrides_index();
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_gateway();
    }

    fn apply_env_overrides_models(&mut self) {
        if let Ok(v) = std::env::var("MEDASSIST_ASSISTANT_NAME") {
            self.assistant.name = v;
        }
        if let Ok(v) = std::env::var("MEDASSIST_HOSPITAL_NAME") {
            self.assistant.hospital_name = v;
        }
        if let Ok(v) = std::env::var("MEDASSIST_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid MEDASSIST_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("MEDASSIST_GEMINI_MODEL") {
            self.llm.gemini.model = v;
        }
        if let Ok(v) = std::env::var("MEDASSIST_GEMINI_EMBEDDING_MODEL") {
            self.llm.gemini.embedding_model = Some(v);
        }
        if let Ok(v) = std::env::var("MEDASSIST_OPENAI_BASE_URL") {
            self.llm.openai.base_url = v;
        }
        if let Ok(v) = std::env::var("MEDASSIST_OPENAI_MODEL") {
            self.llm.openai.model = v;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("MEDASSIST_INDEX_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.index.provider = kind;
            } else {
                tracing::warn!("ignoring invalid MEDASSIST_INDEX_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("MEDASSIST_INDEX_NAMESPACE") {
            self.index.namespace = v;
        }
        if let Ok(v) = std::env::var("MEDASSIST_PINECONE_HOST") {
            self.index.pinecone.host = v;
        }
        if let Ok(v) = std::env::var("MEDASSIST_QDRANT_URL") {
            self.index.qdrant.url = v;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(n) = parse_override("MEDASSIST_TOP_K") {
            self.pipeline.top_k = n;
        }
        if let Some(n) = parse_override("MEDASSIST_MAX_TOP_K") {
            self.pipeline.max_top_k = n;
        }
        if let Some(n) = parse_override("MEDASSIST_MAX_SUB_QUERIES") {
            self.pipeline.max_sub_queries = n;
        }
        if let Some(secs) = parse_override("MEDASSIST_TIMEOUT_CLASSIFY") {
            self.pipeline.classify_timeout_secs = secs;
        }
        if let Some(secs) = parse_override("MEDASSIST_TIMEOUT_SEARCH") {
            self.pipeline.search_timeout_secs = secs;
        }
        if let Some(secs) = parse_override("MEDASSIST_TIMEOUT_GENERATE") {
            self.pipeline.generate_timeout_secs = secs;
        }
    }

    fn apply_env_overrides_gateway(&mut self) {
        if let Ok(v) = std::env::var("MEDASSIST_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parse_override("MEDASSIST_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("MEDASSIST_GATEWAY_TOKEN") {
            self.gateway.auth_token = Some(v);
        }
        if let Some(rate) = parse_override("MEDASSIST_GATEWAY_RATE_LIMIT") {
            self.gateway.rate_limit = rate;
        }
    }
}
