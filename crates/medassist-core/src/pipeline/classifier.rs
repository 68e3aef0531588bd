use std::sync::{Arc, LazyLock};
use std::time::Duration;

use medassist_llm::{LlmProvider, Message};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;

use super::prompts;
use super::types::{ClassifiedQuery, Intent};

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(hi+|hello+|hey+|hiya|greetings|salam\w*|salaam\w*|as+alam\w*|as-salam\w*|namaste|namaskar|good\s+(morning|afternoon|evening))\b",
    )
    .expect("greeting regex is valid")
});

static IDENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(who\s+are\s+you|what\s+are\s+you|what\s+can\s+you\s+do|your\s+name|who\s+(made|built|created)\s+you|introduce\s+yourself)\b",
    )
    .expect("identity regex is valid")
});

static AND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\band\b").expect("conjunction regex is valid"));

/// Structured reply requested from the model.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct Classification {
    intent: Intent,
    refined_query: String,
    #[serde(rename = "needsRAG")]
    needs_rag: bool,
    #[serde(default)]
    sub_queries: Option<Vec<String>>,
}

pub struct QueryClassifier<P: LlmProvider> {
    provider: Arc<P>,
    timeout: Duration,
    hospital_name: String,
}

impl<P: LlmProvider> QueryClassifier<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            hospital_name: "the hospital".into(),
        }
    }

    #[must_use]
    pub fn with_hospital_name(mut self, name: impl Into<String>) -> Self {
        self.hospital_name = name.into();
        self
    }

    /// Classify a query. Model failures, timeouts, and malformed replies fall
    /// back to [`fallback_classify`]; this never fails.
    pub async fn classify(&self, query: &str) -> ClassifiedQuery {
        let query = query.trim();
        let messages = [
            Message::system(prompts::classifier_system(&self.hospital_name)),
            Message::user(query),
        ];

        let reply = tokio::time::timeout(
            self.timeout,
            self.provider.chat_typed::<Classification>(&messages),
        )
        .await;

        match reply {
            Ok(Ok(c)) => {
                let classified = ClassifiedQuery {
                    intent: c.intent,
                    refined_query: c.refined_query,
                    needs_rag: c.needs_rag,
                    sub_queries: c.sub_queries.unwrap_or_default(),
                }
                .normalized(query);
                tracing::debug!(
                    intent = %classified.intent,
                    needs_rag = classified.needs_rag,
                    sub_queries = classified.sub_queries.len(),
                    "query classified"
                );
                classified
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "classification failed, using pattern fallback");
                fallback_classify(query)
            }
            Err(_) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "classification timed out, using pattern fallback"
                );
                fallback_classify(query)
            }
        }
    }
}

/// Deterministic classification used when the model is unavailable.
///
/// Input with no letters or digits is `Unclear` without retrieval.
#[must_use]
pub fn fallback_classify(query: &str) -> ClassifiedQuery {
    let query = query.trim();
    let (intent, needs_rag) = if GREETING_RE.is_match(query) {
        (Intent::Greeting, false)
    } else if IDENTITY_RE.is_match(query) {
        (Intent::Identity, false)
    } else if !query.chars().any(char::is_alphanumeric) {
        (Intent::Unclear, false)
    } else if AND_RE.is_match(query) || query.matches('?').count() > 1 {
        (Intent::ComplexQuery, true)
    } else {
        (Intent::HospitalInfo, true)
    };

    ClassifiedQuery {
        intent,
        refined_query: query.to_owned(),
        needs_rag,
        sub_queries: if intent == Intent::ComplexQuery {
            vec![query.to_owned()]
        } else {
            Vec::new()
        },
    }
    .normalized(query)
}
