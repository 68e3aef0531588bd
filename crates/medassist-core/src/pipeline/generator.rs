use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use medassist_llm::provider::{cached_schema, extract_json};
use medassist_llm::{LlmProvider, Message};

use super::progress::{ProgressEvent, ProgressSink, notify};
use super::prompts;
use super::types::AssistantContent;

const COMPONENT: &str = "generator";

/// Produces the final answer from the user's query and retrieved context.
pub struct AnswerGenerator<P: LlmProvider> {
    provider: Arc<P>,
    timeout: Duration,
    max_suggestions: usize,
    assistant_name: String,
    hospital_name: String,
}

impl<P: LlmProvider> AnswerGenerator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            max_suggestions: 6,
            assistant_name: "MedAssist".into(),
            hospital_name: "the hospital".into(),
        }
    }

    #[must_use]
    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    #[must_use]
    pub fn with_names(mut self, assistant: impl Into<String>, hospital: impl Into<String>) -> Self {
        self.assistant_name = assistant.into();
        self.hospital_name = hospital.into();
        self
    }

    /// Answer `query` grounded in `context`; an empty context selects the
    /// "not found" prompt. Never fails.
    pub async fn generate(&self, query: &str, context: &str) -> AssistantContent {
        self.generate_with_progress(query, context, None).await
    }

    /// Like [`AnswerGenerator::generate`], reporting degraded paths as
    /// `warning` progress events.
    pub async fn generate_with_progress(
        &self,
        query: &str,
        context: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> AssistantContent {
        let instruction = if context.trim().is_empty() {
            prompts::answer_without_context(query)
        } else {
            prompts::answer_with_context(query, context)
        };
        let messages = [
            Message::system(prompts::answer_system(&self.assistant_name, &self.hospital_name)),
            Message::user(instruction),
        ];

        let schema = match cached_schema::<AssistantContent>() {
            Ok(schema) => schema,
            Err(e) => return fallback(progress, &e.to_string()),
        };

        match tokio::time::timeout(self.timeout, self.provider.chat_structured(&messages, &schema)).await {
            Ok(Ok(raw)) => self.parse_reply(&raw, progress),
            Ok(Err(e)) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "answer generation failed");
                fallback(progress, &e.to_string())
            }
            Err(_) => {
                tracing::warn!(provider = self.provider.name(), "answer generation timed out");
                fallback(progress, "answer generation timed out")
            }
        }
    }

    fn parse_reply(&self, raw: &str, progress: Option<&dyn ProgressSink>) -> AssistantContent {
        match serde_json::from_str::<AssistantContent>(extract_json(raw)) {
            Ok(content) if !content.answer.trim().is_empty() => AssistantContent {
                answer: content.answer.trim().to_owned(),
                suggestions: clean_suggestions(content.suggestions, self.max_suggestions),
            },
            Ok(_) => {
                tracing::warn!("model returned an empty answer");
                fallback(progress, "empty answer")
            }
            Err(e) => {
                let text = raw.trim();
                if text.is_empty() {
                    return fallback(progress, "empty reply");
                }
                tracing::warn!(error = %e, "answer was not valid JSON, using raw text");
                notify(
                    progress,
                    ProgressEvent::Warning {
                        component: COMPONENT,
                        message: format!("unstructured answer: {e}"),
                    },
                );
                AssistantContent {
                    answer: text.to_owned(),
                    suggestions: Vec::new(),
                }
            }
        }
    }
}

fn fallback(progress: Option<&dyn ProgressSink>, reason: &str) -> AssistantContent {
    notify(
        progress,
        ProgressEvent::Warning {
            component: COMPONENT,
            message: reason.to_owned(),
        },
    );
    AssistantContent {
        answer: prompts::GENERATION_FALLBACK_ANSWER.to_owned(),
        suggestions: Vec::new(),
    }
}

/// Trim, drop blanks and case-insensitive duplicates, keep at most `max`.
fn clean_suggestions(suggestions: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(max)
        .collect()
}
