use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use medassist_index::VectorIndex;
use medassist_llm::LlmProvider;

use super::classifier::QueryClassifier;
use super::context::format_context;
use super::generator::AnswerGenerator;
use super::progress::{ProgressEvent, ProgressSink, notify};
use super::prompts::{self, CannedReplies};
use super::retriever::Retriever;
use super::types::{AssistantContent, ContextBundle, Intent, RagAnswer};
use crate::config::Config;
use crate::error::PipelineError;

/// Composes classification, retrieval, and generation into one call.
///
/// Holds no per-invocation state; share it behind an `Arc` and call
/// [`RagOrchestrator::answer`] concurrently.
pub struct RagOrchestrator<P: LlmProvider> {
    classifier: QueryClassifier<P>,
    retriever: Retriever,
    generator: AnswerGenerator<P>,
    canned: CannedReplies,
    default_top_k: usize,
    max_top_k: usize,
    max_snippet_chars: usize,
}

impl<P: LlmProvider> RagOrchestrator<P> {
    #[must_use]
    pub fn new(classifier: QueryClassifier<P>, retriever: Retriever, generator: AnswerGenerator<P>) -> Self {
        Self {
            classifier,
            retriever,
            generator,
            canned: CannedReplies::new("MedAssist", "the hospital"),
            default_top_k: 5,
            max_top_k: 50,
            max_snippet_chars: 2000,
        }
    }

    /// Wire every stage from configuration, sharing one model client.
    #[must_use]
    pub fn from_config(provider: Arc<P>, index: Arc<dyn VectorIndex>, config: &Config) -> Self {
        let pipeline = &config.pipeline;
        let assistant = &config.assistant;

        let classifier = QueryClassifier::new(Arc::clone(&provider), pipeline.classify_timeout())
            .with_hospital_name(&assistant.hospital_name);
        let retriever = Retriever::new(index, pipeline.search_timeout())
            .with_context_multiplier(pipeline.context_multiplier)
            .with_max_sub_queries(pipeline.max_sub_queries);
        let generator = AnswerGenerator::new(provider, pipeline.generate_timeout())
            .with_max_suggestions(pipeline.max_suggestions)
            .with_names(&assistant.name, &assistant.hospital_name);

        Self::new(classifier, retriever, generator)
            .with_canned_replies(CannedReplies::new(&assistant.name, &assistant.hospital_name))
            .with_max_top_k(pipeline.max_top_k)
            .with_default_top_k(pipeline.top_k)
            .with_max_snippet_chars(pipeline.max_snippet_chars)
    }

    #[must_use]
    pub fn with_canned_replies(mut self, canned: CannedReplies) -> Self {
        self.canned = canned;
        self
    }

    #[must_use]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    /// Upper bound on hits requested per sub-query, whatever the caller asks for.
    #[must_use]
    pub fn with_max_top_k(mut self, max: usize) -> Self {
        self.max_top_k = max.max(1);
        self
    }

    #[must_use]
    pub fn with_max_snippet_chars(mut self, max: usize) -> Self {
        self.max_snippet_chars = max;
        self
    }

    /// Answer one user query.
    ///
    /// Never fails: an empty query or a panic in any stage yields an `error`
    /// progress event and the generic "having trouble" reply. `top_k` of
    /// `None` uses the configured default; the value is clamped to
    /// `1..=max_top_k`.
    pub async fn answer(
        &self,
        query: &str,
        namespace: &str,
        top_k: Option<usize>,
        progress: Option<&dyn ProgressSink>,
    ) -> RagAnswer {
        let outcome = AssertUnwindSafe(self.run(query, namespace, top_k, progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Panicked(panic_message(panic.as_ref()))));

        match outcome {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(namespace, error = %e, "pipeline failed, returning fallback answer");
                notify(progress, ProgressEvent::Error { message: e.to_string() });
                RagAnswer::without_context(prompts::trouble_content())
            }
        }
    }

    async fn run(
        &self,
        query: &str,
        namespace: &str,
        top_k: Option<usize>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RagAnswer, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        let top_k = top_k
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k);

        let classified = self.classifier.classify(query).await;
        notify(progress, ProgressEvent::Classifying { intent: classified.intent });

        if classified.is_canned() {
            tracing::debug!(intent = %classified.intent, "answering with canned reply");
            notify(progress, ProgressEvent::Complete { used_retrieval: false });
            return Ok(RagAnswer::without_context(self.canned_for(classified.intent)));
        }

        let bundle = if classified.needs_rag {
            let queries = classified.search_queries();
            notify(
                progress,
                ProgressEvent::Searching {
                    multi_query: classified.intent == Intent::ComplexQuery,
                    queries: queries.clone(),
                },
            );
            self.retriever.retrieve(namespace, &queries, top_k).await
        } else {
            ContextBundle::default()
        };

        notify(progress, ProgressEvent::Generating { context_hits: bundle.len() });
        let context = format_context(&bundle, self.max_snippet_chars);
        let assistant_content = self
            .generator
            .generate_with_progress(query, &context, progress)
            .await;

        let answer = RagAnswer {
            assistant_content,
            context_used: bundle.to_refs(),
        };
        tracing::debug!(
            namespace,
            intent = %classified.intent,
            context_used = answer.context_used.len(),
            "query answered"
        );
        notify(
            progress,
            ProgressEvent::Complete {
                used_retrieval: answer.used_retrieval(),
            },
        );
        Ok(answer)
    }

    fn canned_for(&self, intent: Intent) -> AssistantContent {
        match intent {
            Intent::Greeting => self.canned.greeting.clone(),
            Intent::Identity => self.canned.identity.clone(),
            _ => self.canned.unclear.clone(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
