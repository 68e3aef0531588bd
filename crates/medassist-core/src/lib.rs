//! Hospital-assistant RAG core: query classification, multi-query retrieval,
//! context-grounded answer generation, and the orchestrator that composes them.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod secret;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{
    AnswerGenerator, AssistantContent, ClassifiedQuery, ContextBundle, ContextRef, Intent,
    ProgressEvent, ProgressSink, QueryClassifier, RagAnswer, RagOrchestrator, Retriever,
};
