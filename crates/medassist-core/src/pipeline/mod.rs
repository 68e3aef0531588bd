//! The query pipeline: classify, retrieve, generate.

pub mod classifier;
pub mod context;
pub mod generator;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod retriever;
pub mod types;

pub use classifier::{QueryClassifier, fallback_classify};
pub use context::format_context;
pub use generator::AnswerGenerator;
pub use orchestrator::RagOrchestrator;
pub use progress::{FnSink, ProgressEvent, ProgressSink};
pub use retriever::Retriever;
pub use types::{AssistantContent, ClassifiedQuery, ContextBundle, ContextRef, Intent, RagAnswer};
