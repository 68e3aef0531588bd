/// Failures that abort a pipeline run.
///
/// These never reach callers of [`crate::RagOrchestrator::answer`]; they are
/// turned into the fallback answer and an `error` progress event.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("pipeline stage panicked: {0}")]
    Panicked(String),
}
