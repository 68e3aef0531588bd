use std::sync::Arc;
use std::time::Duration;

use medassist_core::{AnswerGenerator, QueryClassifier, RagOrchestrator, Retriever};
use medassist_index::mock::MockIndex;
use medassist_llm::any::AnyProvider;
use medassist_llm::mock::MockProvider;
use medassist_llm::router::RouterProvider;

use crate::server::SharedOrchestrator;

/// Orchestrator over a scripted model and `index`.
pub(crate) fn test_orchestrator(responses: Vec<String>, index: &MockIndex) -> SharedOrchestrator {
    let provider = Arc::new(RouterProvider::new(vec![AnyProvider::Mock(
        MockProvider::with_responses(responses),
    )]));
    Arc::new(RagOrchestrator::new(
        QueryClassifier::new(Arc::clone(&provider), Duration::from_secs(8)),
        Retriever::new(Arc::new(index.clone()), Duration::from_secs(10)),
        AnswerGenerator::new(provider, Duration::from_secs(15)),
    ))
}
