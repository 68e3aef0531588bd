use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use medassist_index::{SearchHit, VectorIndex};

use super::types::ContextBundle;

/// Fans sub-queries out to the vector index and merges the results.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    search_timeout: Duration,
    context_multiplier: usize,
    max_sub_queries: usize,
}

impl Retriever {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, search_timeout: Duration) -> Self {
        Self {
            index,
            search_timeout,
            context_multiplier: 2,
            max_sub_queries: 5,
        }
    }

    #[must_use]
    pub fn with_context_multiplier(mut self, multiplier: usize) -> Self {
        self.context_multiplier = multiplier.max(1);
        self
    }

    #[must_use]
    pub fn with_max_sub_queries(mut self, max: usize) -> Self {
        self.max_sub_queries = max.max(1);
        self
    }

    /// Search every non-blank sub-query concurrently and merge the hits.
    ///
    /// The bundle holds at most `top_k * context_multiplier` hits. Failed or
    /// timed-out searches contribute nothing.
    pub async fn retrieve(&self, namespace: &str, sub_queries: &[String], top_k: usize) -> ContextBundle {
        let queries: Vec<&str> = sub_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .take(self.max_sub_queries)
            .collect();
        if queries.is_empty() {
            return ContextBundle::default();
        }
        if sub_queries.len() > queries.len() {
            tracing::debug!(
                requested = sub_queries.len(),
                issued = queries.len(),
                "dropped blank or excess sub-queries"
            );
        }

        let batches = join_all(
            queries
                .iter()
                .map(|query| self.search_one(namespace, query, top_k)),
        )
        .await;

        let cap = top_k.saturating_mul(self.context_multiplier);
        let bundle = ContextBundle::merge(batches, cap);
        tracing::debug!(
            namespace,
            index = self.index.name(),
            queries = queries.len(),
            hits = bundle.len(),
            "retrieval complete"
        );
        bundle
    }

    async fn search_one(&self, namespace: &str, query: &str, top_k: usize) -> Vec<SearchHit> {
        match tokio::time::timeout(self.search_timeout, self.index.search(namespace, query, top_k)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!(namespace, query, error = %e, "vector search failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(namespace, query, "vector search timed out");
                Vec::new()
            }
        }
    }
}
