//! Test-only scripted vector index.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::IndexError;
use crate::index::{BoxFuture, SearchHit, VectorIndex};

/// Recorded `search` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub namespace: String,
    pub query: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockIndex {
    hits: Arc<Mutex<HashMap<String, Vec<SearchHit>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<SearchCall>>>,
    /// Hits returned for queries without a scripted entry.
    pub default_hits: Vec<SearchHit>,
    /// Fail every search regardless of query.
    pub fail_all: bool,
    /// Milliseconds to sleep before answering.
    pub delay_ms: u64,
}

impl MockIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hits(self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.lock().unwrap().insert(query.to_owned(), hits);
        self
    }

    #[must_use]
    pub fn with_default_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.default_hits = hits;
        self
    }

    #[must_use]
    pub fn failing_for(self, query: &str) -> Self {
        self.failing.lock().unwrap().insert(query.to_owned());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl VectorIndex for MockIndex {
    fn search(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, IndexError>> {
        self.calls.lock().unwrap().push(SearchCall {
            namespace: namespace.to_owned(),
            query: query.to_owned(),
            top_k,
        });
        let query = query.to_owned();
        Box::pin(async move {
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_all || self.failing.lock().unwrap().contains(&query) {
                return Err(IndexError::Connection("mock index unavailable".into()));
            }
            let hits = self
                .hits
                .lock()
                .unwrap()
                .get(&query)
                .cloned()
                .unwrap_or_else(|| self.default_hits.clone());
            Ok(hits.into_iter().take(top_k).collect())
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
