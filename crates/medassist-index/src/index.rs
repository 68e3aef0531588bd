use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One scored snippet returned by a vector search.
///
/// `score` is backend-defined: higher means more relevant, no fixed bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub page: Option<u32>,
}

impl SearchHit {
    #[must_use]
    pub fn new(id: impl Into<String>, score: f32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            text: text.into(),
            page: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Read-only semantic search scoped to a namespace.
///
/// Implementations hold pooled connections and must be safe to share across
/// concurrent pipeline invocations.
pub trait VectorIndex: Send + Sync {
    fn search(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, IndexError>>;

    fn name(&self) -> &'static str;
}

/// Read a page number out of a loosely typed payload value.
///
/// Ingestion writes pages as integers, floats, or numeric strings depending
/// on the loader, so all three are accepted.
pub(crate) fn page_from_json(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let v = f as u64;
                        v
                    })
            })
            .and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
