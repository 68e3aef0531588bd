//! Qdrant-backed index: the query is embedded through the model client and
//! searched against a collection named after the namespace.

use std::fmt;

use medassist_llm::EmbedFn;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{ScoredPoint, SearchPointsBuilder};

use crate::error::IndexError;
use crate::index::{BoxFuture, SearchHit, VectorIndex, page_from_json};

pub struct QdrantIndex {
    client: Qdrant,
    embed: EmbedFn,
    collection_prefix: String,
}

impl fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection_prefix", &self.collection_prefix)
            .finish_non_exhaustive()
    }
}

impl QdrantIndex {
    /// Connect to Qdrant at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, api_key: Option<String>, embed: EmbedFn) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(Box::new)?;
        Ok(Self {
            client,
            embed,
            collection_prefix: String::new(),
        })
    }

    /// Prefix prepended to every namespace to form the collection name.
    #[must_use]
    pub fn with_collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.collection_prefix = prefix.into();
        self
    }

    fn collection_for(&self, namespace: &str) -> String {
        format!("{}{namespace}", self.collection_prefix)
    }

    async fn search_collection(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let vector = (self.embed)(query).await?;
        let collection = self.collection_for(namespace);
        let limit = u64::try_from(top_k).unwrap_or(u64::MAX);

        let results = self
            .client
            .search_points(SearchPointsBuilder::new(&collection, vector, limit).with_payload(true))
            .await
            .map_err(Box::new)?;

        let hits: Vec<SearchHit> = results
            .result
            .into_iter()
            .filter_map(scored_point_to_hit)
            .collect();
        tracing::debug!(collection, hits = hits.len(), "Qdrant search complete");
        Ok(hits)
    }
}

impl VectorIndex for QdrantIndex {
    fn search(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, IndexError>> {
        let namespace = namespace.to_owned();
        let query = query.to_owned();
        Box::pin(async move { self.search_collection(&namespace, &query, top_k).await })
    }

    fn name(&self) -> &'static str {
        "qdrant"
    }
}

fn payload_to_json(value: qdrant_client::qdrant::Value) -> Option<serde_json::Value> {
    Some(match value.kind? {
        Kind::StringValue(s) => serde_json::Value::String(s),
        Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
        Kind::DoubleValue(d) => serde_json::Number::from_f64(d).map(serde_json::Value::Number)?,
        Kind::BoolValue(b) => serde_json::Value::Bool(b),
        _ => return None,
    })
}

fn scored_point_to_hit(point: ScoredPoint) -> Option<SearchHit> {
    let mut payload = point.payload;
    let text = payload
        .remove("text")
        .and_then(payload_to_json)
        .and_then(|v| v.as_str().map(str::to_owned))
        .filter(|t| !t.trim().is_empty())?;
    let page = payload
        .remove("page")
        .and_then(payload_to_json)
        .as_ref()
        .and_then(page_from_json);

    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => return None,
    };

    Some(SearchHit {
        id,
        score: point.score,
        text,
        page,
    })
}
