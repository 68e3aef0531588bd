//! Pinecone integrated-inference text search.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::index::{BoxFuture, SearchHit, VectorIndex, page_from_json};

pub const DEFAULT_API_VERSION: &str = "2025-01";

/// Index backed by a Pinecone index with an integrated embedding model.
///
/// The query text is embedded server-side, so no local model is needed.
#[derive(Clone)]
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    api_version: String,
    text_field: String,
    page_field: String,
}

impl fmt::Debug for PineconeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeIndex")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("text_field", &self.text_field)
            .field("page_field", &self.page_field)
            .finish_non_exhaustive()
    }
}

impl PineconeIndex {
    /// `host` is the index data-plane host, with or without a scheme.
    #[must_use]
    pub fn new(host: &str, api_key: String) -> Self {
        let mut host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };
        while host.ends_with('/') {
            host.pop();
        }
        Self {
            client: medassist_llm::http::default_client(),
            host,
            api_key,
            api_version: DEFAULT_API_VERSION.to_owned(),
            text_field: "text".to_owned(),
            page_field: "page".to_owned(),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, text_field: impl Into<String>, page_field: impl Into<String>) -> Self {
        self.text_field = text_field.into();
        self.page_field = page_field.into();
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Search endpoint for `namespace`, with the namespace percent-encoded as one path segment.
    fn search_url(&self, namespace: &str) -> Result<reqwest::Url, IndexError> {
        if matches!(namespace.trim(), "" | "." | "..") {
            return Err(IndexError::InvalidNamespace(namespace.to_owned()));
        }
        let mut url = reqwest::Url::parse(&self.host)
            .map_err(|e| IndexError::Other(format!("invalid Pinecone host {}: {e}", self.host)))?;
        url.path_segments_mut()
            .map_err(|()| IndexError::Other(format!("Pinecone host {} cannot carry a path", self.host)))?
            .pop_if_empty()
            .extend(["records", "namespaces", namespace, "search"]);
        Ok(url)
    }

    async fn search_records(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let url = self.search_url(namespace)?;
        let body = SearchRequest {
            query: SearchQuery {
                inputs: SearchInputs { text: query },
                top_k,
            },
            fields: [self.text_field.as_str(), self.page_field.as_str()],
        };

        let response = self
            .client
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!(%status, namespace, body = %text, "Pinecone search error");
            return Err(IndexError::Status {
                backend: "pinecone",
                status: status.as_u16(),
            });
        }

        let resp: SearchResponse = serde_json::from_str(&text)?;
        let hits: Vec<SearchHit> = resp
            .result
            .hits
            .into_iter()
            .filter_map(|hit| self.to_search_hit(hit))
            .collect();
        tracing::debug!(namespace, hits = hits.len(), "Pinecone search complete");
        Ok(hits)
    }

    fn to_search_hit(&self, hit: PineconeHit) -> Option<SearchHit> {
        let text = hit
            .fields
            .get(&self.text_field)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())?
            .to_owned();
        let page = hit.fields.get(&self.page_field).and_then(page_from_json);
        Some(SearchHit {
            id: hit.id,
            score: hit.score,
            text,
            page,
        })
    }
}

impl VectorIndex for PineconeIndex {
    fn search(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, IndexError>> {
        let namespace = namespace.to_owned();
        let query = query.to_owned();
        Box::pin(async move { self.search_records(&namespace, &query, top_k).await })
    }

    fn name(&self) -> &'static str {
        "pinecone"
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: SearchQuery<'a>,
    fields: [&'a str; 2],
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    inputs: SearchInputs<'a>,
    top_k: usize,
}

#[derive(Serialize)]
struct SearchInputs<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<PineconeHit>,
}

#[derive(Deserialize)]
struct PineconeHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: f32,
    #[serde(default)]
    fields: HashMap<String, serde_json::Value>,
}
