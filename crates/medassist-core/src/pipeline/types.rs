use std::collections::HashSet;

use medassist_index::SearchHit;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What the user is trying to do with a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Identity,
    HospitalInfo,
    ComplexQuery,
    Unclear,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Identity => "identity",
            Self::HospitalInfo => "hospital_info",
            Self::ComplexQuery => "complex_query",
            Self::Unclear => "unclear",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one query.
///
/// Values produced by [`ClassifiedQuery::normalized`] uphold:
/// - `needs_rag == false` implies `sub_queries` is empty;
/// - `intent == ComplexQuery` implies at least one sub-query and `needs_rag == true`;
/// - `Greeting` and `Identity` never need retrieval;
/// - `refined_query` is never blank for a non-blank input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedQuery {
    pub intent: Intent,
    pub refined_query: String,
    #[serde(rename = "needsRAG")]
    pub needs_rag: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_queries: Vec<String>,
}

impl ClassifiedQuery {
    /// Enforce the structural invariants, using `original` when the refined
    /// query came back empty.
    #[must_use]
    pub fn normalized(mut self, original: &str) -> Self {
        let refined = self.refined_query.trim();
        self.refined_query = if refined.is_empty() {
            original.trim().to_owned()
        } else {
            refined.to_owned()
        };

        match self.intent {
            Intent::Greeting | Intent::Identity => self.needs_rag = false,
            Intent::ComplexQuery => self.needs_rag = true,
            Intent::HospitalInfo | Intent::Unclear => {}
        }

        if !self.needs_rag || self.intent != Intent::ComplexQuery {
            self.sub_queries.clear();
            return self;
        }

        let mut seen = HashSet::new();
        self.sub_queries = self
            .sub_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
            .map(str::to_owned)
            .collect();
        if self.sub_queries.is_empty() {
            self.sub_queries.push(self.refined_query.clone());
        }
        self
    }

    /// Texts to search the index with. Empty when no retrieval is needed.
    #[must_use]
    pub fn search_queries(&self) -> Vec<String> {
        if !self.needs_rag {
            Vec::new()
        } else if self.sub_queries.is_empty() {
            vec![self.refined_query.clone()]
        } else {
            self.sub_queries.clone()
        }
    }

    /// Whether the orchestrator answers with canned content and skips both
    /// retrieval and generation.
    #[must_use]
    pub fn is_canned(&self) -> bool {
        match self.intent {
            Intent::Greeting | Intent::Identity => true,
            Intent::Unclear => !self.needs_rag,
            Intent::HospitalInfo | Intent::ComplexQuery => false,
        }
    }
}

/// Merged, de-duplicated, score-ordered hits for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle(Vec<SearchHit>);

impl ContextBundle {
    /// Merge per-query hit lists.
    ///
    /// Hits with blank text are dropped. Batches are consumed in order and the
    /// first remaining hit seen for an id wins.
    /// The result is stably sorted by score descending (NaN scores last) and
    /// cut to `cap` entries.
    #[must_use]
    pub fn merge(batches: impl IntoIterator<Item = Vec<SearchHit>>, cap: usize) -> Self {
        let mut seen = HashSet::new();
        let mut merged: Vec<SearchHit> = batches
            .into_iter()
            .flatten()
            .filter(|hit| !hit.text.trim().is_empty())
            .filter(|hit| seen.insert(hit.id.clone()))
            .collect();
        merged.sort_by(|a, b| sort_key(b.score).total_cmp(&sort_key(a.score)));
        merged.truncate(cap);
        Self(merged)
    }

    #[must_use]
    pub fn hits(&self) -> &[SearchHit] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_refs(&self) -> Vec<ContextRef> {
        self.0.iter().map(ContextRef::from).collect()
    }
}

fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// The user-facing reply: an answer and follow-up questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AssistantContent {
    /// Answer text shown to the user.
    pub answer: String,
    /// Follow-up questions the user may ask next.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl AssistantContent {
    #[must_use]
    pub fn new(answer: impl Into<String>, suggestions: &[&str]) -> Self {
        Self {
            answer: answer.into(),
            suggestions: suggestions.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Provenance of one snippet used to build the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRef {
    pub id: String,
    pub score: f32,
    pub page: Option<u32>,
}

impl From<&SearchHit> for ContextRef {
    fn from(hit: &SearchHit) -> Self {
        Self {
            id: hit.id.clone(),
            score: hit.score,
            page: hit.page,
        }
    }
}

/// What the orchestrator hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagAnswer {
    pub assistant_content: AssistantContent,
    pub context_used: Vec<ContextRef>,
}

impl RagAnswer {
    #[must_use]
    pub fn without_context(assistant_content: AssistantContent) -> Self {
        Self {
            assistant_content,
            context_used: Vec::new(),
        }
    }

    #[must_use]
    pub fn used_retrieval(&self) -> bool {
        !self.context_used.is_empty()
    }
}
