use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::server::AppState;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(serde::Serialize)]
pub(crate) struct ErrorResponse {
    pub error: &'static str,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

const MAX_NAMESPACE_LEN: usize = 64;

fn valid_namespace(ns: &str) -> bool {
    ns.len() <= MAX_NAMESPACE_LEN
        && ns
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn bad_request(error: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}

pub(crate) async fn ask_handler(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Response {
    if req.query.trim().is_empty() {
        return bad_request("query must not be empty");
    }

    let namespace = req
        .namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .unwrap_or(&*state.default_namespace);
    if !valid_namespace(namespace) {
        tracing::debug!(namespace, "rejected namespace");
        return bad_request("invalid namespace");
    }

    let answer = state
        .orchestrator
        .answer(&req.query, namespace, req.top_k, None)
        .await;
    tracing::info!(
        namespace,
        context_used = answer.context_used.len(),
        "answered /v1/ask"
    );
    Json(answer).into_response()
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn ask_request_deserializes_camel_case() {
        let json = r#"{"query":"OPD timings?","namespace":"cardiology","topK":3}"#;
        let req: AskRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.query, "OPD timings?");
        assert_eq!(req.namespace.as_deref(), Some("cardiology"));
        assert_eq!(req.top_k, Some(3));
    }

    #[test]
    fn namespace_charset() {
        assert!(valid_namespace("hospital-docs"));
        assert!(valid_namespace("ward_3"));
        assert!(!valid_namespace("a/b"));
        assert!(!valid_namespace(".."));
        assert!(!valid_namespace("docs?x=1"));
        assert!(!valid_namespace("caf\u{e9}"));
        assert!(!valid_namespace(&"n".repeat(MAX_NAMESPACE_LEN + 1)));
    }

    #[test]
    fn ask_request_optional_fields() {
        let req: AskRequest = serde_json::from_str(r#"{"query":"hi"}"#).unwrap();
        assert!(req.namespace.is_none());
        assert!(req.top_k.is_none());
    }
}
