use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::guard::{BearerAuth, RateLimiter, limit_rate, require_token};
use crate::handlers::{ask_handler, health_handler};
use crate::server::AppState;

/// `/health` is always open; `/v1/ask` sits behind the body limit, token check
/// and rate limiter, applied outermost first in that order.
pub(crate) fn build_router(
    state: AppState,
    auth_token: Option<&str>,
    rate_limit: u32,
    max_body_size: usize,
) -> Router {
    let ask = Router::new()
        .route("/v1/ask", post(ask_handler))
        .route_layer(middleware::from_fn_with_state(
            RateLimiter::new(rate_limit),
            limit_rate,
        ))
        .route_layer(middleware::from_fn_with_state(
            BearerAuth::new(auth_token),
            require_token,
        ))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/health", get(health_handler))
        .merge(ask)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
