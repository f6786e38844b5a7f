//! Axum http server factory.

use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::gateway::Gateway;
use crate::graphql;

/// Builds the router serving GraphQL on `path`, and the health check on `/health`.
pub fn make_router(gateway: Gateway, path: &str) -> Router {
    Router::new()
        .route(path, post(handle_post))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn handle_post(
    State(gateway): State<Gateway>,
    Json(request): Json<graphql::Request>,
) -> Json<graphql::Response> {
    let span = tracing::info_span!(
        "graphql_request",
        operation_name = request.operation_name.as_deref().unwrap_or_default()
    );
    Json(gateway.execute(request).instrument(span).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}
