use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};

use super::connection::handle_socket;
use crate::metrics::MetricsSnapshot;
use crate::server::QuizServer;

/// Create the axum router with the WebSocket endpoint and the small HTTP
/// surface around it.
pub fn create_router(cors_origins: &str) -> Router<Arc<QuizServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// WebSocket upgrade handler for the quiz protocol.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<QuizServer>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, server, addr))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler(State(server): State<Arc<QuizServer>>) -> Json<MetricsSnapshot> {
    Json(server.metrics().snapshot())
}
