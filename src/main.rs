#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use live_quiz_server::config;
use live_quiz_server::logging;
use live_quiz_server::server::QuizServer;
use live_quiz_server::store;
use live_quiz_server::websocket;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults < config.json < QUIZ__* env overrides < HOST/PORT.
    let cfg = config::load();

    logging::init_with_config(&cfg.logging);

    let host: IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid HOST value '{}'", cfg.host))?;
    let addr = SocketAddr::from((host, cfg.port));

    let store = store::create_store(&cfg.store)?;
    let server = QuizServer::new(cfg.server.clone(), store);

    let app = websocket::create_router(&cfg.server.cors_origins).with_state(server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        "Server started - WebSocket endpoint: /ws, health: /health, metrics: /metrics"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
