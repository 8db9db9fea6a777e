// WebSocket layer: axum routes and per-connection socket handling

pub mod connection;
pub mod routes;

pub use routes::create_router;
