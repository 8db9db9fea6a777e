#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools
)]

//! # Live Quiz Server
//!
//! The server-side coordination core of a live, multi-participant quiz
//! service. A teacher creates a game for a quiz, learners join with a short
//! room code, and the server runs the per-question round loop: collecting
//! answers under a time limit, scoring them, maintaining a live leaderboard,
//! enforcing anti-cheat policies, and persisting results to a document store.

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Document-store persistence gateway
pub mod store;

/// Main server orchestration: sessions, lobbies, rounds
pub mod server;

/// WebSocket connection handling
pub mod websocket;
