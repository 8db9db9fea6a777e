//! Persistence gateway: a narrow interface to the external document store.
//!
//! The store itself is an external collaborator; the core only depends on
//! the [`GameStore`] trait. The in-memory backend in [`memory`] is the only
//! in-tree implementation and backs development and tests.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreBackend, StoreSettings};
use crate::protocol::{GameMode, LeaderboardEntry, Quiz, StudentResult, UserProfile};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document not found")]
    Missing,
}

/// Fields of a new `games/{game_id}` document.
#[derive(Debug, Clone, Copy)]
pub struct NewGame<'a> {
    pub host_id: &'a str,
    pub group_id: Option<&'a str>,
    pub code: &'a str,
    pub mode: GameMode,
    pub quiz_id: &'a str,
}

/// Document-store operations the round engine depends on.
///
/// `fetch_user`, `fetch_quiz`, `create_game` and `code_in_use` gate game
/// setup and propagate their failures to the caller. The remaining writes
/// happen mid-game or at game boundaries; their failures are logged by the
/// call sites and never alter in-memory state.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Fetch a user profile, `None` when the user does not exist.
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Fetch a quiz with its questions resolved from the top-level
    /// `questions` collection.
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, StoreError>;

    /// Create a game record and return its id.
    async fn create_game(&self, game: NewGame<'_>) -> Result<String, StoreError>;

    /// Whether any game record already carries this room code.
    async fn code_in_use(&self, code: &str) -> Result<bool, StoreError>;

    /// Add a player id to the game's `players` array (set semantics).
    async fn append_player(&self, game_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Mark a game finished and attach the final leaderboard.
    async fn finalize_game(
        &self,
        game_id: &str,
        leaderboard: &[LeaderboardEntry],
        mode: GameMode,
    ) -> Result<(), StoreError>;

    /// Write one student's result subdocument.
    async fn write_result(
        &self,
        game_id: &str,
        user_id: &str,
        result: &StudentResult,
    ) -> Result<(), StoreError>;

    /// Delete a game record and everything under its `results` subcollection.
    async fn delete_game(&self, game_id: &str) -> Result<(), StoreError>;
}

/// Build the configured store backend.
pub fn create_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn GameStore>> {
    match settings.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
