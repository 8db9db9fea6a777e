use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ServerTuning;
use crate::metrics::ServerMetrics;
use crate::protocol::{codes, OutboundFrame, ServerMessage, SessionId};
use crate::store::{GameStore, StoreError};

mod lobby;
mod message_router;
mod results;
mod rounds;
mod session_manager;


pub use lobby::{Lobby, LobbyError};

use session_manager::SessionManager;

#[derive(Debug, Error)]
pub enum CodeAllocationError {
    #[error("no unique room code after {attempts} attempts")]
    Exhausted { attempts: usize },
    #[error(transparent)]
    Store(StoreError),
}

/// Root server object: owns the session registry, the code-to-lobby
/// registry, and the persistence gateway. One instance per process.
pub struct QuizServer {
    store: Arc<dyn GameStore>,
    sessions: SessionManager,
    lobbies: DashMap<String, Arc<Lobby>>,
    metrics: Arc<ServerMetrics>,
    tuning: ServerTuning,
}

impl QuizServer {
    pub fn new(tuning: ServerTuning, store: Arc<dyn GameStore>) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        Arc::new(Self {
            store,
            sessions: SessionManager::new(metrics.clone()),
            lobbies: DashMap::new(),
            metrics,
            tuning,
        })
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    pub fn tuning(&self) -> &ServerTuning {
        &self.tuning
    }

    /// Register a new connection and greet it. The returned id keys every
    /// subsequent event from this socket.
    pub fn register_session(&self, sender: mpsc::Sender<Arc<OutboundFrame>>) -> SessionId {
        let session_id = self.sessions.register(sender);
        self.sessions.send(
            &session_id,
            ServerMessage::Welcome {
                message: "Welcome! Authenticate first.".to_string(),
            }
            .into(),
        );
        session_id
    }

    /// Enqueue a frame for one session.
    pub fn send_to_session(&self, session_id: &SessionId, frame: OutboundFrame) {
        self.sessions.send(session_id, frame);
    }

    /// Lookup an active lobby by room code.
    pub fn find_lobby(&self, code: &str) -> Option<Arc<Lobby>> {
        self.lobbies.get(code).map(|entry| Arc::clone(entry.value()))
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Draw a room code that collides neither with an active lobby nor with
    /// any game record in the store.
    pub(crate) async fn allocate_code(&self) -> Result<String, CodeAllocationError> {
        let attempts = self.tuning.code_attempts.max(1);
        for _ in 0..attempts {
            let code = codes::random_code(self.tuning.code_length);
            if self.lobbies.contains_key(&code) {
                continue;
            }
            if self
                .store
                .code_in_use(&code)
                .await
                .map_err(CodeAllocationError::Store)?
            {
                continue;
            }
            return Ok(code);
        }
        Err(CodeAllocationError::Exhausted { attempts })
    }

    /// Registry lifecycle hook: runs when a socket closes for any reason.
    pub async fn disconnect_session(&self, session_id: SessionId) {
        let Some(record) = self.sessions.remove(&session_id) else {
            return;
        };
        self.metrics.decrement_active_connections();

        let Some(lobby) = record.lobby else {
            tracing::info!(%session_id, "Session closed");
            return;
        };

        if lobby.host.session_id == session_id {
            self.teardown_after_host_leave(&lobby).await;
        } else if let Some(user) = record.user {
            self.handle_player_leave(&lobby, &user.user_id, &user.username)
                .await;
        }
        tracing::info!(%session_id, "Session closed");
    }

    /// Host left: end the game for everyone. An unfinished game also loses
    /// its external record, results subcollection included.
    async fn teardown_after_host_leave(&self, lobby: &Arc<Lobby>) {
        let finished = {
            let mut state = lobby.state.lock().await;
            let already_closed = state.closed;
            state.closed = true;
            if !already_closed {
                lobby.broadcast(
                    &state,
                    ServerMessage::HostDisconnected {
                        message: "Host has left the game. The game is ending.".to_string(),
                        username: lobby.host.user.username.clone(),
                    }
                    .into(),
                );
                self.metrics.increment_lobbies_closed();
            }
            state.finished
        };

        self.lobbies.remove(&lobby.code);

        if !finished {
            if let Err(e) = self.store.delete_game(&lobby.game_id).await {
                self.metrics.increment_store_errors();
                tracing::error!(
                    game_id = %lobby.game_id,
                    error = %e,
                    "Failed to delete abandoned game record"
                );
            }
        }
        tracing::info!(code = %lobby.code, finished, "Lobby closed after host disconnect");
    }

    async fn handle_player_leave(&self, lobby: &Arc<Lobby>, user_id: &str, username: &str) {
        let emptied = {
            let mut state = lobby.state.lock().await;
            if state.closed {
                return;
            }
            if lobby.remove_player(&mut state, user_id).is_none() {
                return;
            }
            lobby.broadcast(
                &state,
                ServerMessage::PlayerDisconnected {
                    message: format!("{username} has left the game"),
                    username: username.to_string(),
                }
                .into(),
            );
            lobby.host_send(ServerMessage::PlayersUpdated {
                players: lobby.roster(&state),
            });
            if state.players.is_empty() && !state.finished {
                state.closed = true;
                true
            } else {
                false
            }
        };

        if emptied {
            self.lobbies.remove(&lobby.code);
            self.metrics.increment_lobbies_closed();
            tracing::info!(code = %lobby.code, "Removed empty lobby");
        }
    }
}
