use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::metrics::ServerMetrics;
use crate::protocol::{
    AnswerRecord, AnswerValue, GameMode, GameType, OutboundFrame, Quiz, ScoreboardData,
    ServerMessage, SessionId, User,
};

/// Errors surfaced to clients as `error` frames. The display strings are the
/// wire messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("Round is not active!")]
    RoundNotActive,
    #[error("You already answered this question!")]
    AlreadyAnswered,
    #[error("Game has already started!")]
    AlreadyStarted,
    #[error("Round is still in progress!")]
    RoundStillActive,
    #[error("Game has not started yet!")]
    NotStarted,
    #[error("Game is already finished!")]
    AlreadyFinished,
    #[error("Game is closed!")]
    Closed,
    #[error("Already in this game!")]
    AlreadyJoined,
    #[error("Game is over!")]
    GameOver,
    #[error("You are not in this game!")]
    NotInGame,
    #[error("Quiz has no questions!")]
    NoQuestions,
}

/// A connected participant's address: identity plus outbound queue.
#[derive(Debug, Clone)]
pub(crate) struct Seat {
    pub session_id: SessionId,
    pub user: User,
    pub sender: mpsc::Sender<Arc<OutboundFrame>>,
}

impl Seat {
    pub(crate) fn send(&self, frame: impl Into<OutboundFrame>, metrics: &ServerMetrics) {
        self.send_shared(&Arc::new(frame.into()), metrics);
    }

    pub(crate) fn send_shared(&self, frame: &Arc<OutboundFrame>, metrics: &ServerMetrics) {
        if self.sender.try_send(Arc::clone(frame)).is_err() {
            metrics.increment_frames_dropped();
            tracing::warn!(
                session_id = %self.session_id,
                "Outbound queue full or closed, frame dropped"
            );
        }
    }
}

/// A player and everything the lobby tracks about them: live score,
/// tab-switch count, and the per-question answer log in question order.
#[derive(Debug)]
pub(crate) struct PlayerSeat {
    pub seat: Seat,
    pub score: i64,
    pub tab_switches: u32,
    pub answers: Vec<AnswerRecord>,
}

/// One buffered submission for the in-flight question.
#[derive(Debug)]
pub(crate) struct PendingAnswer {
    pub user_id: String,
    pub value: AnswerValue,
    pub is_correct: bool,
}

/// Mutable lobby state. All mutation happens under the lobby's mutex, held
/// across a full top-level event.
#[derive(Debug, Default)]
pub(crate) struct LobbyState {
    /// Players in join order (placement ties break on this order).
    pub players: Vec<PlayerSeat>,
    /// Buffer for the in-flight question; cleared on round close.
    pub answers: Vec<PendingAnswer>,
    /// -1 before the first question.
    pub current_question: i64,
    pub round_active: bool,
    pub started: bool,
    pub finished: bool,
    /// Terminal: set on teardown so late timers and stray events no-op.
    pub closed: bool,
}

/// One active game: a room code, a host, a quiz, and the round engine.
pub struct Lobby {
    pub code: String,
    pub game_id: String,
    pub quiz: Quiz,
    pub mode: GameMode,
    pub disable_copy: bool,
    pub(crate) host: Seat,
    pub(crate) state: Mutex<LobbyState>,
    pub(crate) metrics: Arc<ServerMetrics>,
}

impl std::fmt::Debug for Lobby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lobby")
            .field("code", &self.code)
            .field("game_id", &self.game_id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Lobby {
    pub(crate) fn new(
        code: String,
        game_id: String,
        quiz: Quiz,
        game_type: GameType,
        host: Seat,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            code,
            game_id,
            quiz,
            mode: game_type.mode,
            disable_copy: game_type.disable_copy,
            host,
            state: Mutex::new(LobbyState {
                current_question: -1,
                ..LobbyState::default()
            }),
            metrics,
        }
    }

    /// Add a player and show the host the updated roster.
    pub(crate) async fn join(&self, seat: Seat) -> Result<(), LobbyError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LobbyError::Closed);
        }
        if state.finished {
            return Err(LobbyError::GameOver);
        }
        let user_id = &seat.user.user_id;
        if self.host.user.user_id == *user_id
            || state.players.iter().any(|p| p.seat.user.user_id == *user_id)
        {
            return Err(LobbyError::AlreadyJoined);
        }

        tracing::info!(code = %self.code, user_id = %user_id, "Player joined lobby");
        state.players.push(PlayerSeat {
            seat,
            score: 0,
            tab_switches: 0,
            answers: Vec::new(),
        });
        self.host_send(OutboundFrame::PlayerRoster {
            players: self.roster(&state),
        });
        Ok(())
    }

    /// Drop a player from the membership maps and the answer buffer.
    pub(crate) fn remove_player(
        &self,
        state: &mut LobbyState,
        user_id: &str,
    ) -> Option<PlayerSeat> {
        let position = state
            .players
            .iter()
            .position(|p| p.seat.user.user_id == user_id)?;
        let removed = state.players.remove(position);
        state.answers.retain(|a| a.user_id != user_id);
        Some(removed)
    }

    /// Handle a `switched_tabs` report under the lobby's policy.
    /// Returns `true` when the reporter was removed (lockdown).
    pub(crate) async fn on_tab_event(&self, user_id: &str) -> bool {
        match self.mode {
            GameMode::Normal => false,
            GameMode::TabTracking => {
                self.record_tab_switch(user_id).await;
                false
            }
            GameMode::Lockdown => self.kick_for_lockdown(user_id).await,
        }
    }

    async fn record_tab_switch(&self, user_id: &str) {
        let mut state = self.state.lock().await;
        if state.closed || state.finished {
            return;
        }
        let Some(player) = state
            .players
            .iter_mut()
            .find(|p| p.seat.user.user_id == user_id)
        else {
            return;
        };
        player.tab_switches += 1;
        let count = player.tab_switches;
        let username = player.seat.user.username.clone();
        player.seat.send(
            ServerMessage::TabSwitchRecorded {
                message: "Tab switch recorded".to_string(),
                count,
            },
            &self.metrics,
        );
        self.host_send(ServerMessage::TabSwitchReport {
            user_id: user_id.to_string(),
            username,
            count,
        });
    }

    /// One report is grounds for removal in lockdown mode.
    async fn kick_for_lockdown(&self, user_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.closed || state.finished {
            return false;
        }
        let Some(removed) = self.remove_player(&mut state, user_id) else {
            return false;
        };
        let username = removed.seat.user.username.clone();
        tracing::info!(code = %self.code, %user_id, "Player kicked for lockdown violation");

        removed.seat.send(
            ServerMessage::Kicked {
                reason: "lockdown_violation".to_string(),
                message: "You were removed from the game for leaving the quiz tab.".to_string(),
            },
            &self.metrics,
        );
        self.host_send(ServerMessage::PlayerKicked {
            user_id: user_id.to_string(),
            username: username.clone(),
            reason: "lockdown_violation".to_string(),
        });
        self.broadcast(
            &state,
            ServerMessage::PlayerRemoved {
                username: username.clone(),
                message: format!("{username} was removed from the game"),
            }
            .into(),
        );
        self.host_send(ServerMessage::PlayersUpdated {
            players: self.roster(&state),
        });
        removed.seat.send(
            OutboundFrame::Close {
                code: 1008,
                reason: "lockdown violation".to_string(),
            },
            &self.metrics,
        );
        true
    }

    /// Live scoreboard payload: `user_id -> [username, score]`.
    pub(crate) fn scoreboard_data(&self, state: &LobbyState) -> ScoreboardData {
        state
            .players
            .iter()
            .map(|p| {
                (
                    p.seat.user.user_id.clone(),
                    (p.seat.user.username.clone(), p.score),
                )
            })
            .collect()
    }

    pub(crate) fn roster(&self, state: &LobbyState) -> Vec<String> {
        state
            .players
            .iter()
            .map(|p| p.seat.user.username.clone())
            .collect()
    }

    pub(crate) fn host_send(&self, frame: impl Into<OutboundFrame>) {
        self.host.send(frame, &self.metrics);
    }

    /// Enqueue a frame for every player. Broadcasts never block: each seat
    /// has its own queue and sender worker.
    pub(crate) fn broadcast(&self, state: &LobbyState, frame: OutboundFrame) {
        let shared = Arc::new(frame);
        for player in &state.players {
            player.seat.send_shared(&shared, &self.metrics);
        }
    }
}
