use std::collections::HashMap;
use std::sync::Arc;

use super::lobby::{Lobby, LobbyError, LobbyState};
use crate::protocol::{
    GameFinishedPayload, HostGameSummary, LeaderboardEntry, PlayerGameSummary, ServerMessage,
    StudentResult,
};
use crate::store::GameStore;

impl Lobby {
    /// Final placement: score descending; the sort is stable, so equal
    /// scores keep join order.
    pub(crate) fn leaderboard(&self, state: &LobbyState) -> Vec<LeaderboardEntry> {
        let mut order: Vec<usize> = (0..state.players.len()).collect();
        order.sort_by(|a, b| {
            let score_a = state.players.get(*a).map_or(0, |p| p.score);
            let score_b = state.players.get(*b).map_or(0, |p| p.score);
            score_b.cmp(&score_a)
        });
        order
            .into_iter()
            .enumerate()
            .filter_map(|(place, position)| {
                let player = state.players.get(position)?;
                Some(LeaderboardEntry {
                    place: place + 1,
                    username: player.seat.user.username.clone(),
                    score: player.score,
                    user_id: player.seat.user.user_id.clone(),
                    tab_switches: player.tab_switches,
                })
            })
            .collect()
    }

    /// Host pressed show_results: freeze scores, announce placements, and
    /// persist the outcome. Store failures are logged and never unwind the
    /// in-memory finish.
    pub async fn finish_game(&self, store: &Arc<dyn GameStore>) -> Result<(), LobbyError> {
        let (leaderboard, results) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(LobbyError::Closed);
            }
            if state.finished {
                return Err(LobbyError::AlreadyFinished);
            }
            if !state.started {
                return Err(LobbyError::NotStarted);
            }
            if state.round_active {
                return Err(LobbyError::RoundStillActive);
            }
            state.finished = true;

            let leaderboard = self.leaderboard(&state);
            let total_players = leaderboard.len();
            let total_questions = self.quiz.questions.len();

            let mut results: HashMap<String, StudentResult> = HashMap::new();
            for entry in &leaderboard {
                let answers = state
                    .players
                    .iter()
                    .find(|p| p.seat.user.user_id == entry.user_id)
                    .map(|p| p.answers.clone())
                    .unwrap_or_default();
                results.insert(
                    entry.user_id.clone(),
                    StudentResult {
                        user_id: entry.user_id.clone(),
                        username: entry.username.clone(),
                        score: entry.score,
                        placement: entry.place,
                        total_questions,
                        total_players,
                        tab_switches: entry.tab_switches,
                        answers,
                    },
                );
            }

            for player in &state.players {
                let Some(entry) = leaderboard
                    .iter()
                    .find(|e| e.user_id == player.seat.user.user_id)
                else {
                    continue;
                };
                player.seat.send(
                    ServerMessage::GameFinished(GameFinishedPayload::Player(PlayerGameSummary {
                        placement: entry.place,
                        score: entry.score,
                        total_players,
                    })),
                    &self.metrics,
                );
            }
            self.host_send(ServerMessage::GameFinished(GameFinishedPayload::Host(
                HostGameSummary {
                    leaderboard: leaderboard.clone(),
                    total_questions,
                    total_players,
                    game_mode: self.mode,
                },
            )));

            (leaderboard, results)
        };

        self.metrics.increment_games_finished();
        tracing::info!(code = %self.code, game_id = %self.game_id, "Game finished");

        if let Err(e) = store
            .finalize_game(&self.game_id, &leaderboard, self.mode)
            .await
        {
            self.metrics.increment_store_errors();
            tracing::error!(
                game_id = %self.game_id,
                error = %e,
                "Failed to finalize game record"
            );
        }
        for (user_id, result) in &results {
            if let Err(e) = store.write_result(&self.game_id, user_id, result).await {
                self.metrics.increment_store_errors();
                tracing::error!(
                    game_id = %self.game_id,
                    %user_id,
                    error = %e,
                    "Failed to write student result"
                );
            }
        }
        Ok(())
    }
}
