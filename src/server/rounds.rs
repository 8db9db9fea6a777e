use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::lobby::{Lobby, LobbyError, LobbyState, PendingAnswer};
use crate::protocol::{
    AnswerRecord, AnswerValue, OutboundFrame, RoundEndedPayload, RoundStats, ServerMessage,
};

const LAST_QUESTION_MESSAGE: &str =
    "All questions completed! Use show_results to view final results.";
const MISSED_MESSAGE: &str = "Time is up! You did not answer this question.";
const ANSWER_SAVED_MESSAGE: &str = "Saved! Waiting for end of round...";

impl Lobby {
    /// Host pressed start: dispatch the first question.
    pub async fn start_game(self: &Arc<Self>) -> Result<(), LobbyError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LobbyError::Closed);
        }
        if state.finished {
            return Err(LobbyError::AlreadyFinished);
        }
        if state.started {
            return Err(LobbyError::AlreadyStarted);
        }
        if self.quiz.questions.is_empty() {
            return Err(LobbyError::NoQuestions);
        }
        state.started = true;
        self.begin_round(&mut state, 0);
        Ok(())
    }

    /// Host pressed next: dispatch the following question, or tell the host
    /// the quiz is exhausted.
    pub async fn start_next_round(self: &Arc<Self>) -> Result<(), LobbyError> {
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

        let Ok(next) = usize::try_from(state.current_question + 1) else {
            return Err(LobbyError::NotStarted);
        };
        if next >= self.quiz.questions.len() {
            self.host_send(ServerMessage::LastQuestionCompleted {
                message: LAST_QUESTION_MESSAGE.to_string(),
            });
            return Ok(());
        }
        self.begin_round(&mut state, next);
        Ok(())
    }

    /// Open the round for `index`: everyone gets a sanitized question copy
    /// and the round timer is armed with its dispatch round.
    fn begin_round(self: &Arc<Self>, state: &mut LobbyState, index: usize) {
        let Some(question) = self.quiz.questions.get(index) else {
            return;
        };
        state.current_question = index as i64;
        state.round_active = true;
        state.answers.clear();

        let sanitized = question.sanitized();
        self.host_send(OutboundFrame::Question(sanitized.clone()));
        self.broadcast(state, OutboundFrame::Question(sanitized));
        self.arm_round_timer(index, question.time_limit);
        tracing::debug!(code = %self.code, question = index, "Round started");
    }

    fn arm_round_timer(self: &Arc<Self>, dispatch_round: usize, time_limit: u64) {
        let lobby = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(time_limit)).await;
            lobby.on_round_deadline(dispatch_round).await;
        });
    }

    /// Timer callback. The guard makes late timers no-ops: a round that was
    /// closed early (all answered) and a lobby that advanced past the
    /// dispatch round both fail it, as does a torn-down lobby.
    async fn on_round_deadline(&self, dispatch_round: usize) {
        let mut state = self.state.lock().await;
        if state.closed
            || !state.round_active
            || state.current_question != dispatch_round as i64
        {
            return;
        }
        self.finish_round(&mut state);
        if dispatch_round + 1 >= self.quiz.questions.len() {
            self.host_send(ServerMessage::LastQuestionCompleted {
                message: LAST_QUESTION_MESSAGE.to_string(),
            });
        }
    }

    /// Accept, grade and score one submission.
    pub async fn save_answer(&self, user_id: &str, value: AnswerValue) -> Result<(), LobbyError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LobbyError::Closed);
        }
        if !state.round_active {
            return Err(LobbyError::RoundNotActive);
        }
        if state.answers.iter().any(|a| a.user_id == user_id) {
            return Err(LobbyError::AlreadyAnswered);
        }
        let Ok(index) = usize::try_from(state.current_question) else {
            return Err(LobbyError::RoundNotActive);
        };
        let Some(question) = self.quiz.questions.get(index) else {
            return Err(LobbyError::RoundNotActive);
        };
        let Some(position) = state
            .players
            .iter()
            .position(|p| p.seat.user.user_id == user_id)
        else {
            return Err(LobbyError::NotInGame);
        };

        let is_correct = question.grade(&value);
        let possible = question.points();
        let earned = if is_correct { possible } else { 0 };

        state.answers.push(PendingAnswer {
            user_id: user_id.to_string(),
            value: value.clone(),
            is_correct,
        });

        let record = AnswerRecord {
            question_index: index,
            question: question.question.clone(),
            kind: question.kind,
            options: question.options.clone(),
            user_answer: Some(value),
            correct_answer: question.correct_answer_value(),
            is_correct,
            points_earned: earned,
            possible_points: possible,
            missed: false,
            explanation: question.explanation.clone(),
        };

        if let Some(player) = state.players.get_mut(position) {
            player.score += earned;
            player.answers.push(record);
            player.seat.send(
                OutboundFrame::AnswerVerdict {
                    correct: is_correct,
                    points_earned: earned,
                },
                &self.metrics,
            );
        }

        let scoreboard = self.scoreboard_data(&state);
        self.broadcast(&state, ServerMessage::Scoreboard { data: scoreboard }.into());
        self.host_send(OutboundFrame::AnswerCount {
            answers: state.answers.len(),
        });
        if let Some(player) = state.players.get(position) {
            player.seat.send(
                ServerMessage::AnswerSaved {
                    message: ANSWER_SAVED_MESSAGE.to_string(),
                },
                &self.metrics,
            );
        }

        if state.answers.len() == state.players.len() {
            self.finish_round(&mut state);
        }
        Ok(())
    }

    /// Close the in-flight round. Idempotent for a given question index;
    /// reached from the timer or from the all-answered path.
    pub(crate) fn finish_round(&self, state: &mut LobbyState) {
        if !state.round_active {
            return;
        }
        state.round_active = false;

        let Ok(index) = usize::try_from(state.current_question) else {
            return;
        };
        let Some(question) = self.quiz.questions.get(index) else {
            return;
        };
        let points = question.points();

        // Host statistics over the answer buffer.
        let mut right = 0;
        let mut by_answer: Option<BTreeMap<usize, usize>> = question
            .options
            .as_ref()
            .map(|options| (0..options.len()).map(|i| (i, 0)).collect());
        for pending in &state.answers {
            if pending.is_correct {
                right += 1;
            }
            if let Some(buckets) = by_answer.as_mut() {
                match &pending.value {
                    AnswerValue::Choice(picked) => bump_bucket(buckets, *picked),
                    AnswerValue::Choices(picked) => {
                        for selected in picked {
                            bump_bucket(buckets, *selected);
                        }
                    }
                    AnswerValue::Text(_) => {}
                }
            }
        }
        let wrong = state.answers.len() - right;
        self.host_send(ServerMessage::RoundResults {
            data: RoundStats {
                right,
                wrong,
                by_answer,
                question_points: points,
                total_possible_points: points * state.players.len() as i64,
                total_earned_points: right as i64 * points,
            },
        });

        let scoreboard = self.scoreboard_data(state);

        // Each answerer learns their verdict along with the scoreboard.
        for pending in &state.answers {
            let Some(player) = state
                .players
                .iter()
                .find(|p| p.seat.user.user_id == pending.user_id)
            else {
                continue;
            };
            player.seat.send(
                ServerMessage::RoundEnded(Box::new(RoundEndedPayload {
                    correct: pending.is_correct,
                    scoreboard: scoreboard.clone(),
                    question_points: points,
                    missed: None,
                    message: None,
                })),
                &self.metrics,
            );
        }

        // Everyone who stayed silent gets a missed record.
        let answered: Vec<String> = state.answers.iter().map(|a| a.user_id.clone()).collect();
        for player in &mut state.players {
            if answered.contains(&player.seat.user.user_id) {
                continue;
            }
            player.answers.push(AnswerRecord {
                question_index: index,
                question: question.question.clone(),
                kind: question.kind,
                options: question.options.clone(),
                user_answer: None,
                correct_answer: question.correct_answer_value(),
                is_correct: false,
                points_earned: 0,
                possible_points: points,
                missed: true,
                explanation: question.explanation.clone(),
            });
            player.seat.send(
                ServerMessage::RoundEnded(Box::new(RoundEndedPayload {
                    correct: false,
                    scoreboard: scoreboard.clone(),
                    question_points: points,
                    missed: Some(true),
                    message: Some(MISSED_MESSAGE.to_string()),
                })),
                &self.metrics,
            );
        }

        state.answers.clear();
        tracing::debug!(code = %self.code, question = index, right, wrong, "Round closed");
    }
}

fn bump_bucket(buckets: &mut BTreeMap<usize, usize>, picked: i64) {
    if let Ok(index) = usize::try_from(picked) {
        if let Some(slot) = buckets.get_mut(&index) {
            *slot += 1;
        }
    }
}
