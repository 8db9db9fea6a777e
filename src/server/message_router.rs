use std::sync::Arc;

use super::lobby::Seat;
use super::{Lobby, QuizServer};
use crate::protocol::{
    ClientFrame, GameType, OutboundFrame, ServerMessage, SessionId, User,
};
use crate::store::{NewGame, StoreError};

impl QuizServer {
    /// Dispatch an inbound frame.
    ///
    /// The wire carries no command tag: rules match on the fields present
    /// and are walked in a fixed order over the same frame, so one frame can
    /// trigger several of them (an auth frame that also carries `quiz`
    /// creates the game immediately).
    pub async fn handle_frame(&self, session_id: SessionId, frame: ClientFrame) {
        // 1. Unauthenticated sessions only understand auth frames.
        if !self.sessions.is_authenticated(&session_id) {
            let authenticated = self.auth_flow(session_id, frame.user_id.as_deref()).await;
            if !authenticated {
                return;
            }
        }

        let Some(user) = self.sessions.user(&session_id) else {
            return;
        };

        // 2. Teacher creating a game.
        if let Some(quiz_id) = frame.quiz.as_deref() {
            if user.teacher && self.sessions.lobby(&session_id).is_none() {
                self.create_game_flow(
                    session_id,
                    &user,
                    quiz_id,
                    frame.group.as_deref(),
                    frame.game_type.unwrap_or_default(),
                )
                .await;
            }
        }

        // 3. Student joining by code.
        if let Some(code) = frame.code.as_deref() {
            if self.sessions.lobby(&session_id).is_some() {
                self.send_error(&session_id, "Already in a game!");
            } else {
                self.join_flow(session_id, &user, code).await;
            }
        }

        // 4-6. Host controls.
        if frame.start.is_some() {
            match self.host_lobby(&session_id) {
                Some(lobby) => {
                    if let Err(e) = lobby.start_game().await {
                        self.send_error(&session_id, &e.to_string());
                    }
                }
                None => self.send_error(&session_id, "Only the host can start the game!"),
            }
        }
        if frame.next.is_some() {
            match self.host_lobby(&session_id) {
                Some(lobby) => {
                    if let Err(e) = lobby.start_next_round().await {
                        self.send_error(&session_id, &e.to_string());
                    }
                }
                None => self.send_error(&session_id, "Only the host can advance the game!"),
            }
        }
        if frame.show_results.is_some() {
            match self.host_lobby(&session_id) {
                Some(lobby) => {
                    if let Err(e) = lobby.finish_game(&self.store).await {
                        self.send_error(&session_id, &e.to_string());
                    }
                }
                None => self.send_error(&session_id, "Only the host can finish the game!"),
            }
        }

        // 7. Answer submission.
        if let Some(value) = frame.answer {
            if let Some(lobby) = self.sessions.lobby(&session_id) {
                if let Err(e) = lobby.save_answer(&user.user_id, value).await {
                    self.send_error(&session_id, &e.to_string());
                }
            }
        }

        // 8. Anti-cheat policy report.
        if frame.report.as_deref() == Some("switched_tabs") {
            if let Some(lobby) = self.sessions.lobby(&session_id) {
                let removed = lobby.on_tab_event(&user.user_id).await;
                if removed {
                    self.sessions.clear_lobby(&session_id);
                    self.metrics.increment_players_kicked();
                }
            }
        }
    }

    /// NEW -> AUTHED transition. Returns whether the session may continue
    /// with the rest of this frame.
    async fn auth_flow(&self, session_id: SessionId, user_id: Option<&str>) -> bool {
        let Some(user_id) = user_id else {
            self.send_error(&session_id, "Authentication required");
            return false;
        };
        self.sessions.send(
            &session_id,
            ServerMessage::AuthAttempt {
                message: "Authenticating...".to_string(),
            }
            .into(),
        );

        match self.store.fetch_user(user_id).await {
            Ok(Some(profile)) => {
                let user = User::from_profile(user_id.to_string(), &profile);
                tracing::info!(%session_id, user_id = %user.user_id, teacher = user.teacher, "Session authenticated");
                self.sessions.send(
                    &session_id,
                    ServerMessage::AuthSuccess {
                        message: format!("Welcome, {}!", profile.name),
                    }
                    .into(),
                );
                self.sessions.bind_user(&session_id, user);
                true
            }
            Ok(None) => {
                tracing::warn!(%session_id, %user_id, "Rejected unknown user id");
                self.sessions.send(
                    &session_id,
                    OutboundFrame::Close {
                        code: 1008,
                        reason: "invalid credentials".to_string(),
                    },
                );
                false
            }
            Err(e) => {
                self.metrics.increment_store_errors();
                tracing::error!(%session_id, error = %e, "User lookup failed");
                self.send_error(&session_id, "Authentication is temporarily unavailable");
                false
            }
        }
    }

    async fn create_game_flow(
        &self,
        session_id: SessionId,
        user: &User,
        quiz_id: &str,
        group: Option<&str>,
        game_type: GameType,
    ) {
        self.sessions.send(
            &session_id,
            ServerMessage::CreatingGame {
                message: "Creating game...".to_string(),
            }
            .into(),
        );

        let code = match self.allocate_code().await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(%session_id, error = %e, "Room code allocation failed");
                self.send_error(&session_id, "Could not allocate a room code, try again");
                return;
            }
        };

        let game_id = match self
            .store
            .create_game(NewGame {
                host_id: &user.user_id,
                group_id: group,
                code: &code,
                mode: game_type.mode,
                quiz_id,
            })
            .await
        {
            Ok(game_id) => game_id,
            Err(e) => {
                self.metrics.increment_store_errors();
                tracing::error!(%session_id, error = %e, "Failed to create game record");
                self.send_error(&session_id, "Could not create the game, try again later");
                return;
            }
        };

        let quiz = match self.store.fetch_quiz(quiz_id).await {
            Ok(quiz) => quiz,
            Err(e) => {
                self.metrics.increment_store_errors();
                tracing::error!(%session_id, quiz_id, error = %e, "Failed to load quiz");
                // The game record was already written; do not leave it behind.
                if let Err(delete_err) = self.store.delete_game(&game_id).await {
                    tracing::warn!(
                        %game_id,
                        error = %delete_err,
                        "Failed to clean up game record after quiz load failure"
                    );
                }
                let message = match e {
                    StoreError::Missing => "Quiz not found!",
                    StoreError::Unavailable(_) => "Could not load the quiz, try again later",
                };
                self.send_error(&session_id, message);
                return;
            }
        };

        let Some(sender) = self.sessions.sender(&session_id) else {
            return;
        };
        let host = Seat {
            session_id,
            user: user.clone(),
            sender,
        };
        let lobby = Arc::new(Lobby::new(
            code.clone(),
            game_id,
            quiz,
            game_type,
            host,
            self.metrics.clone(),
        ));
        self.lobbies.insert(code.clone(), lobby.clone());
        self.sessions.set_lobby(&session_id, lobby.clone());
        self.metrics.increment_lobbies_created();
        tracing::info!(%session_id, code = %code, quiz_id, mode = ?lobby.mode, "Game created");

        self.sessions.send(
            &session_id,
            ServerMessage::GameCreated {
                message: format!("Done! Room code: {code}"),
                code,
            }
            .into(),
        );
        self.sessions.send(
            &session_id,
            ServerMessage::QuizInfo {
                message: format!("Quiz loaded: {}", lobby.quiz.title),
                questions: lobby.quiz.questions.clone(),
            }
            .into(),
        );
    }

    async fn join_flow(&self, session_id: SessionId, user: &User, code: &str) {
        self.sessions.send(
            &session_id,
            ServerMessage::Joining {
                message: "Joining...".to_string(),
            }
            .into(),
        );

        let code = code.trim().to_uppercase();
        let Some(lobby) = self.find_lobby(&code) else {
            self.send_error(&session_id, "Invalid room code!");
            return;
        };
        let Some(sender) = self.sessions.sender(&session_id) else {
            return;
        };
        let seat = Seat {
            session_id,
            user: user.clone(),
            sender,
        };
        if let Err(e) = lobby.join(seat).await {
            self.send_error(&session_id, &e.to_string());
            return;
        }
        self.sessions.set_lobby(&session_id, lobby.clone());
        self.metrics.increment_players_joined();

        if let Err(e) = self.store.append_player(&lobby.game_id, &user.user_id).await {
            self.metrics.increment_store_errors();
            tracing::warn!(
                game_id = %lobby.game_id,
                error = %e,
                "Failed to append player to game record"
            );
        }

        self.sessions.send(
            &session_id,
            ServerMessage::Joined {
                message: "Joined! Waiting for start.".to_string(),
                mode: lobby.mode,
                disable_copy: lobby.disable_copy,
            }
            .into(),
        );
        tracing::info!(%session_id, code = %lobby.code, quiz = %lobby.quiz.title, "Player joined");
    }

    /// The lobby this session controls as host, if any.
    fn host_lobby(&self, session_id: &SessionId) -> Option<Arc<Lobby>> {
        let lobby = self.sessions.lobby(session_id)?;
        (lobby.host.session_id == *session_id).then_some(lobby)
    }

    fn send_error(&self, session_id: &SessionId, message: &str) {
        self.sessions.send(
            session_id,
            ServerMessage::Error {
                message: message.to_string(),
            }
            .into(),
        );
    }
}
