use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{GameStore, NewGame, StoreError};
use crate::protocol::{GameMode, LeaderboardEntry, Question, Quiz, StudentResult, UserProfile};

/// Quiz document: question ids are references into the `questions` map.
#[derive(Debug, Clone)]
pub struct QuizDocument {
    pub title: String,
    pub questions: Vec<String>,
}

/// In-memory mirror of a `games/{game_id}` document, including the
/// `results` subcollection.
#[derive(Debug, Clone)]
pub struct GameDocument {
    pub host: String,
    pub players: Vec<String>,
    pub group_id: Option<String>,
    pub active: bool,
    pub game_finished: bool,
    pub code: String,
    pub quiz_id: String,
    pub game_mode: GameMode,
    pub finished_at: Option<DateTime<Utc>>,
    pub final_results: Option<Vec<LeaderboardEntry>>,
    pub ended_reason: Option<String>,
    pub results: HashMap<String, StudentResult>,
}

/// In-memory document store. Backs development and tests; the production
/// document database is an external collaborator behind [`GameStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserProfile>,
    quizzes: DashMap<String, QuizDocument>,
    questions: DashMap<String, Question>,
    games: DashMap<String, GameDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user_id: &str, profile: UserProfile) {
        self.users.insert(user_id.to_owned(), profile);
    }

    pub fn insert_question(&self, question_id: &str, question: Question) {
        self.questions.insert(question_id.to_owned(), question);
    }

    pub fn insert_quiz(&self, quiz_id: &str, title: &str, question_ids: &[&str]) {
        self.quizzes.insert(
            quiz_id.to_owned(),
            QuizDocument {
                title: title.to_owned(),
                questions: question_ids.iter().map(|id| (*id).to_owned()).collect(),
            },
        );
    }

    /// Snapshot of a game document, if it exists.
    pub fn game(&self, game_id: &str) -> Option<GameDocument> {
        self.games.get(game_id).map(|entry| entry.value().clone())
    }

    /// Reverse lookup by room code.
    pub fn game_id_by_code(&self, code: &str) -> Option<String> {
        self.games
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.key().clone())
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, StoreError> {
        let document = self.quizzes.get(quiz_id).ok_or(StoreError::Missing)?;
        let mut questions = Vec::with_capacity(document.questions.len());
        for question_id in &document.questions {
            let question = self.questions.get(question_id).ok_or(StoreError::Missing)?;
            questions.push(question.value().clone());
        }
        Ok(Quiz {
            title: document.title.clone(),
            questions,
        })
    }

    async fn create_game(&self, game: NewGame<'_>) -> Result<String, StoreError> {
        let game_id = Uuid::new_v4().to_string();
        self.games.insert(
            game_id.clone(),
            GameDocument {
                host: game.host_id.to_owned(),
                players: Vec::new(),
                group_id: game.group_id.map(str::to_owned),
                active: true,
                game_finished: false,
                code: game.code.to_owned(),
                quiz_id: game.quiz_id.to_owned(),
                game_mode: game.mode,
                finished_at: None,
                final_results: None,
                ended_reason: None,
                results: HashMap::new(),
            },
        );
        Ok(game_id)
    }

    async fn code_in_use(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.games.iter().any(|entry| entry.code == code))
    }

    async fn append_player(&self, game_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut game = self.games.get_mut(game_id).ok_or(StoreError::Missing)?;
        if !game.players.iter().any(|id| id == user_id) {
            game.players.push(user_id.to_owned());
        }
        Ok(())
    }

    async fn finalize_game(
        &self,
        game_id: &str,
        leaderboard: &[LeaderboardEntry],
        mode: GameMode,
    ) -> Result<(), StoreError> {
        let mut game = self.games.get_mut(game_id).ok_or(StoreError::Missing)?;
        game.active = false;
        game.game_finished = true;
        game.finished_at = Some(Utc::now());
        game.final_results = Some(leaderboard.to_vec());
        game.game_mode = mode;
        Ok(())
    }

    async fn write_result(
        &self,
        game_id: &str,
        user_id: &str,
        result: &StudentResult,
    ) -> Result<(), StoreError> {
        let mut game = self.games.get_mut(game_id).ok_or(StoreError::Missing)?;
        game.results.insert(user_id.to_owned(), result.clone());
        Ok(())
    }

    async fn delete_game(&self, game_id: &str) -> Result<(), StoreError> {
        // Removing the document drops the results subcollection with it.
        self.games.remove(game_id);
        Ok(())
    }
}
