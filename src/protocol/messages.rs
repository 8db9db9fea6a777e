use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::types::{
    AnswerValue, GameMode, GameType, LeaderboardEntry, Question, SanitizedQuestion,
};

/// Scoreboard payload: `user_id -> [username, score]`, as on the wire.
pub type ScoreboardData = HashMap<String, (String, i64)>;

/// An inbound frame. The protocol is not tagged by a verb: a command is
/// recognized by the fields present, and one frame can carry several commands
/// (e.g. `user_id` + `quiz` authenticates and creates a game in one step).
/// The router walks its rules in order over the same decoded frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFrame {
    pub user_id: Option<String>,
    pub quiz: Option<String>,
    pub group: Option<String>,
    pub game_type: Option<GameType>,
    pub code: Option<String>,
    pub start: Option<serde_json::Value>,
    pub next: Option<serde_json::Value>,
    pub show_results: Option<serde_json::Value>,
    pub answer: Option<AnswerValue>,
    pub report: Option<String>,
}

/// Payload of a `round_ended` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEndedPayload {
    pub correct: bool,
    pub scoreboard: ScoreboardData,
    pub question_points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Host statistics for a closed round (`round_results` frame).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStats {
    pub right: usize,
    pub wrong: usize,
    /// Submission counts per option index; absent for text questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_answer: Option<BTreeMap<usize, usize>>,
    pub question_points: i64,
    pub total_possible_points: i64,
    pub total_earned_points: i64,
}

/// Host-facing final summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostGameSummary {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub total_questions: usize,
    pub total_players: usize,
    pub game_mode: GameMode,
}

/// Player-facing final summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGameSummary {
    pub placement: usize,
    pub score: i64,
    pub total_players: usize,
}

/// `game_finished` carries a different body for the host and for players.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GameFinishedPayload {
    Host(HostGameSummary),
    Player(PlayerGameSummary),
}

/// Type-tagged frames sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
    },
    AuthAttempt {
        message: String,
    },
    AuthSuccess {
        message: String,
    },
    Error {
        message: String,
    },
    CreatingGame {
        message: String,
    },
    GameCreated {
        message: String,
        code: String,
    },
    /// Full question list for the host, answer keys included.
    QuizInfo {
        message: String,
        questions: Vec<Question>,
    },
    Joining {
        message: String,
    },
    /// Join acknowledgment, carrying the lobby's policy hints.
    Joined {
        message: String,
        mode: GameMode,
        disable_copy: bool,
    },
    Scoreboard {
        data: ScoreboardData,
    },
    AnswerSaved {
        message: String,
    },
    RoundEnded(Box<RoundEndedPayload>),
    RoundResults {
        data: RoundStats,
    },
    LastQuestionCompleted {
        message: String,
    },
    GameFinished(GameFinishedPayload),
    PlayerDisconnected {
        message: String,
        username: String,
    },
    HostDisconnected {
        message: String,
        username: String,
    },
    PlayersUpdated {
        players: Vec<String>,
    },
    TabSwitchReport {
        user_id: String,
        username: String,
        count: u32,
    },
    TabSwitchRecorded {
        message: String,
        count: u32,
    },
    PlayerKicked {
        user_id: String,
        username: String,
        reason: String,
    },
    PlayerRemoved {
        username: String,
        message: String,
    },
    Kicked {
        reason: String,
        message: String,
    },
}

/// Everything a session's outbound queue can carry.
///
/// Most frames are tagged [`ServerMessage`]s, but the wire also has a few
/// bare objects (the sanitized question at round start, the per-answer
/// verdict, the live answer count, the host roster) and an internal close
/// directive that terminates the socket after delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Message(ServerMessage),
    Question(SanitizedQuestion),
    AnswerVerdict {
        correct: bool,
        points_earned: i64,
    },
    AnswerCount {
        answers: usize,
    },
    PlayerRoster {
        players: Vec<String>,
    },
    /// Close the connection with a WebSocket close code. Never serialized.
    #[serde(skip)]
    Close {
        code: u16,
        reason: String,
    },
}

impl From<ServerMessage> for OutboundFrame {
    fn from(message: ServerMessage) -> Self {
        Self::Message(message)
    }
}
