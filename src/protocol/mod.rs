// Protocol module: wire frame types, quiz data model, room code generation

pub mod codes;
pub mod messages;
pub mod types;

pub use codes::random_code;

pub use messages::{
    ClientFrame, GameFinishedPayload, HostGameSummary, OutboundFrame, PlayerGameSummary,
    RoundEndedPayload, RoundStats, ScoreboardData, ServerMessage,
};

pub use types::{
    AnswerRecord, AnswerValue, CorrectAnswer, GameMode, GameType, LeaderboardEntry, Question,
    QuestionKind, Quiz, SanitizedQuestion, SessionId, StudentResult, User, UserProfile,
    DEFAULT_CODE_LENGTH,
};
