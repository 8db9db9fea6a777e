use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default room code length when none is configured.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Unique identifier for an open connection.
pub type SessionId = Uuid;

/// Profile document stored under `users/{user_id}` (consumed read-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "isTeacher")]
    pub is_teacher: bool,
}

/// An authenticated participant, bound to exactly one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub teacher: bool,
}

impl User {
    /// Bind a fetched profile to its id, deriving the display name.
    pub fn from_profile(user_id: String, profile: &UserProfile) -> Self {
        Self {
            user_id,
            username: format!("{} {}", profile.name, profile.last_name),
            teacher: profile.is_teacher,
        }
    }
}

/// Anti-cheat policy selected by the host at game creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Normal,
    Lockdown,
    TabTracking,
}

/// The `game_type` object on a create frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GameType {
    pub mode: GameMode,
    #[serde(default)]
    pub disable_copy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
    Text,
}

/// Stored correct answer: an index for `single`, an index set for `multiple`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(usize),
    Indices(Vec<usize>),
}

/// A submitted answer value. The variant is decided by the JSON shape; it is
/// matched against the question kind at grading time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(i64),
    Choices(Vec<i64>),
    Text(String),
}

/// Question document as stored under `questions/{question_id}`.
///
/// Exactly one of `correct` / `text_answer` is meaningful, determined by
/// `kind`. The stored question is never mutated; clients receive a
/// [`SanitizedQuestion`] copy with the reveal-only fields stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<CorrectAnswer>,
    #[serde(rename = "textAnswer", default, skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
    #[serde(default = "default_point")]
    pub point: i64,
    #[serde(rename = "timeLimit")]
    pub time_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

fn default_point() -> i64 {
    1
}

impl Question {
    /// Points awarded for a correct answer.
    pub fn points(&self) -> i64 {
        self.point
    }

    /// Copy sent to clients at round start, with `correct` and `textAnswer`
    /// stripped and the point value attached as `points`.
    pub fn sanitized(&self) -> SanitizedQuestion {
        SanitizedQuestion {
            question: self.question.clone(),
            kind: self.kind,
            options: self.options.clone(),
            points: self.points(),
            time_limit: self.time_limit,
            explanation: self.explanation.clone(),
        }
    }

    /// Grade a submitted value against this question.
    ///
    /// A value whose shape does not match the question kind is incorrect,
    /// never an error. `multiple` grades as set equality of the selected
    /// indices; `text` compares trimmed, case-folded strings.
    pub fn grade(&self, value: &AnswerValue) -> bool {
        match (self.kind, value) {
            (QuestionKind::Single, AnswerValue::Choice(picked)) => {
                match (&self.correct, usize::try_from(*picked)) {
                    (Some(CorrectAnswer::Index(correct)), Ok(picked)) => picked == *correct,
                    _ => false,
                }
            }
            (QuestionKind::Multiple, AnswerValue::Choices(picked)) => {
                let Some(CorrectAnswer::Indices(correct)) = &self.correct else {
                    return false;
                };
                let mut picked_set = std::collections::BTreeSet::new();
                for index in picked {
                    match usize::try_from(*index) {
                        Ok(index) => {
                            picked_set.insert(index);
                        }
                        Err(_) => return false,
                    }
                }
                let correct_set: std::collections::BTreeSet<usize> =
                    correct.iter().copied().collect();
                picked_set == correct_set
            }
            (QuestionKind::Text, AnswerValue::Text(submitted)) => self
                .text_answer
                .as_deref()
                .is_some_and(|expected| {
                    submitted.trim().to_lowercase() == expected.trim().to_lowercase()
                }),
            _ => false,
        }
    }

    /// The stored correct answer as it appears in answer records.
    pub fn correct_answer_value(&self) -> serde_json::Value {
        match (&self.correct, &self.text_answer) {
            (Some(CorrectAnswer::Index(index)), _) => serde_json::json!(index),
            (Some(CorrectAnswer::Indices(indices)), _) => serde_json::json!(indices),
            (None, Some(text)) => serde_json::json!(text),
            (None, None) => serde_json::Value::Null,
        }
    }
}

/// Question copy safe to put on the wire while the round is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedQuestion {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub points: i64,
    #[serde(rename = "timeLimit")]
    pub time_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Quiz with questions resolved from their id references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<Question>,
}

/// Immutable per-user, per-question outcome row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub user_answer: Option<AnswerValue>,
    pub correct_answer: serde_json::Value,
    pub is_correct: bool,
    pub points_earned: i64,
    pub possible_points: i64,
    pub missed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// One row of the final leaderboard, ordered by placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub place: usize,
    pub username: String,
    pub score: i64,
    pub user_id: String,
    pub tab_switches: u32,
}

/// Per-student summary written to `games/{game_id}/results/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentResult {
    pub user_id: String,
    pub username: String,
    pub score: i64,
    pub placement: usize,
    pub total_questions: usize,
    pub total_players: usize,
    pub tab_switches: u32,
    pub answers: Vec<AnswerRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_question() -> Question {
        Question {
            question: "2+2".into(),
            kind: QuestionKind::Single,
            options: Some(vec!["3".into(), "4".into(), "5".into()]),
            correct: Some(CorrectAnswer::Index(1)),
            text_answer: None,
            point: 10,
            time_limit: 30,
            explanation: None,
        }
    }

    #[test]
    fn grades_single_choice_by_index() {
        let question = single_question();
        assert!(question.grade(&AnswerValue::Choice(1)));
        assert!(!question.grade(&AnswerValue::Choice(0)));
        assert!(!question.grade(&AnswerValue::Choice(-1)));
    }

    #[test]
    fn mismatched_answer_shape_is_incorrect() {
        let question = single_question();
        assert!(!question.grade(&AnswerValue::Choices(vec![1])));
        assert!(!question.grade(&AnswerValue::Text("4".into())));
    }

    #[test]
    fn grades_multiple_choice_as_set_equality() {
        let question = Question {
            question: "pick primes".into(),
            kind: QuestionKind::Multiple,
            options: Some(vec!["2".into(), "3".into(), "4".into()]),
            correct: Some(CorrectAnswer::Indices(vec![0, 1])),
            text_answer: None,
            point: 1,
            time_limit: 20,
            explanation: None,
        };
        assert!(question.grade(&AnswerValue::Choices(vec![1, 0])));
        assert!(question.grade(&AnswerValue::Choices(vec![0, 1, 1])));
        assert!(!question.grade(&AnswerValue::Choices(vec![0])));
        assert!(!question.grade(&AnswerValue::Choices(vec![0, 1, 2])));
        assert!(!question.grade(&AnswerValue::Choice(0)));
    }

    #[test]
    fn grades_text_ignoring_case_and_whitespace() {
        let question = Question {
            question: "capital of France".into(),
            kind: QuestionKind::Text,
            options: None,
            correct: None,
            text_answer: Some("Paris".into()),
            point: 2,
            time_limit: 15,
            explanation: None,
        };
        assert!(question.grade(&AnswerValue::Text("  paris ".into())));
        assert!(question.grade(&AnswerValue::Text("PARIS".into())));
        assert!(!question.grade(&AnswerValue::Text("Lyon".into())));
    }

    #[test]
    fn sanitized_copy_strips_reveal_fields() {
        let question = single_question();
        let sanitized = serde_json::to_value(question.sanitized()).unwrap();
        assert!(sanitized.get("correct").is_none());
        assert!(sanitized.get("textAnswer").is_none());
        assert_eq!(sanitized["points"], 10);
        assert_eq!(sanitized["timeLimit"], 30);
        assert_eq!(sanitized["type"], "single");
        // the stored question keeps its answer key
        assert_eq!(question.correct, Some(CorrectAnswer::Index(1)));
    }

    #[test]
    fn answer_value_decodes_by_shape() {
        assert_eq!(
            serde_json::from_value::<AnswerValue>(serde_json::json!(2)).unwrap(),
            AnswerValue::Choice(2)
        );
        assert_eq!(
            serde_json::from_value::<AnswerValue>(serde_json::json!([0, 2])).unwrap(),
            AnswerValue::Choices(vec![0, 2])
        );
        assert_eq!(
            serde_json::from_value::<AnswerValue>(serde_json::json!("Paris")).unwrap(),
            AnswerValue::Text("Paris".into())
        );
    }

    #[test]
    fn question_document_round_trips_wire_names() {
        let question: Question = serde_json::from_value(serde_json::json!({
            "question": "q",
            "type": "text",
            "textAnswer": "ok",
            "timeLimit": 20
        }))
        .unwrap();
        assert_eq!(question.kind, QuestionKind::Text);
        assert_eq!(question.point, 1, "point defaults to 1");
        assert_eq!(question.text_answer.as_deref(), Some("ok"));
    }
}
