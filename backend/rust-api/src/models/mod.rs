use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One oral-exam attempt by a student, owned by the user who started it.
///
/// Stored as a single document in the `viva_sessions` collection; feedback
/// and the turn list are embedded, never split into separate collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaSession {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_name: String,
    /// Subject id of the owning principal. Stamped from the verified token
    /// at creation, never from request input.
    pub user_id: String,
    pub title: String,
    pub session_type: SessionType,
    pub topic: String,
    pub class_level: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub feedback: Option<VivaFeedback>,
    /// Question/answer exchanges recorded by the multi-tool protocol.
    /// Append-only; `turn_id` runs 1, 2, 3, ... with no gaps.
    #[serde(default)]
    pub turns: Vec<VivaTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Viva,
    Learn,
}

/// Structured result attached when a session completes. Present iff
/// `status == completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaFeedback {
    pub score: i32,
    pub summary: String,
    pub strong_points: Vec<String>,
    pub areas_of_improvement: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaTurn {
    pub turn_id: u32,
    pub question_text: String,
    pub difficulty: i32,
    pub question_id: Option<String>,
    pub student_answer_transcription: Option<String>,
    pub ai_evaluation: Option<String>,
    pub is_correct: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// A curated question; read-only for this service, maintained out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBankEntry {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub topic: String,
    pub class_level: i32,
    pub difficulty: i32,
    pub question_text: String,
    pub expected_answer_keywords: Option<Vec<String>>,
}

// == API request/response contracts ==

#[derive(Debug, Deserialize, Validate)]
pub struct StartVivaRequest {
    #[validate(length(min = 1, max = 120))]
    pub student_name: String,
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[validate(range(min = 1, max = 12))]
    pub class_level: i32,
    pub session_type: Option<SessionType>,
    pub voice_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartVivaResponse {
    pub viva_session_id: String,
    pub ephemeral_token: String,
    pub model: String,
    pub session_duration_minutes: i64,
    pub voice_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConcludeVivaRequest {
    #[validate(range(min = 0, max = 10))]
    pub score: i32,
    #[validate(length(min = 1))]
    pub summary: String,
    pub strong_points: Vec<String>,
    pub areas_of_improvement: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConcludeVivaResponse {
    pub status: SessionStatus,
    pub score: i32,
    pub final_feedback: String,
}

#[derive(Debug, Serialize)]
pub struct VivaSessionSummary {
    pub viva_session_id: String,
    pub title: String,
    pub topic: String,
    pub class_level: i32,
    pub started_at: DateTime<Utc>,
    pub session_type: SessionType,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub sessions: Vec<VivaSessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct VivaSessionDetailResponse {
    pub viva_session_id: String,
    pub student_name: String,
    pub title: String,
    pub topic: String,
    pub class_level: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub feedback: Option<VivaFeedback>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameSessionRequest {
    #[validate(length(min = 1, max = 200))]
    pub new_title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NextQuestionRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[validate(range(min = 1, max = 12))]
    pub class_level: i32,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: i32,
}

#[derive(Debug, Serialize)]
pub struct NextQuestionResponse {
    pub question_text: String,
    pub difficulty: i32,
    pub question_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordTurnRequest {
    #[validate(length(min = 1))]
    pub question_text: String,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: i32,
    pub question_id: Option<String>,
    pub student_answer_transcription: Option<String>,
    pub ai_evaluation: Option<String>,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RecordTurnResponse {
    pub turn_id: u32,
}
