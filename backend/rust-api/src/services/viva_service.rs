use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use crate::config::ExamConfig;
use crate::models::{
    ConcludeVivaRequest, ConcludeVivaResponse, HistoryResponse, NextQuestionRequest,
    NextQuestionResponse, RecordTurnRequest, RecordTurnResponse, SessionStatus, StartVivaRequest,
    StartVivaResponse, VivaFeedback, VivaSession, VivaSessionDetailResponse, VivaSessionSummary,
    VivaTurn,
};
use crate::services::contract::{build_contract, ContractParams};
use crate::services::gemini_service::AgentProvisioner;
use crate::services::store::{QuestionStore, SessionStore};
use crate::utils::retry::{retry_async, RetryConfig};

/// Error taxonomy for every viva operation. Ownership and not-found checks
/// run before any mutation; a rejected operation leaves the record as-is.
#[derive(Debug, Error)]
pub enum VivaError {
    #[error("viva session {0} not found")]
    NotFound(String),
    #[error("no questions available for this topic and class level")]
    NoQuestionsAvailable,
    #[error("session does not belong to the requesting user")]
    Forbidden,
    #[error("session is already {}", .status.as_str())]
    InvalidState { status: SessionStatus },
    /// The session was persisted but no credential was issued. Not rolled
    /// back: the caller gets the id and can retry or delete the orphan.
    #[error("credential provisioning failed for session {session_id}")]
    Provisioning {
        session_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("session store failure")]
    Store(#[from] anyhow::Error),
}

/// Business logic for the viva lifecycle: session CRUD with ownership
/// enforcement, behavioral-contract provisioning, and reconciliation of the
/// agent's tool calls into the session record.
pub struct VivaService {
    sessions: Arc<dyn SessionStore>,
    questions: Arc<dyn QuestionStore>,
    provisioner: Arc<dyn AgentProvisioner>,
    exam: ExamConfig,
}

impl VivaService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        questions: Arc<dyn QuestionStore>,
        provisioner: Arc<dyn AgentProvisioner>,
        exam: ExamConfig,
    ) -> Self {
        Self {
            sessions,
            questions,
            provisioner,
            exam,
        }
    }

    /// Create a session and provision its live-conversation credential.
    ///
    /// The session is persisted before the provisioner is called, so the
    /// credential always references a real record. A provisioner failure
    /// surfaces as [`VivaError::Provisioning`] with the session id; the
    /// record itself stays `in_progress`.
    pub async fn start(
        &self,
        req: StartVivaRequest,
        owner_id: &str,
    ) -> Result<StartVivaResponse, VivaError> {
        let session_type = req.session_type.unwrap_or_default();
        let voice_name = req
            .voice_name
            .clone()
            .unwrap_or_else(|| self.exam.default_voice.clone());

        let session = VivaSession {
            id: None,
            student_name: req.student_name.clone(),
            user_id: owner_id.to_string(),
            title: req.topic.clone(),
            session_type,
            topic: req.topic.clone(),
            class_level: req.class_level,
            started_at: Utc::now(),
            ended_at: None,
            status: SessionStatus::InProgress,
            feedback: None,
            turns: Vec::new(),
        };

        let session_id = self.sessions.insert(session).await?;

        tracing::info!("Viva session created: {} for user {}", session_id, owner_id);

        let contract = build_contract(&ContractParams {
            student_name: req.student_name,
            topic: req.topic,
            class_level: req.class_level,
            session_type,
            voice_name: req.voice_name,
            protocol: self.exam.protocol,
            session_duration_minutes: self.exam.session_duration_minutes,
        });

        // Credential never outlives the declared session duration.
        let ttl = Duration::minutes(self.exam.session_duration_minutes);

        let credential = retry_async(RetryConfig::default(), || {
            self.provisioner.provision(&contract, ttl)
        })
        .await
        .map_err(|source| VivaError::Provisioning {
            session_id: session_id.clone(),
            source,
        })?;

        Ok(StartVivaResponse {
            viva_session_id: session_id,
            ephemeral_token: credential.token,
            model: credential.model_name,
            session_duration_minutes: self.exam.session_duration_minutes,
            voice_name,
        })
    }

    /// Finalize a session with the agent's scoring. Owner-only and strictly
    /// one-way: concluding anything but an `in_progress` session is a
    /// conflict, never a silent no-op.
    pub async fn conclude(
        &self,
        session_id: &str,
        req: ConcludeVivaRequest,
        requester_id: &str,
    ) -> Result<ConcludeVivaResponse, VivaError> {
        let mut session = self.get_owned(session_id, requester_id).await?;

        if session.status != SessionStatus::InProgress {
            return Err(VivaError::InvalidState {
                status: session.status,
            });
        }

        session.feedback = Some(VivaFeedback {
            score: req.score,
            summary: req.summary.clone(),
            strong_points: req.strong_points,
            areas_of_improvement: req.areas_of_improvement,
        });
        session.status = SessionStatus::Completed;
        session.ended_at = Some(Utc::now());

        self.sessions.save(&session).await?;

        tracing::info!(
            "Viva session concluded: {} with score {}",
            session_id,
            req.score
        );

        Ok(ConcludeVivaResponse {
            status: SessionStatus::Completed,
            score: req.score,
            final_feedback: req.summary,
        })
    }

    pub async fn get_details(
        &self,
        session_id: &str,
    ) -> Result<VivaSessionDetailResponse, VivaError> {
        let session = self.get_session(session_id).await?;

        Ok(VivaSessionDetailResponse {
            viva_session_id: session_id.to_string(),
            student_name: session.student_name,
            title: session.title,
            topic: session.topic,
            class_level: session.class_level,
            started_at: session.started_at,
            ended_at: session.ended_at,
            status: session.status,
            feedback: session.feedback,
        })
    }

    /// The requesting user's sessions, most recently started first. Never
    /// anyone else's.
    pub async fn get_history(&self, user_id: &str) -> Result<HistoryResponse, VivaError> {
        let sessions = self.sessions.find_by_owner(user_id).await?;

        let summaries = sessions
            .into_iter()
            .map(|session| VivaSessionSummary {
                viva_session_id: session.id.map(|oid| oid.to_hex()).unwrap_or_default(),
                title: session.title,
                topic: session.topic,
                class_level: session.class_level,
                started_at: session.started_at,
                session_type: session.session_type,
                status: session.status,
            })
            .collect();

        Ok(HistoryResponse {
            sessions: summaries,
        })
    }

    pub async fn rename(
        &self,
        session_id: &str,
        new_title: &str,
        requester_id: &str,
    ) -> Result<(), VivaError> {
        let mut session = self.get_owned(session_id, requester_id).await?;

        session.title = new_title.to_string();
        self.sessions.save(&session).await?;

        Ok(())
    }

    pub async fn delete(&self, session_id: &str, requester_id: &str) -> Result<(), VivaError> {
        self.get_owned(session_id, requester_id).await?;

        self.sessions.delete(session_id).await?;

        tracing::info!("Viva session deleted: {}", session_id);

        Ok(())
    }

    /// Tool call: pick the next unasked question for this session. Falls
    /// back to any unasked question at the topic/level when the requested
    /// difficulty is exhausted.
    pub async fn next_question(
        &self,
        session_id: &str,
        req: NextQuestionRequest,
    ) -> Result<NextQuestionResponse, VivaError> {
        let session = self.get_session(session_id).await?;

        let asked: Vec<String> = session
            .turns
            .iter()
            .filter_map(|turn| turn.question_id.clone())
            .collect();

        let mut question = self
            .questions
            .find_unasked(&req.topic, req.class_level, Some(req.difficulty), &asked)
            .await?;

        if question.is_none() {
            question = self
                .questions
                .find_unasked(&req.topic, req.class_level, None, &asked)
                .await?;
        }

        let question = question.ok_or(VivaError::NoQuestionsAvailable)?;

        Ok(NextQuestionResponse {
            question_text: question.question_text,
            difficulty: question.difficulty,
            question_id: question.id.to_hex(),
        })
    }

    /// Tool call: append one evaluated question/answer exchange. Turn ids
    /// are sequential from 1; existing turns are never rewritten. Repeated
    /// calls for the same question append repeated turns; deduplication is
    /// the agent's problem, not ours.
    pub async fn record_turn(
        &self,
        session_id: &str,
        req: RecordTurnRequest,
    ) -> Result<RecordTurnResponse, VivaError> {
        let mut session = self.get_session(session_id).await?;

        let turn_id = session.turns.len() as u32 + 1;
        session.turns.push(VivaTurn {
            turn_id,
            question_text: req.question_text,
            difficulty: req.difficulty,
            question_id: req.question_id,
            student_answer_transcription: req.student_answer_transcription,
            ai_evaluation: req.ai_evaluation,
            is_correct: req.is_correct,
            timestamp: Utc::now(),
        });

        // Whole-document read-modify-write: two concurrent appends can lose
        // one (last-writer-wins).
        // TODO: use an atomic $push in MongoSessionStore for turn appends.
        self.sessions.save(&session).await?;

        Ok(RecordTurnResponse { turn_id })
    }

    async fn get_session(&self, session_id: &str) -> Result<VivaSession, VivaError> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| VivaError::NotFound(session_id.to_string()))
    }

    async fn get_owned(
        &self,
        session_id: &str,
        requester_id: &str,
    ) -> Result<VivaSession, VivaError> {
        let session = self.get_session(session_id).await?;

        if session.user_id != requester_id {
            tracing::warn!(
                "User {} denied access to session {} they do not own",
                requester_id,
                session_id
            );
            return Err(VivaError::Forbidden);
        }

        Ok(session)
    }
}
