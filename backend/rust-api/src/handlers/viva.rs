use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::Principal,
    models::{
        ConcludeVivaRequest, NextQuestionRequest, RecordTurnRequest, RenameSessionRequest,
        StartVivaRequest,
    },
    services::{
        viva_service::{VivaError, VivaService},
        AppState,
    },
};

/// Session ids are store-assigned 24-hex tokens. Anything else is rejected
/// here, before any store round-trip.
fn validate_session_id(id: &str) -> Result<(), VivaApiError> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| VivaApiError::bad_request("Invalid session id"))
}

fn viva_service(state: &AppState) -> VivaService {
    VivaService::new(
        state.sessions.clone(),
        state.questions.clone(),
        state.provisioner.clone(),
        state.config.exam.clone(),
    )
}

fn validated<T: Validate>(payload: T) -> Result<T, VivaApiError> {
    payload
        .validate()
        .map_err(|e| VivaApiError::bad_request(e.to_string()))?;
    Ok(payload)
}

pub async fn start_viva(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    AppJson(payload): AppJson<StartVivaRequest>,
) -> Result<impl IntoResponse, VivaApiError> {
    let payload = validated(payload)?;

    tracing::info!(
        "Starting viva for user {}: topic={}, class_level={}",
        principal.user_id,
        payload.topic,
        payload.class_level
    );

    let response = viva_service(&state)
        .start(payload, &principal.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn conclude_viva(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(principal): Extension<Principal>,
    AppJson(payload): AppJson<ConcludeVivaRequest>,
) -> Result<impl IntoResponse, VivaApiError> {
    validate_session_id(&session_id)?;
    let payload = validated(payload)?;

    let response = viva_service(&state)
        .conclude(&session_id, payload, &principal.user_id)
        .await?;

    Ok(Json(response))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, VivaApiError> {
    let response = viva_service(&state).get_history(&principal.user_id).await?;

    Ok(Json(response))
}

/// Public by policy: result pages are shareable links, so no bearer token
/// and no ownership check here. Every mutating route stays owner-checked.
pub async fn get_session_details(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, VivaApiError> {
    validate_session_id(&session_id)?;

    let response = viva_service(&state).get_details(&session_id).await?;

    Ok(Json(response))
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(principal): Extension<Principal>,
    AppJson(payload): AppJson<RenameSessionRequest>,
) -> Result<impl IntoResponse, VivaApiError> {
    validate_session_id(&session_id)?;
    let payload = validated(payload)?;

    viva_service(&state)
        .rename(&session_id, &payload.new_title, &principal.user_id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Session renamed successfully"
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, VivaApiError> {
    validate_session_id(&session_id)?;

    viva_service(&state)
        .delete(&session_id, &principal.user_id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Session deleted successfully"
    })))
}

pub async fn next_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(payload): AppJson<NextQuestionRequest>,
) -> Result<impl IntoResponse, VivaApiError> {
    validate_session_id(&session_id)?;
    let payload = validated(payload)?;

    let response = viva_service(&state)
        .next_question(&session_id, payload)
        .await?;

    Ok(Json(response))
}

pub async fn record_turn(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(payload): AppJson<RecordTurnRequest>,
) -> Result<impl IntoResponse, VivaApiError> {
    validate_session_id(&session_id)?;
    let payload = validated(payload)?;

    let response = viva_service(&state)
        .record_turn(&session_id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Transport-facing error. Internal failures are logged in full here and
/// cross the trust boundary as generic messages only.
#[derive(Debug)]
pub enum VivaApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    BadGateway {
        message: String,
        viva_session_id: String,
    },
    Internal(String),
}

impl VivaApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        VivaApiError::BadRequest(message.into())
    }
}

impl From<VivaError> for VivaApiError {
    fn from(err: VivaError) -> Self {
        match err {
            VivaError::NotFound(id) => {
                VivaApiError::NotFound(format!("Viva session {} not found", id))
            }
            VivaError::NoQuestionsAvailable => VivaApiError::NotFound(
                "No questions available for this topic and class level".to_string(),
            ),
            VivaError::Forbidden => {
                VivaApiError::Forbidden("You do not have access to this session".to_string())
            }
            VivaError::InvalidState { status } => VivaApiError::Conflict(format!(
                "Session is already {} and cannot be concluded again",
                status.as_str()
            )),
            VivaError::Provisioning { session_id, source } => {
                tracing::error!(
                    "Credential provisioning failed for session {}: {:#}",
                    session_id,
                    source
                );
                VivaApiError::BadGateway {
                    message: "Failed to provision the live session credential. \
                              The session was created; retry or delete it."
                        .to_string(),
                    viva_session_id: session_id,
                }
            }
            VivaError::Store(source) => {
                tracing::error!("Session store failure: {:#}", source);
                VivaApiError::Internal("Internal error. Please try again.".to_string())
            }
        }
    }
}

impl IntoResponse for VivaApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            VivaApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            VivaApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "message": msg })),
            VivaApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            VivaApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "message": msg })),
            VivaApiError::BadGateway {
                message,
                viva_session_id,
            } => (
                StatusCode::BAD_GATEWAY,
                json!({ "message": message, "viva_session_id": viva_session_id }),
            ),
            VivaApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}
