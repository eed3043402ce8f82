//! Axum route handlers for session lifecycle.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::chat::handlers::ChatSnapshot;
use crate::errors::AppError;
use crate::recommendation::flow::RecommendationStatus;
use crate::sessions::{require_session, Session};
use crate::state::AppState;

/// Everything a client needs to render both panes.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub chat: ChatSnapshot,
    pub recommendations: RecommendationStatus,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            chat: session.chat.snapshot().into(),
            recommendations: session.recommendations.status(),
        }
    }
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let session = state.sessions.create().await?;
    Ok((StatusCode::CREATED, Json(SessionSnapshot::from(session.as_ref()))))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = require_session(&state, id).await?;
    Ok(Json(SessionSnapshot::from(session.as_ref())))
}

/// DELETE /api/v1/sessions/:id
///
/// Teardown: aborts any in-flight chat request and forgets the session.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}
