//! Axum route handlers for the mock recommendation flow.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::recommendation::analyzer::{FileHandle, RecommendationResult};
use crate::recommendation::flow::RecommendationStatus;
use crate::sessions::require_session;
use crate::state::AppState;

const SKILLS_FIELD: &str = "skills";
const RESUME_FIELD: &str = "resume";

/// POST /api/v1/sessions/:id/analyze
///
/// Multipart body: optional `skills` text field, optional `resume` file field.
/// Only the resume's file name is read; its bytes are skipped.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<RecommendationResult>, AppError> {
    let session = require_session(&state, id).await?;

    let mut skills_text = String::new();
    let mut file: Option<FileHandle> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some(SKILLS_FIELD) => {
                skills_text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid skills field: {e}")))?;
            }
            Some(RESUME_FIELD) => {
                file = field
                    .file_name()
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| FileHandle {
                        name: name.to_string(),
                    });
            }
            _ => {}
        }
    }

    let result = session
        .recommendations
        .analyze(state.analyzer.as_ref(), &skills_text, file.as_ref())
        .await?;

    Ok(Json(result))
}

/// GET /api/v1/sessions/:id/recommendations
pub async fn handle_get_recommendations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecommendationStatus>, AppError> {
    let session = require_session(&state, id).await?;
    Ok(Json(session.recommendations.status()))
}
