//! Axum route handlers for the chat assistant.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use uuid::Uuid;

use crate::chat::machine::{ChatState, ChatStatus};
use crate::chat::transcript::{Transcript, Turn};
use crate::errors::AppError;
use crate::sessions::require_session;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// What a client needs to render the chat pane.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSnapshot {
    pub turns: Transcript,
    pub status: ChatStatus,
    pub pending: bool,
}

impl From<ChatState> for ChatSnapshot {
    fn from(state: ChatState) -> Self {
        Self {
            pending: state.is_pending(),
            status: state.status,
            turns: state.turns,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub reply: Turn,
    pub chat: ChatSnapshot,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/chat
///
/// Appends the user turn, waits for the assistant turn, and returns it with the
/// updated chat state. 400 on an empty message, 409 while a reply is pending.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let session = require_session(&state, id).await?;
    let chat = Arc::clone(&session.chat);
    let llm = Arc::clone(&state.llm);

    // Detached so a client disconnect does not abort the exchange; session teardown does.
    let reply = tokio::spawn(async move { chat.submit(&request.message, llm).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("chat exchange task failed: {e}")))??;

    Ok(Json(SubmitResponse {
        reply,
        chat: session.chat.snapshot().into(),
    }))
}

/// GET /api/v1/sessions/:id/chat/events
///
/// Server-sent `chat` events carrying a `ChatSnapshot`, starting with the current state.
pub async fn handle_chat_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let session = require_session(&state, id).await?;

    let stream = WatchStream::new(session.chat.subscribe())
        .map(|chat| Event::default().event("chat").json_data(ChatSnapshot::from(chat)));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
