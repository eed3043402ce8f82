//! `ChatSession`: runs the pure state machine against a completion service.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an await.
//! Every new state is published on a `watch` channel for subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::machine::{transition, ChatError, ChatEvent, ChatState, Effect};
use crate::chat::reply::extract_reply;
use crate::chat::transcript::Turn;
use crate::llm_client::{CompletionService, GenerateContentRequest, LlmError};

pub struct ChatSession {
    session_id: Uuid,
    state: Mutex<ChatState>,
    updates: watch::Sender<ChatState>,
    cancel: CancellationToken,
    timeout: Duration,
}

impl ChatSession {
    pub fn new(session_id: Uuid, timeout: Duration) -> Self {
        let initial = ChatState::new();
        let (updates, _) = watch::channel(initial.clone());
        Self {
            session_id,
            state: Mutex::new(initial),
            updates,
            cancel: CancellationToken::new(),
            timeout,
        }
    }

    pub fn snapshot(&self) -> ChatState {
        self.lock_state().clone()
    }

    /// Receives every state the session moves through, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.updates.subscribe()
    }

    /// Aborts the in-flight request, if any. Its exchange settles with the apology turn.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn lock_state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, event: ChatEvent) -> Result<Applied, ChatError> {
        let mut state = self.lock_state();
        let result = transition(&state, event)?;
        *state = result.new_state;
        self.updates.send_replace(state.clone());
        Ok(Applied {
            turn: result.appended,
            effects: result.effects,
            turns: state.turns.len(),
        })
    }

    /// Appends the user turn and moves to `AwaitingReply` synchronously.
    ///
    /// Rejects empty messages and any submit while a reply is pending, leaving
    /// the state untouched. The returned `PendingReply` must be resolved to
    /// complete the exchange; dropping it settles the exchange as failed.
    pub fn begin(self: &Arc<Self>, message: &str) -> Result<PendingReply, ChatError> {
        let applied = self.apply(ChatEvent::Submit {
            message: message.to_string(),
        })?;

        info!(
            session_id = %self.session_id,
            chars = applied.turn.text.len(),
            turns = applied.turns,
            "Chat message submitted"
        );

        let mut pending = PendingReply {
            session: Arc::clone(self),
            request: None,
            settled: false,
        };
        for effect in applied.effects {
            match effect {
                Effect::RequestCompletion(request) => pending.request = Some(request),
            }
        }
        Ok(pending)
    }

    /// `begin` followed by `resolve`.
    pub async fn submit(
        self: &Arc<Self>,
        message: &str,
        llm: Arc<dyn CompletionService>,
    ) -> Result<Turn, ChatError> {
        self.begin(message)?.resolve(llm).await
    }
}

/// Outcome of one accepted transition.
struct Applied {
    turn: Turn,
    effects: Vec<Effect>,
    /// Transcript length after the transition.
    turns: usize,
}

/// The single in-flight exchange of a `ChatSession`.
pub struct PendingReply {
    session: Arc<ChatSession>,
    request: Option<GenerateContentRequest>,
    settled: bool,
}

impl PendingReply {
    /// Runs the completion request and appends exactly one assistant turn.
    ///
    /// Transport errors, timeouts, cancellation, and unparseable bodies all
    /// become the apology turn; they never surface as errors.
    pub async fn resolve(mut self, llm: Arc<dyn CompletionService>) -> Result<Turn, ChatError> {
        let session = Arc::clone(&self.session);
        let start = Instant::now();

        let outcome = match self.request.take() {
            Some(request) => {
                tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => Err(LlmError::Cancelled),
                    result = tokio::time::timeout(session.timeout, llm.generate(&request)) => {
                        result.unwrap_or(Err(LlmError::Timeout(session.timeout)))
                    }
                }
            }
            None => Err(LlmError::Cancelled),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let (event, failure) = match outcome {
            Ok(response) => (ChatEvent::ReplyReceived(extract_reply(&response)), None),
            Err(e) => (ChatEvent::ReplyFailed, Some(e)),
        };
        let sources = match &event {
            ChatEvent::ReplyReceived(reply) => reply.sources.len(),
            _ => 0,
        };

        self.settled = true;
        let applied = session.apply(event)?;

        match failure {
            None => info!(
                session_id = %session.session_id,
                model = %llm.model_id(),
                sources,
                turns = applied.turns,
                duration_ms,
                "Chat reply received"
            ),
            Some(e) => warn!(
                session_id = %session.session_id,
                model = %llm.model_id(),
                turns = applied.turns,
                duration_ms,
                error = %e,
                "Chat request failed"
            ),
        }
        Ok(applied.turn)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(
            session_id = %self.session.session_id,
            "Pending chat reply dropped before settling"
        );
        if let Err(e) = self.session.apply(ChatEvent::ReplyFailed) {
            warn!(error = %e, "Failed to settle dropped chat reply");
        }
    }
}
