//! Pure transcript state machine.
//!
//! `transition` has no I/O: given a state and an event it returns the next
//! state, the turn it appended, and the effects the caller must run.

use serde::Serialize;
use thiserror::Error;

use crate::chat::prompts::APOLOGY;
use crate::chat::reply::Reply;
use crate::chat::request::build_request;
use crate::chat::transcript::{Transcript, Turn};
use crate::llm_client::GenerateContentRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Idle,
    /// Exactly one completion request is in flight.
    AwaitingReply,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub turns: Transcript,
    pub status: ChatStatus,
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            turns: Transcript::seeded(),
            status: ChatStatus::Idle,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChatStatus::AwaitingReply
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Submit { message: String },
    ReplyReceived(Reply),
    /// Transport error, timeout, cancellation, or an unparseable body.
    ReplyFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send this payload to the completion service and feed the outcome back in.
    RequestCompletion(GenerateContentRequest),
}

#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    /// Every accepted event appends exactly one turn.
    pub appended: Turn,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("a reply is already pending; wait for it before sending another message")]
    Busy,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(state: &ChatState, event: ChatEvent) -> Result<TransitionResult, ChatError> {
    match (state.status, event) {
        (_, ChatEvent::Submit { message }) if message.trim().is_empty() => {
            Err(ChatError::EmptyMessage)
        }

        (ChatStatus::AwaitingReply, ChatEvent::Submit { .. }) => Err(ChatError::Busy),

        // Idle + Submit -> AwaitingReply; the request carries the new turn too.
        (ChatStatus::Idle, ChatEvent::Submit { message }) => {
            let turn = Turn::user(message.trim());
            let mut turns = state.turns.clone();
            turns.push(turn.clone());
            let request = build_request(&turns);
            Ok(TransitionResult {
                new_state: ChatState {
                    turns,
                    status: ChatStatus::AwaitingReply,
                },
                appended: turn,
                effects: vec![Effect::RequestCompletion(request)],
            })
        }

        (ChatStatus::AwaitingReply, ChatEvent::ReplyReceived(reply)) => {
            Ok(settle(state, Turn::assistant(reply.text, reply.sources)))
        }

        (ChatStatus::AwaitingReply, ChatEvent::ReplyFailed) => {
            Ok(settle(state, Turn::assistant(APOLOGY, vec![])))
        }

        (ChatStatus::Idle, event) => Err(ChatError::InvalidTransition(format!(
            "{event:?} while idle"
        ))),
    }
}

fn settle(state: &ChatState, turn: Turn) -> TransitionResult {
    let mut turns = state.turns.clone();
    turns.push(turn.clone());
    TransitionResult {
        new_state: ChatState {
            turns,
            status: ChatStatus::Idle,
        },
        appended: turn,
        effects: vec![],
    }
}
