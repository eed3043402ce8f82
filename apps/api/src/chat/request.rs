//! Completion request builder: transcript in, `generateContent` payload out.
//!
//! The whole transcript is sent on every call: no truncation or windowing, so
//! request size grows without bound over a long session.

use crate::chat::prompts::SYSTEM_INSTRUCTION;
use crate::chat::transcript::{Role, Transcript};
use crate::llm_client::{Content, GenerateContentRequest, Tool};

/// Role name the API expects for each transcript role.
fn api_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

pub fn build_request(transcript: &Transcript) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: transcript
            .turns()
            .iter()
            .map(|turn| Content::text(Some(api_role(turn.role)), turn.text.clone()))
            .collect(),
        tools: vec![Tool::google_search()],
        system_instruction: Content::text(None, SYSTEM_INSTRUCTION),
    }
}
