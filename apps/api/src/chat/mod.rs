// Conversational assistant: append-only transcript, one completion request per user turn.
// All completion calls go through llm_client: no direct HTTP here.

pub mod handlers;
pub mod machine;
pub mod prompts;
pub mod reply;
pub mod request;
pub mod session;
pub mod transcript;
