use std::sync::Arc;

use crate::llm_client::CompletionService;
use crate::recommendation::analyzer::Analyzer;
use crate::sessions::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Completion backend. Default: GeminiClient. Tests swap in a mock.
    pub llm: Arc<dyn CompletionService>,
    /// Pluggable analysis backend. Default: MockAnalyzer.
    pub analyzer: Arc<dyn Analyzer>,
}
