//! Mock completion backend for tests. No network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use super::{CompletionService, GenerateContentRequest, GenerateContentResponse, LlmError};

/// Returns queued replies in order and records every request it receives.
///
/// With a gate installed, each call waits for `Notify::notify_one` before
/// answering, which keeps a request "in flight" for as long as a test needs.
pub struct MockCompletionService {
    replies: Mutex<VecDeque<Result<GenerateContentResponse, LlmError>>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
    gate: Option<Arc<Notify>>,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn queue_response(&self, response: GenerateContentResponse) {
        self.replies.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Api {
                    status: 500,
                    message: "no queued mock reply".to_string(),
                })
            })
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

/// A response whose first candidate carries `text` and no grounding data.
pub fn text_response(text: &str) -> GenerateContentResponse {
    serde_json::from_value(json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    }))
    .unwrap()
}

/// A response carrying `text` plus one grounding attribution per `(uri, title)`.
pub fn grounded_response(text: &str, sources: &[(&str, &str)]) -> GenerateContentResponse {
    let attributions: Vec<_> = sources
        .iter()
        .map(|(uri, title)| json!({"web": {"uri": uri, "title": title}}))
        .collect();
    serde_json::from_value(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "groundingMetadata": {"groundingAttributions": attributions}
        }]
    }))
    .unwrap()
}
