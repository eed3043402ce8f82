//! LLM Client: the single point of entry for all Gemini API calls in Job Match.
//!
//! ARCHITECTURAL RULE: No other module may call the generative-language API directly.
//! All completion requests MUST go through a `CompletionService`.
//!
//! One POST per call. No retries, no backoff, no streaming: the caller decides
//! what a failure means (the chat flow turns every failure into an apology turn).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[cfg(test)]
pub mod testing;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (generateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
    pub system_instruction: Content,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub text: Option<String>,
}

/// Server-side tool toggle. Only web search is ever requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: GoogleSearch {},
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleSearch {}

/// Response side is decoded leniently: a field or list element with an
/// unexpected type reads as absent instead of failing the whole body, so one
/// bad attribution never costs the answer text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<Content>,
    #[serde(default, deserialize_with = "lenient")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub grounding_attributions: Vec<GroundingSource>,
    /// Newer API revisions report sources here instead of in `grounding_attributions`.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub grounding_chunks: Vec<GroundingSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingSource {
    #[serde(default, deserialize_with = "lenient")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSource {
    #[serde(default, deserialize_with = "lenient")]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
}

/// Optional field that reads as `None` when its value has the wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// List that keeps only the elements that decode; a non-array reads as empty.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => vec![],
    })
}

impl GenerateContentResponse {
    /// Decodes a response body.
    ///
    /// Only a body that is not JSON is an error. JSON of any other shape
    /// yields whatever fields could be read, possibly none.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(body)?;
        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Unexpected generateContent response shape");
            Self::default()
        }))
    }

    /// Text of the first part of the first candidate, if any.
    pub fn text(&self) -> Option<&str> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }

    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Service trait
// ────────────────────────────────────────────────────────────────────────────

/// A backend able to answer one `generateContent` request.
///
/// Carried in `AppState` as `Arc<dyn CompletionService>` so tests can swap in a mock.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.chat_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint_url(&config.gemini_api_base, &config.gemini_model),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        })
    }
}

fn endpoint_url(base: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base.trim_end_matches('/'),
        model
    )
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(
                model = %self.model,
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Gemini API returned an error"
            );
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = GenerateContentResponse::from_json(&body)?;

        debug!(
            model = %self.model,
            candidates = parsed.candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini call succeeded"
        );

        Ok(parsed)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        assert_eq!(
            endpoint_url("https://example.test/v1beta/", "gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_serializes_in_api_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), "hello")],
            tools: vec![Tool::google_search()],
            system_instruction: Content::text(None, "be brief"),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "tools": [{"google_search": {}}],
                "systemInstruction": {"parts": [{"text": "be brief"}]}
            })
        );
    }

    #[test]
    fn test_response_text_and_grounding() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Rust is popular."}]},
                "groundingMetadata": {
                    "groundingAttributions": [
                        {"web": {"uri": "https://a.example/x", "title": "A"}}
                    ]
                }
            }]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.text(), Some("Rust is popular."));
        let meta = parsed.first_candidate().unwrap().grounding_metadata.as_ref().unwrap();
        assert_eq!(meta.grounding_attributions.len(), 1);
        assert!(meta.grounding_chunks.is_empty());
    }

    #[test]
    fn test_response_with_unexpected_shape_has_no_text() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(parsed.candidates.is_empty());
        assert_eq!(parsed.text(), None);
    }

    #[test]
    fn test_from_json_only_fails_on_non_json() {
        assert!(GenerateContentResponse::from_json("<html>bad gateway</html>").is_err());

        for body in [
            r#"{"candidates":"oops"}"#,
            r#"[1, 2, 3]"#,
            r#"{"candidates":[{"content":{"parts":[{"text":5}]}}]}"#,
            r#"{"candidates":[{"content":"nope","groundingMetadata":7}]}"#,
        ] {
            let parsed = GenerateContentResponse::from_json(body).unwrap();
            assert_eq!(parsed.text(), None, "body: {body}");
        }
    }

    #[test]
    fn test_from_json_keeps_readable_attributions() {
        let parsed = GenerateContentResponse::from_json(
            r#"{"candidates":[{
                "content":{"parts":[{"text":"Good answer."}]},
                "groundingMetadata":{"groundingAttributions":[
                    {"web":{"uri":"https://ok.example/","title":"OK"}},
                    {"web":{"uri":"https://bad.example/","title":42}},
                    "not an object"
                ]}
            }]}"#,
        )
        .unwrap();

        assert_eq!(parsed.text(), Some("Good answer."));
        let meta = parsed.first_candidate().unwrap().grounding_metadata.as_ref().unwrap();
        assert_eq!(meta.grounding_attributions.len(), 2);
        let titles: Vec<_> = meta
            .grounding_attributions
            .iter()
            .map(|a| a.web.as_ref().and_then(|w| w.title.as_deref()))
            .collect();
        assert_eq!(titles, vec![Some("OK"), None]);
    }

    mod gemini_client {
        use std::collections::HashMap;

        use axum::{
            extract::{Path, Query},
            http::StatusCode,
            routing::post,
            Router,
        };

        use super::super::*;
        use crate::chat::prompts::NO_CLEAR_RESPONSE;
        use crate::chat::reply::extract_reply;

        const API_KEY: &str = "test-key";
        const MODEL: &str = "test-model";

        /// Serves `body` with `status` for the expected model and key, 404 otherwise.
        async fn serve(status: StatusCode, body: &'static str) -> String {
            let app = Router::new().route(
                "/v1beta/models/:call",
                post(
                    move |Path(call): Path<String>,
                          Query(query): Query<HashMap<String, String>>| async move {
                        let expected_call = format!("{MODEL}:generateContent");
                        if call != expected_call
                            || query.get("key").map(String::as_str) != Some(API_KEY)
                        {
                            return (StatusCode::NOT_FOUND, "unexpected endpoint".to_string());
                        }
                        (status, body.to_string())
                    },
                ),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}/v1beta")
        }

        fn client(base: String, api_key: &str) -> GeminiClient {
            GeminiClient::new(&Config {
                gemini_api_key: api_key.to_string(),
                gemini_model: MODEL.to_string(),
                gemini_api_base: base,
                chat_timeout: Duration::from_secs(5),
                analysis_delay: Duration::ZERO,
                session_idle_ttl: Duration::from_secs(60),
                session_sweep_interval: Duration::from_secs(60),
                max_sessions: 1,
                port: 0,
                rust_log: "info".to_string(),
            })
            .unwrap()
        }

        fn request() -> GenerateContentRequest {
            GenerateContentRequest {
                contents: vec![Content::text(Some("user"), "hello")],
                tools: vec![Tool::google_search()],
                system_instruction: Content::text(None, "be brief"),
            }
        }

        #[tokio::test]
        async fn test_bad_attribution_does_not_cost_the_answer() {
            let base = serve(
                StatusCode::OK,
                r#"{"candidates":[{"content":{"parts":[{"text":"Good answer."}]},"groundingMetadata":{"groundingAttributions":[{"web":{"uri":"https://ok.example/","title":"OK"}},{"web":{"uri":"https://bad.example/","title":42}}]}}]}"#,
            )
            .await;

            let response = client(base, API_KEY).generate(&request()).await.unwrap();
            let reply = extract_reply(&response);

            assert_eq!(reply.sources.len(), 1);
            assert_eq!(reply.sources[0].title, "OK");
            assert_eq!(reply.text, "Good answer.\n\nSources:\n1. OK (ok.example)");
        }

        #[tokio::test]
        async fn test_wrong_shape_becomes_fallback_text() {
            for body in [
                r#"{"candidates":"oops"}"#,
                r#"{"candidates":[{"content":{"parts":[{"text":5}]}}]}"#,
            ] {
                let base = serve(StatusCode::OK, body).await;

                let response = client(base, API_KEY).generate(&request()).await.unwrap();
                let reply = extract_reply(&response);

                assert_eq!(reply.text, NO_CLEAR_RESPONSE, "body: {body}");
                assert!(reply.sources.is_empty());
            }
        }

        #[tokio::test]
        async fn test_non_json_body_is_a_parse_error() {
            let base = serve(StatusCode::OK, "upstream hiccup").await;

            let err = client(base, API_KEY).generate(&request()).await.unwrap_err();

            assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
        }

        #[tokio::test]
        async fn test_error_envelope_message_is_surfaced() {
            let base = serve(
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
            )
            .await;

            let err = client(base, API_KEY).generate(&request()).await.unwrap_err();

            match err {
                LlmError::Api { status, message } => {
                    assert_eq!(status, 503);
                    assert_eq!(message, "The model is overloaded.");
                }
                other => panic!("expected API error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_key_is_sent_as_query_parameter() {
            let base = serve(StatusCode::OK, r#"{"candidates":[]}"#).await;

            assert!(client(base.clone(), API_KEY).generate(&request()).await.is_ok());

            let err = client(base, "wrong-key")
                .generate(&request())
                .await
                .unwrap_err();
            assert!(matches!(err, LlmError::Api { status: 404, .. }), "got {err:?}");
        }
    }
}
