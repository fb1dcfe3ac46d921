//! Gemini reply source.
//!
//! Calls the Gemini `generateContent` REST endpoint with the WebScraper
//! system instruction. The API key comes from `GEMINI_API_KEY`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ChatConfig, ReplyProviderKind};
use crate::error::{ChatError, ChatResult};
use crate::reply::{CannedReplySource, Reply, ReplyRequest, ReplySource};
use crate::scheduler::{Scheduler, TokioScheduler};

/// Model used when none is configured
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const SYSTEM_PROMPT: &str = "You are WebScraper AI, an intelligent assistant specialized in web scraping and data extraction. \
Your role is to help users extract, analyze, and understand data from websites efficiently. \
Keep responses SHORT and CONCISE. Be direct and action-oriented: provide results, code snippets, or data rather than lengthy explanations. \
When asked about scraping specific sites or data, provide practical solutions immediately. \
Always format your responses in clean Markdown with headings, code blocks, bullet points, and bold text for emphasis.";

const TEMPERATURE: f32 = 0.3;
const MAX_OUTPUT_TOKENS: u32 = 512;
const MAX_RETRIES: u32 = 3;

/// Reply source backed by Gemini
pub struct GeminiReplySource {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
    scheduler: Arc<dyn Scheduler>,
}

impl GeminiReplySource {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            endpoint: API_BASE.to_string(),
            client: reqwest::Client::new(),
            scheduler: Arc::new(TokioScheduler),
        }
    }

    /// Create from `GEMINI_API_KEY`
    pub fn from_env(model: Option<String>) -> ChatResult<Self> {
        match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self::new(key, model)),
            _ => Err(ChatError::LlmNotConfigured),
        }
    }

    /// Point at a different API base, e.g. a local proxy
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Scheduler for the retry backoff
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model)
    }

    fn build_request(request: &ReplyRequest) -> GenerateRequest {
        let mut prompt = request.user_text.clone();
        if !request.sources.is_empty() {
            let listing = request
                .sources
                .iter()
                .map(|s| format!("- {} ({})", s.title, s.url))
                .collect::<Vec<_>>()
                .join("\n");
            prompt.push_str("\n\nSources consulted:\n");
            prompt.push_str(&listing);
        }

        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }

    fn extract_text(response: GenerateResponse) -> ChatResult<String> {
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatError::ReplyProduction("Empty response from Gemini".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl ReplySource for GeminiReplySource {
    async fn produce_reply(&self, request: &ReplyRequest) -> ChatResult<Reply> {
        let body = Self::build_request(request);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s
                let delay = std::time::Duration::from_secs(1 << attempt);
                self.scheduler.sleep(delay).await;
            }

            let response = match self
                .client
                .post(self.url())
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "Gemini request failed, retrying");
                    last_error = Some(ChatError::ReplyProduction(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();

            // Retry on server errors (5xx) and rate limits (429)
            if status.is_server_error() || status.as_u16() == 429 {
                let text = response.text().await.unwrap_or_default();
                warn!(status = %status, attempt = attempt + 1, "Gemini request failed, retrying");
                last_error = Some(ChatError::ReplyProduction(format!(
                    "Gemini API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    text
                )));
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ChatError::ReplyProduction(format!(
                    "Gemini API error {}: {}",
                    status, text
                )));
            }

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| ChatError::ReplyProduction(format!("Failed to parse response: {}", e)))?;

            let text = Self::extract_text(parsed)?;
            debug!(model = %self.model, chars = text.len(), "Gemini reply received");
            return Ok(Reply::new(text));
        }

        Err(last_error.unwrap_or_else(|| ChatError::ReplyProduction("Max retries exceeded".to_string())))
    }
}

/// Build the reply source selected by the configuration
pub fn reply_source_for(config: &ChatConfig) -> ChatResult<Arc<dyn ReplySource>> {
    match config.provider {
        ReplyProviderKind::Mock => Ok(Arc::new(CannedReplySource)),
        ReplyProviderKind::Gemini => Ok(Arc::new(GeminiReplySource::from_env(Some(config.model.clone()))?)),
    }
}

// Gemini API types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InstantScheduler;
    use crate::types::ScrapedSource;
    use std::time::Duration;

    #[test]
    fn test_default_model() {
        let source = GeminiReplySource::new("key", None);
        assert_eq!(source.model(), "gemini-2.5-flash-lite");
        assert!(source.url().ends_with("/gemini-2.5-flash-lite:generateContent"));

        let custom = GeminiReplySource::new("key", Some("gemini-pro".to_string())).with_endpoint("http://localhost:9/");
        assert_eq!(custom.url(), "http://localhost:9/gemini-pro:generateContent");
    }

    #[test]
    fn test_request_body_shape() {
        let request = ReplyRequest::new("price of macbook")
            .with_sources(vec![ScrapedSource::new("https://www.amazon.com", "Amazon", "")]);
        let body = serde_json::to_value(GeminiReplySource::build_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.starts_with("price of macbook"));
        assert!(prompt.contains("- Amazon (https://www.amazon.com)"));
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"there"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(GeminiReplySource::extract_text(response).unwrap(), "Hello there");
    }

    #[test]
    fn test_empty_candidates_is_an_error() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        let err = GeminiReplySource::extract_text(response).unwrap_err();
        assert!(matches!(err, ChatError::ReplyProduction(_)));
    }

    #[tokio::test]
    async fn test_network_failures_retry_with_backoff() {
        let scheduler = Arc::new(InstantScheduler::new());
        // Nothing listens on the discard port
        let source = GeminiReplySource::new("key", None)
            .with_endpoint("http://127.0.0.1:9")
            .with_scheduler(scheduler.clone());

        let err = source.produce_reply(&ReplyRequest::new("hello")).await.unwrap_err();
        assert!(matches!(err, ChatError::ReplyProduction(ref msg) if msg.starts_with("Network error")));
        assert_eq!(
            scheduler.requested(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_mock_provider_needs_no_key() {
        assert!(reply_source_for(&ChatConfig::default()).is_ok());
    }
}
