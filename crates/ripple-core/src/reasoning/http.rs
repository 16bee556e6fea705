//! OpenAI-compatible chat-completions backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{BackendError, ReasoningBackend};
use crate::config::ReasoningSettings;
use crate::domain::analysis::truncate_utf8;
use crate::domain::{AnalysisContext, PipelineError, PipelineResult};

const SYSTEM_PROMPT: &str = "You review pull requests for a set of interdependent repositories. \
Given the impact summary and diff, assess the cross-repository risk of the change. \
Reply with a single JSON object: {\"summary\": string, \"recommendations\": [string], \
\"risk_level\": \"low\" | \"medium\" | \"high\"}. Do not add any other text.";

/// Longest error body kept in a `Rejected` message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Reasoning backend speaking the `/chat/completions` protocol.
pub struct HttpReasoningBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for HttpReasoningBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReasoningBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpReasoningBackend {
    pub fn from_settings(settings: &ReasoningSettings) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ripple/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.url.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

fn classify_transport(err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Connection(err.to_string())
    }
}

#[async_trait]
impl ReasoningBackend for HttpReasoningBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, context: &AnalysisContext) -> Result<String, BackendError> {
        let prompt = context.render();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_bytes = prompt.len(), "sending reasoning request");
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "reasoning service returned an error");
            return Err(BackendError::from_status(
                status.as_u16(),
                truncate_utf8(&text, MAX_ERROR_BODY),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::InvalidBody(e.to_string())
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| BackendError::InvalidBody("response has no message content".into()))
    }
}
