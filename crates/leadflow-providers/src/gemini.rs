//! Google Gemini responder.
//!
//! Calls the `generateContent` endpoint with an ordered model preference
//! list. Rate-limit and overload responses (429/503) are retried per model
//! with exponential backoff plus jitter; anything else abandons the model
//! immediately. Either way the next model in the list gets its turn, and
//! only when every model is exhausted does `generate` return `Ok(None)`.

use async_trait::async_trait;
use leadflow_core::{
    config::AiConfig,
    error::LeadflowError,
    traits::{HistoryEntry, Responder},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Fixed reply used when no API key is configured. The user always gets an
/// acknowledgement in this mode — never silence.
const UNAVAILABLE_REPLY: &str = "Desculpe, meu sistema de IA não está configurado no momento.";

/// Upper bound for the random jitter added to each backoff delay, in ms.
const JITTER_MAX_MS: u64 = 1000;

/// Google Gemini responder with model-degradation chain.
pub struct GeminiResponder {
    client: reqwest::Client,
    /// `None` = disabled (no credential at construction).
    api_key: Option<String>,
    models: Vec<String>,
    max_retries: u32,
    base_delay_ms: u64,
}

impl GeminiResponder {
    /// Create from config values. An empty API key disables the responder.
    pub fn from_config(config: &AiConfig) -> Self {
        if config.api_key.is_empty() {
            warn!("gemini: no API key configured, AI replies disabled");
        }
        Self {
            client: reqwest::Client::new(),
            api_key: (!config.api_key.is_empty()).then(|| config.api_key.clone()),
            models: config.models.clone(),
            max_retries: config.max_retries.max(1),
            base_delay_ms: config.base_delay_ms,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Run the bounded retry loop for a single model.
    async fn try_model(&self, model: &str, body: &GeminiRequest) -> Result<String, CallFailure> {
        let mut last_failure = None;

        for attempt in 0..self.max_retries {
            match self.call_once(model, body).await {
                Ok(text) => return Ok(text),
                Err(failure) => {
                    let final_attempt = attempt + 1 == self.max_retries;
                    if !failure.retryable || final_attempt {
                        return Err(failure);
                    }

                    let delay = self.base_delay_ms * 2u64.pow(attempt);
                    let jitter = rand::thread_rng().gen_range(0..JITTER_MAX_MS);
                    warn!(
                        "gemini {model}: attempt {}/{} failed ({}), retrying in {}ms",
                        attempt + 1,
                        self.max_retries,
                        failure.detail,
                        delay + jitter
                    );
                    last_failure = Some(failure);
                    tokio::time::sleep(Duration::from_millis(delay + jitter)).await;
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| CallFailure {
            retryable: false,
            detail: "retry budget exhausted".into(),
        }))
    }

    async fn call_once(&self, model: &str, body: &GeminiRequest) -> Result<String, CallFailure> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let url = format!("{GEMINI_BASE_URL}/models/{model}:generateContent?key={api_key}");
        debug!("gemini: POST models/{model}:generateContent");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CallFailure {
                // Network-level failures are transient by assumption.
                retryable: true,
                detail: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CallFailure {
                retryable: is_retryable_status(status.as_u16()),
                detail: format!("{status}: {text}"),
            });
        }

        let parsed: GeminiResponse = resp.json().await.map_err(|e| CallFailure {
            retryable: false,
            detail: format!("parse failed: {e}"),
        })?;

        parsed
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.is_empty())
            .ok_or(CallFailure {
                retryable: false,
                detail: "empty response".into(),
            })
    }
}

/// One failed call, classified for the retry loop.
struct CallFailure {
    retryable: bool,
    detail: String,
}

/// Rate-limited or transiently overloaded.
fn is_retryable_status(status: u16) -> bool {
    status == 429 || status == 503
}

/// Translate history into the alternating turn sequence the API requires.
///
/// Any leading run of bot-authored turns is trimmed — the first turn must
/// be a human one.
fn build_contents(history: &[HistoryEntry], new_message: &str) -> Vec<GeminiContent> {
    let trimmed = history
        .iter()
        .position(|entry| !entry.from_me)
        .map(|first_user| &history[first_user..])
        .unwrap_or(&[]);

    let mut contents: Vec<GeminiContent> = trimmed
        .iter()
        .map(|entry| GeminiContent {
            role: Some(if entry.from_me { "model" } else { "user" }.to_string()),
            parts: vec![GeminiPart {
                text: entry.body.clone(),
            }],
        })
        .collect();

    contents.push(GeminiContent {
        role: Some("user".to_string()),
        parts: vec![GeminiPart {
            text: new_message.to_string(),
        }],
    });

    contents
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 200,
            temperature: 0.9,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[async_trait]
impl Responder for GeminiResponder {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        history: &[HistoryEntry],
        new_message: &str,
    ) -> Result<Option<String>, LeadflowError> {
        if self.api_key.is_none() {
            return Ok(Some(UNAVAILABLE_REPLY.to_string()));
        }

        let body = GeminiRequest {
            contents: build_contents(history, new_message),
            generation_config: GenerationConfig::default(),
        };

        for model in &self.models {
            match self.try_model(model, &body).await {
                Ok(text) => return Ok(Some(text)),
                Err(failure) => {
                    warn!("gemini {model} exhausted: {}", failure.detail);
                }
            }
        }

        warn!("gemini: all {} models exhausted, no reply", self.models.len());
        Ok(None)
    }
}
