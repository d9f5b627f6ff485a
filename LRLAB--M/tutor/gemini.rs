use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{
    client::{ChatMessage, TutorClient, TutorError},
    config::TutorConfig,
};

/// `generateContent` client for the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiClient {
    /// Builds the HTTP client from tutor settings.
    pub fn new(config: &TutorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("lrlab-tutor/0.1")
            .build()
            .context("building tutor http client")?;
        Ok(Self {
            client,
            url: generate_url(&config.endpoint, &config.model),
            api_key: config.api_key().map(str::to_string),
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl TutorClient for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
    ) -> Result<String, TutorError> {
        let api_key = self.api_key.as_deref().ok_or(TutorError::MissingApiKey)?;
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&request_body(system_instruction, history))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| TutorError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TutorError::Status(status.as_u16()));
        }
        let payload = response
            .json::<Value>()
            .await
            .map_err(|err| TutorError::Malformed(err.to_string()))?;
        extract_text(&payload)
    }
}

/// `{endpoint}/models/{model}:generateContent`.
#[must_use]
pub fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

/// JSON body carrying the persona and the conversation.
#[must_use]
pub fn request_body(system_instruction: &str, history: &[ChatMessage]) -> Value {
    let contents: Vec<Value> = history
        .iter()
        .map(|msg| json!({ "role": msg.role, "parts": [{ "text": msg.text }] }))
        .collect();
    json!({
        "systemInstruction": { "parts": [{ "text": system_instruction }] },
        "contents": contents,
    })
}

/// Concatenated text parts of the first candidate. An empty string means the
/// model answered with nothing usable.
pub fn extract_text(payload: &Value) -> Result<String, TutorError> {
    let Some(candidates) = payload.get("candidates").and_then(Value::as_array) else {
        return Err(TutorError::Malformed("missing candidates".into()));
    };
    let Some(first) = candidates.first() else {
        return Ok(String::new());
    };
    let text = first
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(text)
}
