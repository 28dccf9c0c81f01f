//! VLM interaction: build the vision request and call the completion service.
//!
//! This module turns one encoded candidate image plus the prompt into a
//! single-turn chat-completion request and hands back the service's
//! top-level JSON object. It is intentionally thin: prompt text lives in
//! [`crate::prompts`], and what to do with a failure is decided by the
//! orchestrator.
//!
//! ## Errors are data
//!
//! A rejected request, an HTTP 5xx, a dropped connection or a timeout is a
//! routine outcome when talking to a busy external service, not an
//! exceptional one. [`VisionClient::complete`] therefore never returns
//! `Err`: every outcome is an [`InferenceResponse`], and failures carry an
//! `error` object exactly like the ones the service itself sends. That
//! object is what gets quarantined for the operator.
//!
//! There are no retries here. Re-running the tool resubmits only the
//! candidates that have no record yet.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Outcome of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResponse {
    /// The service answered with a response object that has no `error` key.
    Completed(Value),
    /// The service returned an `error` object, or the call never produced a
    /// usable response. Always carries an `error` key.
    Failed(Value),
}

impl InferenceResponse {
    /// Classify a response object by the presence of a top-level `error` key.
    pub fn classify(body: Value) -> Self {
        if body.get("error").is_some() {
            InferenceResponse::Failed(body)
        } else {
            InferenceResponse::Completed(body)
        }
    }

    /// A failure synthesised on the client side (transport, timeout, …).
    pub fn client_error(kind: &str, message: impl Into<String>) -> Self {
        InferenceResponse::Failed(json!({
            "error": { "type": kind, "message": message.into() }
        }))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, InferenceResponse::Failed(_))
    }

    /// The full response object, as it should be quarantined.
    pub fn raw(&self) -> &Value {
        match self {
            InferenceResponse::Completed(v) | InferenceResponse::Failed(v) => v,
        }
    }

    /// `choices[0].message.content` of a completed response.
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            InferenceResponse::Completed(v) => v.pointer("/choices/0/message/content")?.as_str(),
            InferenceResponse::Failed(_) => None,
        }
    }

    /// Human-readable summary of a failed response.
    pub fn error_message(&self) -> Option<String> {
        let error = match self {
            InferenceResponse::Failed(v) => v.get("error")?,
            InferenceResponse::Completed(_) => return None,
        };
        Some(match error {
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        })
    }
}

/// A vision-capable completion service.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Submit one image with the prompt. Never fails: errors come back as
    /// [`InferenceResponse::Failed`].
    async fn complete(&self, prompt: &str, image: &EncodedImage) -> InferenceResponse;
}

/// Chat-completion client for OpenAI-compatible endpoints.
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
}

impl OpenAiVisionClient {
    /// Build a client from the run configuration; resolves the API key.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let api_key = config.resolve_api_key()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.request_timeout_secs,
        })
    }
}

#[async_trait]
impl VisionClient for OpenAiVisionClient {
    async fn complete(&self, prompt: &str, image: &EncodedImage) -> InferenceResponse {
        let body = build_request_body(&self.model, prompt, &image.data_uri(), self.max_tokens);

        let response = match self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return self.transport_failure(e),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => {
                debug!("Inference response: HTTP {}, {} bytes", status, bytes.len());
                interpret_body(status, &bytes)
            }
            Err(e) => self.transport_failure(e),
        }
    }
}

impl OpenAiVisionClient {
    fn transport_failure(&self, e: reqwest::Error) -> InferenceResponse {
        if e.is_timeout() {
            InferenceResponse::client_error(
                "timeout",
                format!("request timed out after {}s", self.timeout_secs),
            )
        } else {
            InferenceResponse::client_error("transport_error", e.to_string())
        }
    }
}

/// The chat-completion request body for one image.
pub fn build_request_body(model: &str, prompt: &str, image_uri: &str, max_tokens: usize) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": image_uri }
                ]
            }
        ],
        "max_tokens": max_tokens
    })
}

/// Turn an HTTP status and body into an [`InferenceResponse`].
///
/// A JSON body with an `error` key is passed through as the service sent
/// it. Other non-2xx statuses and non-JSON bodies are wrapped in a
/// synthesised `error` object that keeps the original body.
pub fn interpret_body(status: u16, body: &[u8]) -> InferenceResponse {
    match serde_json::from_slice::<Value>(body) {
        Ok(v) if v.get("error").is_some() => InferenceResponse::Failed(v),
        Ok(v) if (200..300).contains(&status) => InferenceResponse::Completed(v),
        Ok(v) => InferenceResponse::Failed(json!({
            "error": {
                "type": "http_error",
                "message": format!("HTTP {status}"),
                "status": status,
                "body": v
            }
        })),
        Err(e) => InferenceResponse::Failed(json!({
            "error": {
                "type": "invalid_response",
                "message": format!("HTTP {status}: response body is not JSON ({e})"),
                "status": status,
                "body": String::from_utf8_lossy(body)
            }
        })),
    }
}
