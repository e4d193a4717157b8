//! # Model Client
//!
//! The transport seam between the gateway and a provider. The gateway
//! only sees `RawResponse` values and classified errors; everything
//! HTTP-specific stays in `HttpModelClient`.

use crate::config::ModelTier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// What a model boundary can hand back. Providers occasionally return
/// bare numbers, booleans, or nulls where text was expected; the
/// sanitizer makes all of these usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    Text(String),
    Number(f64),
    Bool(bool),
    Json(serde_json::Value),
    Null,
}

impl From<serde_json::Value> for RawResponse {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Null => Self::Null,
            other => Self::Json(other),
        }
    }
}

/// Tier-local failure classification. These drive the fallback loop
/// and never surface past the gateway.
#[derive(Debug, Clone, Error)]
pub enum ModelCallError {
    /// Provider signalled throttling (HTTP 429 or overload). Triggers
    /// the extended cooldown before the next call.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call completed but the payload is unusable.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Anything else: auth failures, timeouts, transport errors. The
    /// tier is skipped without special pacing.
    #[error("model call failed: {0}")]
    Fatal(String),
}

/// A provider capable of answering one prompt against one model tier.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, tier: &ModelTier, prompt: &str) -> Result<RawResponse, ModelCallError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
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
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    /// Deserialized as a raw value so a provider returning structured
    /// content instead of a string still flows through.
    content: serde_json::Value,
}

/// OpenAI-compatible chat completions client.
pub struct HttpModelClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    max_tokens: u32,
}

impl HttpModelClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            max_tokens: 8192,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(&self, tier: &ModelTier, prompt: &str) -> Result<RawResponse, ModelCallError> {
        let request = ChatCompletionRequest {
            model: &tier.name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelCallError::Fatal(format!("request timed out: {e}"))
                } else {
                    ModelCallError::Fatal(format!("transport error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("HTTP {}: {}", status.as_u16(), truncate(&body, 300));
            return Err(match status.as_u16() {
                429 | 503 => ModelCallError::RateLimited(detail),
                _ => ModelCallError::Fatal(detail),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(format!("invalid response body: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelCallError::Malformed("response contained no choices".into()))?;

        Ok(RawResponse::from(choice.message.content))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_from_json_values() {
        assert_eq!(
            RawResponse::from(serde_json::json!("hello")),
            RawResponse::Text("hello".into())
        );
        assert_eq!(RawResponse::from(serde_json::json!(42)), RawResponse::Number(42.0));
        assert_eq!(RawResponse::from(serde_json::json!(true)), RawResponse::Bool(true));
        assert_eq!(RawResponse::from(serde_json::Value::Null), RawResponse::Null);

        let obj = serde_json::json!({"overview": "text"});
        assert_eq!(RawResponse::from(obj.clone()), RawResponse::Json(obj));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
