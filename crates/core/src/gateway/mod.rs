//! # Model Gateway
//!
//! Single entry point for model calls. Owns the tier fallback loop:
//! tiers are tried in priority order, the whole hierarchy restarts a
//! bounded number of times, and every call is paced through one shared
//! rate-limiter clock. Callers see either a usable reply or
//! `HierarchyExhausted`; rate limits and malformed output never leak.

pub mod client;
pub mod hierarchy;
pub mod rate_limit;

use crate::config::{GatewayConfig, ModelTier};
use crate::content::{AttemptOutcome, GenerationAttempt};
use crate::error::PipelineError;
use crate::sanitize::sanitize;
use chrono::Utc;
use client::{ModelCallError, ModelClient, RawResponse};
use hierarchy::{HierarchyCursor, Step};
use rate_limit::RateLimiter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A successful gateway call, with the full attempt trail.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    /// Sanitized response text from the winning attempt.
    pub text: String,
    /// The raw value the winning tier returned.
    pub raw: RawResponse,
    pub attempts: Vec<GenerationAttempt>,
    pub winning_tier: String,
    /// Completed hierarchy passes before the win. Zero when a tier in
    /// the first pass answered.
    pub restarts_used: u32,
}

pub struct ModelGateway {
    tiers: Vec<ModelTier>,
    client: Arc<dyn ModelClient>,
    limiter: RateLimiter,
    max_restarts: u32,
    restart_pause: Duration,
    call_timeout: Duration,
    min_response_len: usize,
}

impl ModelGateway {
    pub fn new(config: &GatewayConfig, client: Arc<dyn ModelClient>) -> Self {
        let mut tiers = config.tiers.clone();
        tiers.sort_by_key(|t| t.priority);
        Self {
            tiers,
            client,
            limiter: RateLimiter::new(config.min_interval, config.rate_limit_cooldown),
            max_restarts: config.max_restarts,
            restart_pause: config.restart_pause,
            call_timeout: config.call_timeout,
            min_response_len: config.min_response_len,
        }
    }

    /// Runs one prompt through the fallback hierarchy.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn call(&self, prompt: &str) -> Result<GatewayReply, PipelineError> {
        if prompt.trim().is_empty() {
            return Err(PipelineError::invalid_input("prompt is empty"));
        }

        let mut attempts = Vec::new();
        let mut last_errors: HashMap<String, String> = HashMap::new();
        let mut cursor = HierarchyCursor::new(self.tiers.len(), self.max_restarts);

        loop {
            if self.tiers.is_empty() {
                break;
            }
            let tier = &self.tiers[cursor.tier_index()];

            self.limiter.acquire().await;
            let started_at = Utc::now();
            let started = Instant::now();
            let result = match tokio::time::timeout(
                self.call_timeout,
                self.client.generate(tier, prompt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ModelCallError::Fatal(format!(
                    "call exceeded {}s timeout",
                    self.call_timeout.as_secs()
                ))),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(raw) => {
                    let text = sanitize(&raw);
                    if text.trim().len() >= self.min_response_len {
                        tracing::info!(
                            tier = %tier.name,
                            restarts = cursor.restarts(),
                            attempts = attempts.len() + 1,
                            "model call succeeded"
                        );
                        attempts.push(GenerationAttempt {
                            tier: tier.name.clone(),
                            outcome: AttemptOutcome::Success,
                            error: None,
                            raw_preview: Some(preview(&text)),
                            started_at,
                            duration_ms,
                        });
                        return Ok(GatewayReply {
                            text,
                            raw,
                            attempts,
                            winning_tier: tier.name.clone(),
                            restarts_used: cursor.restarts(),
                        });
                    }
                    let msg = "response too short or empty".to_string();
                    tracing::warn!(tier = %tier.name, len = text.trim().len(), "{msg}");
                    attempts.push(GenerationAttempt {
                        tier: tier.name.clone(),
                        outcome: AttemptOutcome::Malformed,
                        error: Some(msg.clone()),
                        raw_preview: Some(preview(&text)),
                        started_at,
                        duration_ms,
                    });
                    last_errors.insert(tier.name.clone(), msg);
                }
                Err(ModelCallError::RateLimited(msg)) => {
                    tracing::warn!(tier = %tier.name, "rate limited, extending cooldown");
                    self.limiter.note_rate_limited().await;
                    attempts.push(GenerationAttempt {
                        tier: tier.name.clone(),
                        outcome: AttemptOutcome::RateLimited,
                        error: Some(msg.clone()),
                        raw_preview: None,
                        started_at,
                        duration_ms,
                    });
                    last_errors.insert(tier.name.clone(), msg);
                }
                Err(ModelCallError::Malformed(msg)) => {
                    tracing::warn!(tier = %tier.name, error = %msg, "malformed response");
                    attempts.push(GenerationAttempt {
                        tier: tier.name.clone(),
                        outcome: AttemptOutcome::Malformed,
                        error: Some(msg.clone()),
                        raw_preview: None,
                        started_at,
                        duration_ms,
                    });
                    last_errors.insert(tier.name.clone(), msg);
                }
                Err(ModelCallError::Fatal(msg)) => {
                    tracing::warn!(tier = %tier.name, error = %msg, "tier failed");
                    attempts.push(GenerationAttempt {
                        tier: tier.name.clone(),
                        outcome: AttemptOutcome::Fatal,
                        error: Some(msg.clone()),
                        raw_preview: None,
                        started_at,
                        duration_ms,
                    });
                    last_errors.insert(tier.name.clone(), msg);
                }
            }

            match cursor.advance() {
                Step::NextTier => {}
                Step::Restart => {
                    tracing::warn!(
                        pass = cursor.restarts(),
                        max = self.max_restarts,
                        "hierarchy exhausted, restarting from top tier"
                    );
                    if !self.restart_pause.is_zero() {
                        tokio::time::sleep(self.restart_pause).await;
                    }
                }
                Step::Exhausted => break,
            }
        }

        let tier_errors = self
            .tiers
            .iter()
            .map(|t| {
                let err = last_errors
                    .get(&t.name)
                    .cloned()
                    .unwrap_or_else(|| "not attempted".to_string());
                (t.name.clone(), err)
            })
            .collect();
        Err(PipelineError::HierarchyExhausted {
            restarts: cursor.restarts(),
            tier_errors,
        })
    }
}

fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 200;
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostClass;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Script {
        Reply(&'static str),
        RateLimited,
        Fatal,
        Malformed,
    }

    struct ScriptedClient {
        scripts: HashMap<String, Script>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(scripts: Vec<(&str, Script)>) -> Self {
            Self {
                scripts: scripts
                    .into_iter()
                    .map(|(name, s)| (name.to_string(), s))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_log(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn generate(
            &self,
            tier: &ModelTier,
            _prompt: &str,
        ) -> Result<RawResponse, ModelCallError> {
            self.calls.lock().unwrap().push(tier.name.clone());
            match self.scripts.get(&tier.name) {
                Some(Script::Reply(text)) => Ok(RawResponse::Text(text.to_string())),
                Some(Script::RateLimited) => {
                    Err(ModelCallError::RateLimited("HTTP 429".into()))
                }
                Some(Script::Fatal) => Err(ModelCallError::Fatal("HTTP 500".into())),
                Some(Script::Malformed) => {
                    Err(ModelCallError::Malformed("no choices".into()))
                }
                None => Err(ModelCallError::Fatal("unscripted tier".into())),
            }
        }
    }

    fn fast_config(tiers: Vec<ModelTier>, max_restarts: u32) -> GatewayConfig {
        GatewayConfig {
            tiers,
            min_interval: Duration::ZERO,
            rate_limit_cooldown: Duration::from_millis(5),
            max_restarts,
            restart_pause: Duration::ZERO,
            call_timeout: Duration::from_secs(5),
            min_response_len: 1,
        }
    }

    fn three_tiers() -> Vec<ModelTier> {
        vec![
            ModelTier::new("tier-a", 1, CostClass::Premium),
            ModelTier::new("tier-b", 2, CostClass::Standard),
            ModelTier::new("tier-c", 3, CostClass::Economy),
        ]
    }

    #[tokio::test]
    async fn test_falls_through_tiers_in_priority_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("tier-a", Script::Fatal),
            ("tier-b", Script::Fatal),
            ("tier-c", Script::Reply("the winning answer")),
        ]));
        let gateway = ModelGateway::new(&fast_config(three_tiers(), 3), client.clone());

        let reply = gateway.call("prompt").await.unwrap();
        assert_eq!(reply.winning_tier, "tier-c");
        assert_eq!(reply.text, "the winning answer");
        assert_eq!(reply.restarts_used, 0);
        assert_eq!(reply.attempts.len(), 3);
        assert_eq!(reply.attempts[0].outcome, AttemptOutcome::Fatal);
        assert_eq!(reply.attempts[1].outcome, AttemptOutcome::Fatal);
        assert_eq!(reply.attempts[2].outcome, AttemptOutcome::Success);
        assert_eq!(client.call_log(), vec!["tier-a", "tier-b", "tier-c"]);
    }

    #[tokio::test]
    async fn test_total_failure_attempts_every_tier_on_every_pass() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("tier-a", Script::Fatal),
            ("tier-b", Script::Malformed),
            ("tier-c", Script::Fatal),
        ]));
        let gateway = ModelGateway::new(&fast_config(three_tiers(), 3), client.clone());

        let err = gateway.call("prompt").await.unwrap_err();
        match err {
            PipelineError::HierarchyExhausted {
                restarts,
                tier_errors,
            } => {
                assert_eq!(restarts, 3);
                assert_eq!(tier_errors.len(), 3);
                assert_eq!(tier_errors[1].0, "tier-b");
                assert!(tier_errors[1].1.contains("no choices"));
            }
            other => panic!("expected HierarchyExhausted, got {other:?}"),
        }
        assert_eq!(client.call_log().len(), 9);
    }

    #[tokio::test]
    async fn test_rate_limits_do_not_count_as_restarts() {
        let tiers: Vec<ModelTier> = (1..=8)
            .map(|i| ModelTier::new(format!("tier-{i}"), i, CostClass::Standard))
            .collect();
        let mut scripts: Vec<(String, Script)> = (1..=7)
            .map(|i| (format!("tier-{i}"), Script::RateLimited))
            .collect();
        scripts.push(("tier-8".to_string(), Script::Reply("finally an answer")));
        let client = Arc::new(ScriptedClient::new(
            scripts.iter().map(|(n, s)| (n.as_str(), s.clone())).collect(),
        ));
        let gateway = ModelGateway::new(&fast_config(tiers, 3), client);

        let reply = gateway.call("prompt").await.unwrap();
        assert_eq!(reply.winning_tier, "tier-8");
        assert_eq!(reply.restarts_used, 0);
        assert_eq!(
            reply
                .attempts
                .iter()
                .filter(|a| a.outcome == AttemptOutcome::RateLimited)
                .count(),
            7
        );
    }

    #[tokio::test]
    async fn test_short_response_is_malformed_and_advances() {
        let mut config = fast_config(three_tiers(), 1);
        config.min_response_len = 20;
        let client = Arc::new(ScriptedClient::new(vec![
            ("tier-a", Script::Reply("too short")),
            ("tier-b", Script::Reply("this reply is comfortably long enough")),
        ]));
        let gateway = ModelGateway::new(&config, client);

        let reply = gateway.call("prompt").await.unwrap();
        assert_eq!(reply.winning_tier, "tier-b");
        assert_eq!(reply.attempts[0].outcome, AttemptOutcome::Malformed);
        assert_eq!(
            reply.attempts[0].error.as_deref(),
            Some("response too short or empty")
        );
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected_before_any_call() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "tier-a",
            Script::Reply("never reached"),
        )]));
        let gateway = ModelGateway::new(&fast_config(three_tiers(), 3), client.clone());

        let err = gateway.call("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(client.call_log().is_empty());
    }
}
