//! # Pipeline Configuration
//!
//! Every knob the pipeline exposes lives here: the model tier
//! hierarchy, pacing intervals, crawl budgets, and the target language
//! set. Defaults mirror production values; tests override the timing
//! fields with millisecond intervals.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rough cost bucket for a model tier. Informational only; the
/// fallback order is driven by `priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostClass {
    Premium,
    Standard,
    Economy,
}

/// One entry in the model fallback hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTier {
    /// Model identifier passed verbatim to the provider API.
    pub name: String,
    /// Lower value means tried earlier. Ties keep declaration order.
    pub priority: u8,
    pub cost_class: CostClass,
}

impl ModelTier {
    pub fn new(name: impl Into<String>, priority: u8, cost_class: CostClass) -> Self {
        Self {
            name: name.into(),
            priority,
            cost_class,
        }
    }
}

/// ISO 639-1 language code. Always two ASCII lowercase letters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(code: &str) -> Result<Self, PipelineError> {
        let code = code.trim().to_ascii_lowercase();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(PipelineError::invalid_input(format!(
                "language code must be two ASCII letters, got '{code}'"
            )));
        }
        Ok(Self(code))
    }

    /// For hardcoded codes known to be well formed.
    pub(crate) fn known(code: &str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn english() -> Self {
        Self::known("en")
    }

    /// Human-readable name used in prompts. Falls back to the raw code
    /// for languages outside the default set.
    pub fn display_name(&self) -> &str {
        match self.0.as_str() {
            "en" => "English",
            "fr" => "French (Français)",
            "it" => "Italian (Italiano)",
            "es" => "Spanish (Español)",
            "de" => "German (Deutsch)",
            "nl" => "Dutch (Nederlands)",
            "pt" => "Portuguese (Português)",
            _ => self.0.as_str(),
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Controls the model fallback loop and its pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Fallback hierarchy. Sorted by `priority` at gateway construction.
    pub tiers: Vec<ModelTier>,
    /// Minimum gap between any two model calls, process-wide.
    pub min_interval: Duration,
    /// Gap enforced after a rate-limit signal, replacing `min_interval`
    /// for the next call only.
    pub rate_limit_cooldown: Duration,
    /// Number of full hierarchy passes before giving up.
    pub max_restarts: u32,
    /// Pause between hierarchy passes.
    pub restart_pause: Duration,
    /// Upper bound on a single model call.
    pub call_timeout: Duration,
    /// Responses shorter than this (after sanitization) are treated as
    /// malformed.
    pub min_response_len: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            min_interval: Duration::from_secs(15),
            rate_limit_cooldown: Duration::from_secs(90),
            max_restarts: 3,
            restart_pause: Duration::from_secs(10),
            call_timeout: Duration::from_secs(60),
            min_response_len: 20,
        }
    }
}

fn default_tiers() -> Vec<ModelTier> {
    vec![
        ModelTier::new("gemini-2.5-pro", 1, CostClass::Premium),
        ModelTier::new("gemini-2.5-flash", 2, CostClass::Standard),
        ModelTier::new("gemini-2.5-flash-lite", 3, CostClass::Economy),
        ModelTier::new("gemini-2.0-flash", 4, CostClass::Standard),
        ModelTier::new("gemini-2.0-flash-lite", 5, CostClass::Economy),
        ModelTier::new("gemini-1.5-flash", 6, CostClass::Economy),
        ModelTier::new("gemini-1.5-pro", 7, CostClass::Premium),
        ModelTier::new("gemini-1.5-flash-8b", 8, CostClass::Economy),
    ]
}

/// Controls the site probe: validation fetch, crawl, and signal
/// harvesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Timeout for the primary GET against the tool URL.
    pub navigation_timeout: Duration,
    /// Timeout for each secondary request (HEAD fallback, crawl pages).
    pub request_timeout: Duration,
    /// Total pages fetched during the same-origin crawl, including the
    /// landing page.
    pub crawl_page_budget: usize,
    /// Politeness delay between crawl requests.
    pub crawl_delay: Duration,
    /// Characters of stripped text kept per crawled page.
    pub excerpt_chars: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            crawl_page_budget: 5,
            crawl_delay: Duration::from_secs(1),
            excerpt_chars: 2000,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub gateway: GatewayConfig,
    pub probe: ProbeConfig,
    /// Languages to translate into. English is always synthesized and
    /// imported directly, never listed here.
    pub target_languages: Vec<LanguageCode>,
    /// Concurrent in-flight translation calls. They still serialize on
    /// the gateway clock; this bounds memory and task count.
    pub max_concurrent_translations: usize,
    /// Minimum complete-or-partial target languages for the run to be
    /// marked accepted.
    pub min_accepted_languages: usize,
    /// Appended to meta titles when non-empty.
    pub brand_suffix: String,
    /// Wall-clock budget for the translation stage of one run.
    pub run_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            probe: ProbeConfig::default(),
            target_languages: default_languages(),
            max_concurrent_translations: 2,
            min_accepted_languages: 1,
            brand_suffix: String::new(),
            run_deadline: Duration::from_secs(1800),
        }
    }
}

fn default_languages() -> Vec<LanguageCode> {
    ["fr", "it", "es", "de", "nl", "pt"]
        .iter()
        .map(|c| LanguageCode::known(c))
        .collect()
}
