//! # Pipeline Events
//!
//! Progress events emitted during a pipeline run. Collected into the
//! final report and optionally streamed over a channel for live
//! observers.

use crate::config::LanguageCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Run started for a tool
    RunStarted,
    /// Site probe finished (success or degraded)
    ProbeCompleted,
    /// English synthesis finished
    EnglishCompleted,
    /// Translation call dispatched for a language
    TranslationStarted,
    /// Translation finished for a language (complete or partial)
    TranslationCompleted,
    /// Translation ended in error for a language
    TranslationFailed,
    /// Run finished with a report
    RunCompleted,
    /// Run aborted with a fatal error
    RunFailed,
}

/// An event in a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: PipelineEventKind,
    /// Stage that produced this event
    pub stage: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Related language if applicable
    #[serde(default)]
    pub language: Option<LanguageCode>,
}

impl PipelineEvent {
    /// Create a new event
    pub fn new(kind: PipelineEventKind, stage: &str) -> Self {
        Self {
            id: event_id(),
            timestamp: Utc::now(),
            kind,
            stage: stage.to_string(),
            data: None,
            language: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Add a language to the event
    pub fn with_language(mut self, language: LanguageCode) -> Self {
        self.language = Some(language);
        self
    }
}

/// Generate a simple unique event ID
fn event_id() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
