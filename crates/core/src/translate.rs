//! # Translation Orchestrator
//!
//! Fans the English field set out into every target language. Each
//! language is an independent state machine; one language failing,
//! stalling, or coming back partial never touches its siblings. All
//! model calls still serialize through the shared gateway clock.

use crate::config::LanguageCode;
use crate::content::{ContentFieldSet, ToolRecord, TranslationFields, TranslationResult};
use crate::events::{PipelineEvent, PipelineEventKind};
use crate::gateway::client::RawResponse;
use crate::gateway::ModelGateway;
use crate::prompts;
use crate::sanitize::{
    clamp_meta_description, clamp_meta_title, clamp_two_sentences, sanitize_field,
    strip_json_wrapper, PartialExtractor,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Lifecycle of one language within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageState {
    Pending,
    InFlight,
    Complete,
    Partial,
    Missing,
    Failed,
}

impl LanguageState {
    pub fn start(self) -> Self {
        debug_assert_eq!(self, Self::Pending);
        Self::InFlight
    }

    pub fn settle(self, result: &TranslationResult) -> Self {
        debug_assert_eq!(self, Self::InFlight);
        if result.error.is_some() {
            return Self::Failed;
        }
        match result.status {
            crate::content::Completeness::Complete => Self::Complete,
            crate::content::Completeness::Partial => Self::Partial,
            crate::content::Completeness::Missing => Self::Missing,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::InFlight)
    }
}

pub struct TranslationOrchestrator {
    gateway: Arc<ModelGateway>,
    extractor: Arc<dyn PartialExtractor>,
    languages: Vec<LanguageCode>,
    max_concurrent: usize,
    brand_suffix: String,
}

impl TranslationOrchestrator {
    pub fn new(
        gateway: Arc<ModelGateway>,
        extractor: Arc<dyn PartialExtractor>,
        languages: Vec<LanguageCode>,
        max_concurrent: usize,
        brand_suffix: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            extractor,
            languages,
            max_concurrent: max_concurrent.max(1),
            brand_suffix: brand_suffix.into(),
        }
    }

    /// Translates into every configured language and returns the full
    /// result map, the imported English entry included. Always returns
    /// one entry per language; failures become `Missing` results.
    #[tracing::instrument(skip_all, fields(tool = %tool.name, languages = self.languages.len()))]
    pub async fn translate_all(
        &self,
        tool: &ToolRecord,
        english: &ContentFieldSet,
        budget: Duration,
        events: &UnboundedSender<PipelineEvent>,
    ) -> BTreeMap<LanguageCode, TranslationResult> {
        let mut results = BTreeMap::new();
        results.insert(
            LanguageCode::english(),
            TranslationResult::imported_english(english),
        );

        let english_fields = Arc::new(TranslationFields::from_english(english));
        let deadline = tokio::time::Instant::now() + budget;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();

        for language in self.languages.clone() {
            let gateway = Arc::clone(&self.gateway);
            let extractor = Arc::clone(&self.extractor);
            let english_fields = Arc::clone(&english_fields);
            let semaphore = Arc::clone(&semaphore);
            let tool = tool.clone();
            let brand_suffix = self.brand_suffix.clone();
            let events = events.clone();

            join_set.spawn(async move {
                let mut state = LanguageState::Pending;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        language.clone(),
                        TranslationResult::failed(language, "orchestrator shut down".into()),
                    );
                };
                state = state.start();
                let _ = events.send(
                    PipelineEvent::new(PipelineEventKind::TranslationStarted, "translate")
                        .with_language(language.clone()),
                );

                let result = match tokio::time::timeout_at(
                    deadline,
                    translate_one(
                        &gateway,
                        extractor.as_ref(),
                        &tool,
                        &english_fields,
                        &language,
                        &brand_suffix,
                    ),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => TranslationResult::failed(
                        language.clone(),
                        "translation budget exceeded".into(),
                    ),
                };

                state = state.settle(&result);
                let kind = if result.error.is_some() {
                    PipelineEventKind::TranslationFailed
                } else {
                    PipelineEventKind::TranslationCompleted
                };
                let _ = events.send(
                    PipelineEvent::new(kind, "translate")
                        .with_language(language.clone())
                        .with_data(serde_json::json!({
                            "state": format!("{state:?}"),
                            "quality_score": result.quality_score,
                        })),
                );
                (language, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((language, result)) => {
                    results.insert(language, result);
                }
                Err(e) => tracing::error!(error = %e, "translation task panicked"),
            }
        }
        results
    }
}

async fn translate_one(
    gateway: &ModelGateway,
    extractor: &dyn PartialExtractor,
    tool: &ToolRecord,
    english: &TranslationFields,
    language: &LanguageCode,
    brand_suffix: &str,
) -> TranslationResult {
    let prompt = prompts::translation_prompt(tool, english, language, brand_suffix);
    let reply = match gateway.call(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(language = %language, error = %e, "translation failed");
            return TranslationResult::failed(language.clone(), e.to_string());
        }
    };

    let payload = strip_json_wrapper(&reply.text);
    let mut fields = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Object(map)) => {
            let mut fields = TranslationFields::default();
            for name in TranslationFields::FIELD_NAMES {
                if let Some(value) = map.get(name) {
                    let text = field_text(value, name);
                    if !text.is_empty() {
                        fields.set(name, text);
                    }
                }
            }
            fields
        }
        _ => TranslationFields::default(),
    };
    if fields.filled_count() == 0 {
        tracing::warn!(language = %language, "strict parse yielded nothing, extracting partial fields");
        fields = extractor.extract(&reply.text, &tool.name, language);
    }
    enforce_constraints(&mut fields, brand_suffix);

    let result = TranslationResult::from_model_fields(language.clone(), fields);
    tracing::info!(
        language = %language,
        status = ?result.status,
        quality = result.quality_score,
        "translation finished"
    );
    result
}

/// A field value may be a string, a list, or something stranger; lists
/// are joined line by line, everything else goes through the sanitizer.
fn field_text(value: &serde_json::Value, hint: &str) -> String {
    if let serde_json::Value::Array(items) = value {
        return items
            .iter()
            .map(|item| sanitize_field(&RawResponse::from(item.clone()), hint))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
    }
    sanitize_field(&RawResponse::from(value.clone()), hint)
}

fn enforce_constraints(fields: &mut TranslationFields, brand_suffix: &str) {
    if let Some(overview) = fields.overview.as_deref() {
        fields.overview = Some(clamp_two_sentences(overview));
    }
    if let Some(title) = fields.meta_title.as_deref() {
        fields.meta_title = Some(clamp_meta_title(title, brand_suffix));
    }
    if let Some(desc) = fields.meta_description.as_deref() {
        fields.meta_description = Some(clamp_meta_description(desc));
    }
}
