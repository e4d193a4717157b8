//! # English Content Synthesizer
//!
//! One gateway call produces the full English field set as structured
//! JSON. Strict parsing is attempted first; anything unparseable goes
//! through the partial extractor so a half-good response still yields
//! a partial field set instead of nothing.

use crate::content::{Completeness, ContentFieldSet, GenerationAttempt, ToolRecord, TranslationFields};
use crate::error::PipelineError;
use crate::gateway::client::RawResponse;
use crate::gateway::ModelGateway;
use crate::probe::ProbeReport;
use crate::sanitize::{
    clamp_meta_description, clamp_meta_title, clamp_two_sentences, sanitize_field,
    strip_json_wrapper, PartialExtractor,
};
use crate::{config::LanguageCode, prompts};
use serde::Deserialize;
use std::sync::Arc;

/// The synthesizer's verdict on one tool.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub fields: ContentFieldSet,
    pub completeness: Completeness,
    pub attempts: Vec<GenerationAttempt>,
    pub winning_tier: String,
}

/// Loose mirror of the prompt's JSON shape. Every value is kept raw so
/// a model that answers with numbers or nested structures where text
/// was expected still gets sanitized instead of failing the parse.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEnglish {
    name: serde_json::Value,
    category: serde_json::Value,
    overview: serde_json::Value,
    description: serde_json::Value,
    target_audience: serde_json::Value,
    key_features: serde_json::Value,
    use_cases: serde_json::Value,
    tags: serde_json::Value,
    meta_title: serde_json::Value,
    meta_description: serde_json::Value,
}

pub struct EnglishContentSynthesizer {
    gateway: Arc<ModelGateway>,
    extractor: Arc<dyn PartialExtractor>,
    brand_suffix: String,
}

impl EnglishContentSynthesizer {
    pub fn new(
        gateway: Arc<ModelGateway>,
        extractor: Arc<dyn PartialExtractor>,
        brand_suffix: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            extractor,
            brand_suffix: brand_suffix.into(),
        }
    }

    /// Generates the English field set. The only error that escapes is
    /// `HierarchyExhausted` (or `InvalidInput` for an empty prompt,
    /// which cannot happen with a validated tool record).
    #[tracing::instrument(skip(self, tool, probe), fields(tool = %tool.name))]
    pub async fn synthesize(
        &self,
        tool: &ToolRecord,
        probe: Option<&ProbeReport>,
    ) -> Result<SynthesisOutcome, PipelineError> {
        let prompt = prompts::english_synthesis_prompt(tool, probe);
        let reply = self.gateway.call(&prompt).await?;

        let payload = strip_json_wrapper(&reply.text);
        let mut fields = match serde_json::from_str::<RawEnglish>(payload) {
            Ok(raw) => raw.into_field_set(),
            Err(e) => {
                tracing::warn!(error = %e, "strict parse failed, falling back to partial extraction");
                let partial =
                    self.extractor
                        .extract(&reply.text, &tool.name, &LanguageCode::english());
                field_set_from_partial(partial)
            }
        };
        self.apply_constraints(&mut fields, tool);

        let completeness = fields.completeness();
        tracing::info!(
            filled = fields.filled_count(),
            completeness = ?completeness,
            tier = %reply.winning_tier,
            "english synthesis finished"
        );
        Ok(SynthesisOutcome {
            fields,
            completeness,
            attempts: reply.attempts,
            winning_tier: reply.winning_tier,
        })
    }

    fn apply_constraints(&self, fields: &mut ContentFieldSet, tool: &ToolRecord) {
        // Name and category are known inputs, not model guesses.
        if fields.name.is_none() {
            fields.name = Some(tool.name.clone());
        }
        if fields.category.is_none() && !tool.category.trim().is_empty() {
            fields.category = Some(tool.category.clone());
        }
        if let Some(overview) = &fields.overview {
            fields.overview = Some(clamp_two_sentences(overview));
        }
        if let Some(title) = &fields.meta_title {
            fields.meta_title = Some(clamp_meta_title(title, &self.brand_suffix));
        }
        if let Some(desc) = &fields.meta_description {
            fields.meta_description = Some(clamp_meta_description(desc));
        }
    }
}

impl RawEnglish {
    fn into_field_set(self) -> ContentFieldSet {
        ContentFieldSet {
            name: opt_text(self.name, "name"),
            category: opt_text(self.category, "category"),
            overview: opt_text(self.overview, "overview"),
            description: opt_text(self.description, "description"),
            target_audience: opt_text(self.target_audience, "targetAudience"),
            key_features: string_list(self.key_features),
            use_cases: string_list(self.use_cases),
            tags: string_list(self.tags),
            meta_title: opt_text(self.meta_title, "metaTitle"),
            meta_description: opt_text(self.meta_description, "metaDescription"),
        }
    }
}

fn opt_text(value: serde_json::Value, hint: &str) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let text = sanitize_field(&RawResponse::from(value), hint);
    (!text.is_empty()).then_some(text)
}

/// Accepts both a proper JSON array and the newline-bulleted string
/// some models emit instead.
fn string_list(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| opt_text(item, "list item"))
            .collect(),
        serde_json::Value::String(s) => s
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn field_set_from_partial(partial: TranslationFields) -> ContentFieldSet {
    let split = |v: Option<String>| -> Vec<String> {
        v.map(|s| {
            s.lines()
                .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default()
    };
    ContentFieldSet {
        name: None,
        category: None,
        overview: partial.overview,
        description: partial.description,
        target_audience: partial.target_audience,
        key_features: split(partial.key_features),
        use_cases: split(partial.use_cases),
        tags: Vec::new(),
        meta_title: partial.meta_title,
        meta_description: partial.meta_description,
    }
}
