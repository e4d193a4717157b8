//! # Content Data Model
//!
//! The types that flow through a pipeline run: the input tool record,
//! per-call attempt records, the English field set, per-language
//! translation results, and the final report.

use crate::config::LanguageCode;
use crate::error::PipelineError;
use crate::events::PipelineEvent;
use crate::probe::ProbeReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable description of the tool being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
}

impl ToolRecord {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::invalid_input("tool name is empty"));
        }
        if self.url.trim().is_empty() {
            return Err(PipelineError::invalid_input("tool URL is empty"));
        }
        Ok(())
    }
}

/// How a single model call against one tier ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    Malformed,
    Fatal,
}

/// One model call. A gateway reply carries the full trail of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub tier: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// First part of the sanitized response, kept for diagnosis of
    /// malformed output. Absent for rate-limited and fatal attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_preview: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Field coverage of a generated or translated field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    Partial,
    Missing,
}

impl Completeness {
    pub fn classify(filled: usize, expected: usize) -> Self {
        if filled == 0 {
            Self::Missing
        } else if filled >= expected {
            Self::Complete
        } else {
            Self::Partial
        }
    }
}

/// The full English content set for a tool. Every field is optional;
/// absent means the model did not produce it, never a placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentFieldSet {
    pub name: Option<String>,
    pub category: Option<String>,
    pub overview: Option<String>,
    pub description: Option<String>,
    pub target_audience: Option<String>,
    pub key_features: Vec<String>,
    pub use_cases: Vec<String>,
    pub tags: Vec<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

impl ContentFieldSet {
    pub const EXPECTED_FIELDS: usize = 10;

    pub fn filled_count(&self) -> usize {
        let opt = |v: &Option<String>| -> usize {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map_or(0, |_| 1)
        };
        let list = |v: &Vec<String>| -> usize {
            usize::from(v.iter().any(|s| !s.trim().is_empty()))
        };
        opt(&self.name)
            + opt(&self.category)
            + opt(&self.overview)
            + opt(&self.description)
            + opt(&self.target_audience)
            + list(&self.key_features)
            + list(&self.use_cases)
            + list(&self.tags)
            + opt(&self.meta_title)
            + opt(&self.meta_description)
    }

    pub fn completeness(&self) -> Completeness {
        Completeness::classify(self.filled_count(), Self::EXPECTED_FIELDS)
    }
}

/// The seven fields carried per target language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationFields {
    pub overview: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub key_features: Option<String>,
    pub use_cases: Option<String>,
    pub target_audience: Option<String>,
}

impl TranslationFields {
    /// JSON key names, in prompt order. The partial extractor scans
    /// for these.
    pub const FIELD_NAMES: [&'static str; 7] = [
        "overview",
        "description",
        "metaTitle",
        "metaDescription",
        "keyFeatures",
        "useCases",
        "targetAudience",
    ];

    pub const EXPECTED_FIELDS: usize = 7;

    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "overview" => self.overview.as_deref(),
            "description" => self.description.as_deref(),
            "metaTitle" => self.meta_title.as_deref(),
            "metaDescription" => self.meta_description.as_deref(),
            "keyFeatures" => self.key_features.as_deref(),
            "useCases" => self.use_cases.as_deref(),
            "targetAudience" => self.target_audience.as_deref(),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "overview" => &mut self.overview,
            "description" => &mut self.description,
            "metaTitle" => &mut self.meta_title,
            "metaDescription" => &mut self.meta_description,
            "keyFeatures" => &mut self.key_features,
            "useCases" => &mut self.use_cases,
            "targetAudience" => &mut self.target_audience,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Direct import of the English set, list fields flattened to
    /// newline-separated text like the translated form.
    pub fn from_english(english: &ContentFieldSet) -> Self {
        let join = |items: &[String]| -> Option<String> {
            let joined = items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            (!joined.is_empty()).then_some(joined)
        };
        Self {
            overview: english.overview.clone(),
            description: english.description.clone(),
            meta_title: english.meta_title.clone(),
            meta_description: english.meta_description.clone(),
            key_features: join(&english.key_features),
            use_cases: join(&english.use_cases),
            target_audience: english.target_audience.clone(),
        }
    }

    pub fn filled_count(&self) -> usize {
        Self::FIELD_NAMES
            .iter()
            .filter(|name| {
                self.get(name)
                    .map(str::trim)
                    .is_some_and(|s| !s.is_empty())
            })
            .count()
    }

    pub fn completeness(&self) -> Completeness {
        Completeness::classify(self.filled_count(), Self::EXPECTED_FIELDS)
    }
}

/// Where a language's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationSource {
    /// English imported directly from the synthesizer output.
    Imported,
    /// Produced by a model translation call.
    ModelGenerated,
}

/// Outcome for one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub language: LanguageCode,
    pub fields: TranslationFields,
    pub status: Completeness,
    pub source: TranslationSource,
    /// 9.5 for imported English, 8.5 for a complete model translation,
    /// scaled by field coverage for partial ones.
    pub quality_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslationResult {
    pub const IMPORTED_QUALITY: f64 = 9.5;
    pub const MODEL_QUALITY: f64 = 8.5;

    pub fn imported_english(english: &ContentFieldSet) -> Self {
        let fields = TranslationFields::from_english(english);
        let status = fields.completeness();
        Self {
            language: LanguageCode::english(),
            fields,
            status,
            source: TranslationSource::Imported,
            quality_score: Self::IMPORTED_QUALITY,
            error: None,
        }
    }

    pub fn from_model_fields(language: LanguageCode, fields: TranslationFields) -> Self {
        let status = fields.completeness();
        let coverage = fields.filled_count() as f64 / TranslationFields::EXPECTED_FIELDS as f64;
        let quality_score = match status {
            Completeness::Complete => Self::MODEL_QUALITY,
            Completeness::Partial => Self::MODEL_QUALITY * coverage,
            Completeness::Missing => 0.0,
        };
        Self {
            language,
            fields,
            status,
            source: TranslationSource::ModelGenerated,
            quality_score,
            error: None,
        }
    }

    pub fn failed(language: LanguageCode, error: String) -> Self {
        Self {
            language,
            fields: TranslationFields::default(),
            status: Completeness::Missing,
            source: TranslationSource::ModelGenerated,
            quality_score: 0.0,
            error: Some(error),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.error.is_none() && self.status != Completeness::Missing
    }
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub tool_id: i64,
    pub tool_name: String,
    pub english: ContentFieldSet,
    pub english_completeness: Completeness,
    /// Keyed by language code; includes the imported English entry.
    pub translations: BTreeMap<LanguageCode, TranslationResult>,
    /// Number of target languages attempted (English excluded).
    pub total_languages: usize,
    /// Target languages that ended complete or partial without error.
    pub successful_translations: usize,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeReport>,
    pub duration_ms: u64,
    pub events: Vec<PipelineEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_english() -> ContentFieldSet {
        ContentFieldSet {
            name: Some("Lumira".into()),
            category: Some("video-editing".into()),
            overview: Some("Lumira edits video with AI. It runs in the browser.".into()),
            description: Some("## What's Lumira?\nLong description.".into()),
            target_audience: Some("Video editors and marketing teams.".into()),
            key_features: vec!["Auto-cut".into(), "Captions".into()],
            use_cases: vec!["Lumira helps you cut interviews".into()],
            tags: vec!["video".into(), "ai".into()],
            meta_title: Some("Lumira".into()),
            meta_description: Some("Edit video with AI.".into()),
        }
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let tool = ToolRecord {
            id: 1,
            name: "  ".into(),
            url: "https://lumira.app".into(),
            category: String::new(),
        };
        assert!(tool.validate().is_err());

        let tool = ToolRecord {
            id: 1,
            name: "Lumira".into(),
            url: String::new(),
            category: String::new(),
        };
        assert!(tool.validate().is_err());
    }

    #[test]
    fn test_completeness_classification() {
        assert_eq!(Completeness::classify(0, 7), Completeness::Missing);
        assert_eq!(Completeness::classify(3, 7), Completeness::Partial);
        assert_eq!(Completeness::classify(7, 7), Completeness::Complete);
    }

    #[test]
    fn test_english_field_count() {
        let english = full_english();
        assert_eq!(english.filled_count(), ContentFieldSet::EXPECTED_FIELDS);
        assert_eq!(english.completeness(), Completeness::Complete);

        let empty = ContentFieldSet::default();
        assert_eq!(empty.completeness(), Completeness::Missing);
    }

    #[test]
    fn test_whitespace_only_fields_do_not_count() {
        let mut fields = TranslationFields::default();
        fields.set("overview", "   ".into());
        assert_eq!(fields.filled_count(), 0);
        assert_eq!(fields.completeness(), Completeness::Missing);
    }

    #[test]
    fn test_imported_english_scores_higher_than_model() {
        let english = full_english();
        let imported = TranslationResult::imported_english(&english);
        assert_eq!(imported.quality_score, 9.5);
        assert_eq!(imported.source, TranslationSource::Imported);
        assert_eq!(imported.status, Completeness::Complete);

        let translated =
            TranslationResult::from_model_fields(LanguageCode::known("fr"), imported.fields.clone());
        assert_eq!(translated.quality_score, 8.5);
    }

    #[test]
    fn test_partial_translation_scales_quality_by_coverage() {
        let mut fields = TranslationFields::default();
        fields.set("overview", "Aperçu de l'outil en deux phrases.".into());
        fields.set("metaTitle", "Lumira".into());

        let result = TranslationResult::from_model_fields(LanguageCode::known("fr"), fields);
        assert_eq!(result.status, Completeness::Partial);
        let expected = 8.5 * (2.0 / 7.0);
        assert!((result.quality_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_failed_translation_is_missing_with_zero_score() {
        let result = TranslationResult::failed(
            LanguageCode::known("de"),
            "all model tiers exhausted".into(),
        );
        assert_eq!(result.status, Completeness::Missing);
        assert_eq!(result.quality_score, 0.0);
        assert!(!result.is_successful());
    }
}
