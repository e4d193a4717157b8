//! # Partial Extraction
//!
//! Last-resort field recovery from responses that failed strict JSON
//! parsing. Pulls individual fields with regexes; whatever cannot be
//! found stays absent. Never guesses, never errors.

use crate::config::LanguageCode;
use crate::content::TranslationFields;
use regex::Regex;

/// Recovers individual fields from unparseable model text.
pub trait PartialExtractor: Send + Sync {
    fn extract(&self, raw_text: &str, tool_name: &str, language: &LanguageCode)
        -> TranslationFields;
}

/// Regex-based extractor over the known field names. Tolerates missing
/// quotes around keys, prose between fields, and truncated objects.
pub struct RegexExtractor {
    patterns: Vec<(&'static str, Vec<Regex>)>,
}

impl RegexExtractor {
    pub fn new() -> Self {
        let mut patterns = Vec::new();
        for field in TranslationFields::FIELD_NAMES {
            let mut field_patterns = Vec::new();
            // Quoted value, honoring escape sequences.
            let quoted = format!(r#"(?is)"?{field}"?\s*:\s*"((?:[^"\\]|\\.)*)""#);
            // Bare value up to the next delimiter, for truncated output.
            let bare = format!(r#"(?i)"?{field}"?\s*:\s*([^,\n}}]+)"#);
            for pattern in [quoted, bare] {
                if let Ok(re) = Regex::new(&pattern) {
                    field_patterns.push(re);
                }
            }
            patterns.push((field, field_patterns));
        }
        Self { patterns }
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialExtractor for RegexExtractor {
    fn extract(
        &self,
        raw_text: &str,
        tool_name: &str,
        language: &LanguageCode,
    ) -> TranslationFields {
        let mut fields = TranslationFields::default();
        for (name, field_patterns) in &self.patterns {
            for re in field_patterns {
                let Some(caps) = re.captures(raw_text) else {
                    continue;
                };
                let Some(m) = caps.get(1) else {
                    continue;
                };
                let value = clean_fragment(m.as_str());
                // Too-short fragments are usually regex noise, not content.
                if value.chars().count() > 5 {
                    fields.set(name, value);
                    break;
                }
            }
        }
        tracing::debug!(
            tool = tool_name,
            language = %language,
            recovered = fields.filled_count(),
            "partial extraction finished"
        );
        fields
    }
}

fn clean_fragment(raw: &str) -> String {
    let mut value = raw.trim();
    value = value.trim_end_matches(',').trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value = &value[1..value.len() - 1];
    }
    unescape(value)
}

/// Undoes the JSON string escapes a quoted capture still carries.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
