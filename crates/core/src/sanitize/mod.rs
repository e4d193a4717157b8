//! # Response Sanitizer
//!
//! Total conversion of whatever a model hands back into usable text.
//! Nothing in here returns an error: unexpected shapes become empty or
//! best-effort strings and the caller decides what that means.

pub mod extract;

pub use extract::{PartialExtractor, RegexExtractor};

use crate::gateway::client::RawResponse;
use regex::Regex;

/// Canonical text for any raw model value. Prose prefixes are kept;
/// stripping happens only when the caller goes on to parse JSON.
pub fn sanitize(raw: &RawResponse) -> String {
    match raw {
        RawResponse::Text(s) => s.clone(),
        RawResponse::Json(v) => serde_json::to_string(v).unwrap_or_default(),
        RawResponse::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        RawResponse::Bool(b) => b.to_string(),
        RawResponse::Null => String::new(),
    }
}

/// Field-level cleanup applied to individual translated values:
/// conversational prefixes and wrapping quotes are dropped. The field
/// hint is only used for tracing.
pub fn sanitize_field(raw: &RawResponse, field_hint: &str) -> String {
    let text = sanitize(raw);
    let mut value = text.trim();

    if let Ok(prefix) = Regex::new(r"(?i)^(here is|here's|voici|traduction|translation)[^:\n]*:\s*")
    {
        if let Some(m) = prefix.find(value) {
            value = value[m.end()..].trim();
        }
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value = value[1..value.len() - 1].trim();
    }
    if value.is_empty() && !text.trim().is_empty() {
        tracing::trace!(field = field_hint, "field value emptied by cleanup");
    }
    value.to_string()
}

/// Locates the JSON payload inside a response that may wrap it in a
/// fenced block or conversational prose. Returns the input unchanged
/// when no wrapper is recognized.
pub fn strip_json_wrapper(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(fence_end) = body.find("```") {
            let inner = body[..fence_end].trim();
            if inner.starts_with('{') || inner.starts_with('[') {
                return inner;
            }
        }
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Enforces the meta title length contract: the brand suffix is
/// appended when configured and the whole title stays within 70
/// characters, truncating the base rather than the suffix.
pub fn clamp_meta_title(title: &str, brand_suffix: &str) -> String {
    const MAX_TITLE: usize = 70;
    let title = title.trim();
    if brand_suffix.is_empty() {
        return clamp_chars(title, MAX_TITLE).to_string();
    }
    let base = title.strip_suffix(brand_suffix).unwrap_or(title).trim_end();
    let budget = MAX_TITLE.saturating_sub(brand_suffix.chars().count());
    let mut out = clamp_chars(base, budget).trim_end().to_string();
    out.push_str(brand_suffix);
    out
}

/// Meta descriptions are capped at 160 characters; longer ones are cut
/// at 157 with an ellipsis.
pub fn clamp_meta_description(desc: &str) -> String {
    const MAX_DESC: usize = 160;
    let desc = desc.trim();
    if desc.chars().count() <= MAX_DESC {
        return desc.to_string();
    }
    let mut out = clamp_chars(desc, MAX_DESC - 3).trim_end().to_string();
    out.push_str("...");
    out
}

/// Overviews are contracted to two sentences. Shorter input passes
/// through untouched.
pub fn clamp_two_sentences(text: &str) -> String {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            sentences.push(current.trim().to_string());
            current.clear();
            if sentences.len() == 2 {
                return sentences.join(" ");
            }
        }
    }
    text.to_string()
}

fn clamp_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
