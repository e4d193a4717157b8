//! # Prompt Construction
//!
//! Template builders for the two model prompts the pipeline sends: one
//! English synthesis prompt producing the full structured field set,
//! and one unified translation prompt per target language.

use crate::config::LanguageCode;
use crate::content::{ToolRecord, TranslationFields};
use crate::probe::ProbeReport;

/// Builds the single structured prompt that produces every English
/// field in one call.
pub fn english_synthesis_prompt(tool: &ToolRecord, probe: Option<&ProbeReport>) -> String {
    let category = if tool.category.trim().is_empty() {
        "AI tool"
    } else {
        tool.category.trim()
    };

    let mut context = String::new();
    if let Some(report) = probe {
        if let Some(pricing) = report.pricing_signal {
            context.push_str(&format!("Detected pricing model: {pricing:?}\n"));
        }
        if !report.excerpts.is_empty() {
            context.push_str("\nCONTENT FROM THE TOOL'S WEBSITE:\n");
            for page in &report.excerpts {
                context.push_str(&format!("=== {} ({})\n{}\n\n", page.title, page.url, page.text));
            }
        }
    }
    if context.is_empty() {
        context.push_str("No website content could be retrieved. Write from general knowledge of this tool and its category; leave out anything you cannot state confidently.\n");
    }

    format!(
        r#"You are writing directory content in English for the AI tool "{name}" ({url}), category: {category}.

{context}
Return ONLY a JSON object with exactly these keys:
{{
  "name": "official tool name",
  "category": "short category label",
  "overview": "EXACTLY 2 sentences describing what the tool does",
  "description": "detailed markdown description, at least 300 words, structured with ## section headings, the first being ## What's {name}?",
  "targetAudience": "3-4 sentences describing who benefits most from this tool",
  "keyFeatures": ["3 to 6 concrete features"],
  "useCases": ["3 to 4 use cases, each starting with '{name} helps you'"],
  "tags": ["4 to 8 lowercase tags"],
  "metaTitle": "SEO title, at most 70 characters",
  "metaDescription": "SEO description with a call to action, at most 160 characters"
}}

Rules:
- Respond with the JSON object only, no markdown fences, no commentary.
- Never invent facts the context does not support.
- Omit a key entirely rather than filling it with placeholder text."#,
        name = tool.name,
        url = tool.url,
        category = category,
        context = context,
    )
}

/// Builds the unified prompt translating all seven content fields into
/// one target language in a single call.
pub fn translation_prompt(
    tool: &ToolRecord,
    english: &TranslationFields,
    language: &LanguageCode,
    brand_suffix: &str,
) -> String {
    let language_name = language.display_name();
    let field_block = TranslationFields::FIELD_NAMES
        .iter()
        .filter_map(|field| {
            english
                .get(field)
                .map(|value| format!("{field}:\n{value}\n"))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let title_rule = if brand_suffix.is_empty() {
        "keep it under 70 characters".to_string()
    } else {
        format!("keep it under 70 characters and end it with \"{brand_suffix}\"")
    };

    format!(
        r#"Translate the following content about the AI tool "{name}" from English to {language_name}.

ENGLISH CONTENT:
{field_block}
Return ONLY a JSON object with exactly these keys: "overview", "description", "metaTitle", "metaDescription", "keyFeatures", "useCases", "targetAudience".

Rules:
- Respond with the JSON object only, no markdown fences, no commentary.
- Keep the tool name "{name}" unchanged in every field.
- "overview" must be EXACTLY 2 sentences.
- Preserve the markdown structure of "description", translating headings too.
- For "metaTitle", {title_rule}.
- Keep "metaDescription" under 160 characters.
- Translate naturally for a {language_name} audience; do not transliterate."#,
        name = tool.name,
        language_name = language_name,
        field_block = field_block,
        title_rule = title_rule,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentFieldSet;

    fn tool() -> ToolRecord {
        ToolRecord {
            id: 7,
            name: "Lumira".into(),
            url: "https://lumira.app".into(),
            category: "video-editing".into(),
        }
    }

    #[test]
    fn test_synthesis_prompt_embeds_probe_context() {
        let mut report = ProbeReport::default();
        report.excerpts.push(crate::probe::crawl::CrawledPage {
            url: "https://lumira.app/pricing".into(),
            title: "Pricing".into(),
            text: "Pro plan is $12 per month.".into(),
            links: Vec::new(),
        });
        let prompt = english_synthesis_prompt(&tool(), Some(&report));
        assert!(prompt.contains("Lumira"));
        assert!(prompt.contains("Pro plan is $12 per month."));
        assert!(prompt.contains("\"metaTitle\""));
    }

    #[test]
    fn test_synthesis_prompt_without_probe_states_the_gap() {
        let prompt = english_synthesis_prompt(&tool(), None);
        assert!(prompt.contains("No website content could be retrieved"));
    }

    #[test]
    fn test_translation_prompt_covers_all_fields_once() {
        let english = TranslationFields::from_english(&ContentFieldSet {
            overview: Some("Two sentences. Really two.".into()),
            meta_title: Some("Lumira".into()),
            key_features: vec!["Auto-cut".into()],
            ..ContentFieldSet::default()
        });
        let prompt = translation_prompt(&tool(), &english, &LanguageCode::known("de"), " - Dir");
        assert!(prompt.contains("German (Deutsch)"));
        assert!(prompt.contains("overview:\nTwo sentences. Really two."));
        assert!(prompt.contains("end it with \" - Dir\""));
        assert_eq!(prompt.matches("Return ONLY a JSON object").count(), 1);
    }
}
