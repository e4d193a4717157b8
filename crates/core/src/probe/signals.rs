//! # Page Signal Harvesting
//!
//! Regex scans over crawled page text and markup: social profiles,
//! useful links (contact mail, docs, changelog, affiliate), and a
//! pricing model cue. All heuristic, all optional; a page that yields
//! nothing produces empty maps, not errors.

use crate::probe::crawl::CrawledPage;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Pricing model cue inferred from page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingModel {
    Free,
    Freemium,
    Subscription,
    OneTimePayment,
    UsageBased,
    ContactForPricing,
}

/// Link path fragments that are platform chrome, never a profile.
const GENERIC_SEGMENTS: [&str; 12] = [
    "share", "intent", "login", "signup", "sharer", "home", "search", "explore", "hashtag",
    "privacy", "terms", "help",
];

pub struct SignalHarvester {
    social: Vec<(&'static str, Regex)>,
    email_re: Regex,
    docs_re: Regex,
    changelog_re: Regex,
    affiliate_re: Regex,
    url_re: Regex,
    pricing: Vec<(PricingModel, Regex)>,
}

impl SignalHarvester {
    pub fn new() -> Result<Self> {
        let social = vec![
            (
                "linkedin",
                Regex::new(r"(?i)https?://(?:www\.)?linkedin\.com/(?:company|in)/[A-Za-z0-9_%-]+/?")?,
            ),
            (
                "facebook",
                Regex::new(r"(?i)https?://(?:www\.)?facebook\.com/[A-Za-z0-9_.-]+/?")?,
            ),
            (
                "x",
                Regex::new(r"(?i)https?://(?:www\.)?(?:x|twitter)\.com/[A-Za-z0-9_]+/?")?,
            ),
            (
                "github",
                Regex::new(r"(?i)https?://(?:www\.)?github\.com/[A-Za-z0-9_-]+(?:/[A-Za-z0-9_.-]+)?/?")?,
            ),
            (
                "discord",
                Regex::new(r"(?i)https?://(?:www\.)?discord\.(?:gg|com/invite)/[A-Za-z0-9-]+/?")?,
            ),
            (
                "instagram",
                Regex::new(r"(?i)https?://(?:www\.)?instagram\.com/[A-Za-z0-9_.]+/?")?,
            ),
            (
                "tiktok",
                Regex::new(r"(?i)https?://(?:www\.)?tiktok\.com/@[A-Za-z0-9_.]+/?")?,
            ),
        ];
        Ok(Self {
            social,
            email_re: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            docs_re: Regex::new(r"(?i)(docs|documentation|developers|api-reference)")?,
            changelog_re: Regex::new(r"(?i)(changelog|release-notes|whats-new|product-updates)")?,
            affiliate_re: Regex::new(r"(?i)(affiliate|referral|partners)")?,
            url_re: Regex::new(r#"https?://[^\s"'<>)]+"#)?,
            pricing: vec![
                (
                    PricingModel::Free,
                    Regex::new(r"(?i)(100% free|completely free|free forever|always free|no credit card)")?,
                ),
                (
                    PricingModel::Freemium,
                    Regex::new(r"(?i)(free plan|free tier|upgrade to (?:pro|premium)|free trial)")?,
                ),
                (
                    PricingModel::Subscription,
                    Regex::new(r"(?i)(per month|/month|/mo\b|monthly|per year|/year|annual(?:ly)?|subscription)")?,
                ),
                (
                    PricingModel::OneTimePayment,
                    Regex::new(r"(?i)(one.time (?:payment|purchase)|lifetime (?:deal|access|license)|pay once)")?,
                ),
                (
                    PricingModel::UsageBased,
                    Regex::new(r"(?i)(pay.as.you.go|usage.based|per (?:request|credit|token|1000))")?,
                ),
                (
                    PricingModel::ContactForPricing,
                    Regex::new(r"(?i)(contact (?:sales|us for pricing)|custom pricing|request a quote|book a demo)")?,
                ),
            ],
        })
    }

    /// First validated profile URL per platform. Validation requires a
    /// token from the tool name or its domain inside the link, so a
    /// footer pointing at someone else's profile is dropped.
    pub fn social_links(
        &self,
        pages: &[CrawledPage],
        tool_name: &str,
        domain: &str,
    ) -> BTreeMap<String, String> {
        let keywords = validation_keywords(tool_name, domain);
        let mut links = BTreeMap::new();
        for (platform, re) in &self.social {
            'pages: for page in pages {
                for m in re.find_iter(&page_corpus(page)) {
                    let url = m.as_str().trim_end_matches('/');
                    if is_valid_profile(url, &keywords) {
                        links.insert(platform.to_string(), url.to_string());
                        break 'pages;
                    }
                }
            }
        }
        links
    }

    /// Contact mail, docs, changelog, and affiliate links, each picked
    /// by occurrence count across pages.
    pub fn useful_links(&self, pages: &[CrawledPage], domain: &str) -> BTreeMap<String, String> {
        let mut links = BTreeMap::new();

        let mut mail_counts: HashMap<String, usize> = HashMap::new();
        for page in pages {
            for m in self.email_re.find_iter(&page_corpus(page)) {
                let addr = m.as_str().to_ascii_lowercase();
                if addr.starts_with("noreply") || addr.starts_with("no-reply") {
                    continue;
                }
                *mail_counts.entry(addr).or_insert(0) += 1;
            }
        }
        if let Some(addr) = most_frequent(mail_counts, domain) {
            links.insert("mail_address".to_string(), addr);
        }

        let categories: [(&str, &Regex); 3] = [
            ("docs_link", &self.docs_re),
            ("changelog_link", &self.changelog_re),
            ("affiliate_link", &self.affiliate_re),
        ];
        for (key, category_re) in categories {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for page in pages {
                for m in self.url_re.find_iter(&page_corpus(page)) {
                    let url = m.as_str().trim_end_matches(['.', ',', ')']);
                    if category_re.is_match(url) {
                        *counts.entry(url.to_string()).or_insert(0) += 1;
                    }
                }
            }
            if let Some(url) = most_frequent(counts, domain) {
                links.insert(key.to_string(), url);
            }
        }
        links
    }

    /// Highest-scoring pricing model across all page text. Falls back
    /// to `Freemium` when a pricing section exists but no pattern won,
    /// and to nothing when the site never mentions pricing.
    pub fn pricing_signal(&self, pages: &[CrawledPage]) -> Option<PricingModel> {
        let text: String = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut best: Option<(PricingModel, usize)> = None;
        for (model, re) in &self.pricing {
            let score = re.find_iter(&text).count();
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((*model, score));
            }
        }
        if let Some((model, score)) = best {
            tracing::debug!(model = ?model, score, "pricing signal detected");
            return Some(model);
        }
        if text.to_ascii_lowercase().contains("pricing") {
            return Some(PricingModel::Freemium);
        }
        None
    }
}

/// Visible text plus link targets. Profile and contact URLs usually
/// live in hrefs, which tag stripping removes from the text.
fn page_corpus(page: &CrawledPage) -> String {
    let mut corpus = page.text.clone();
    for link in &page.links {
        corpus.push('\n');
        corpus.push_str(link);
    }
    corpus
}

fn validation_keywords(tool_name: &str, domain: &str) -> Vec<String> {
    let mut keywords: Vec<String> = tool_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_ascii_lowercase())
        .collect();
    // First label of the domain, e.g. "lumira" from "lumira.app".
    if let Some(label) = domain.split('.').next() {
        let label = label.to_ascii_lowercase();
        if label.len() >= 3 && !keywords.contains(&label) {
            keywords.push(label);
        }
    }
    keywords
}

fn is_valid_profile(url: &str, keywords: &[String]) -> bool {
    let lower = url.to_ascii_lowercase();
    let last_segment = lower.rsplit('/').next().unwrap_or("");
    if GENERIC_SEGMENTS.contains(&last_segment) {
        return false;
    }
    keywords.iter().any(|k| lower.contains(k.as_str()))
}

fn most_frequent(counts: HashMap<String, usize>, domain: &str) -> Option<String> {
    // Same-domain candidates outrank external ones at equal counts.
    counts
        .into_iter()
        .max_by_key(|(url, count)| (*count, usize::from(url.contains(domain))))
        .map(|(url, _)| url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> CrawledPage {
        CrawledPage {
            url: "https://lumira.app/".to_string(),
            title: "Lumira".to_string(),
            text: text.to_string(),
            links: Vec::new(),
        }
    }

    #[test]
    fn test_signals_found_in_link_targets() {
        let harvester = SignalHarvester::new().unwrap();
        let mut footer = page("Follow us");
        footer.links = vec![
            "https://www.linkedin.com/company/lumira".to_string(),
            "https://lumira.app/docs".to_string(),
        ];
        let pages = vec![footer];
        let social = harvester.social_links(&pages, "Lumira", "lumira.app");
        assert_eq!(
            social.get("linkedin").map(String::as_str),
            Some("https://www.linkedin.com/company/lumira")
        );
        let useful = harvester.useful_links(&pages, "lumira.app");
        assert_eq!(
            useful.get("docs_link").map(String::as_str),
            Some("https://lumira.app/docs")
        );
    }

    #[test]
    fn test_social_links_require_matching_keyword() {
        let harvester = SignalHarvester::new().unwrap();
        let pages = vec![page(
            "Follow us at https://twitter.com/lumira_app and our host at \
             https://twitter.com/randomagency plus https://github.com/lumira/editor",
        )];
        let links = harvester.social_links(&pages, "Lumira", "lumira.app");
        assert_eq!(links.get("x").map(String::as_str), Some("https://twitter.com/lumira_app"));
        assert_eq!(
            links.get("github").map(String::as_str),
            Some("https://github.com/lumira/editor")
        );
    }

    #[test]
    fn test_generic_platform_urls_are_rejected() {
        let harvester = SignalHarvester::new().unwrap();
        let pages = vec![page(
            "Share this: https://www.facebook.com/sharer and https://twitter.com/intent",
        )];
        let links = harvester.social_links(&pages, "Lumira", "lumira.app");
        assert!(links.is_empty());
    }

    #[test]
    fn test_useful_links_prefer_most_frequent() {
        let harvester = SignalHarvester::new().unwrap();
        let pages = vec![
            page("Reach us at hello@lumira.app or hello@lumira.app; docs at https://lumira.app/docs"),
            page("Support: hello@lumira.app or noreply@lumira.app. See https://lumira.app/changelog"),
        ];
        let links = harvester.useful_links(&pages, "lumira.app");
        assert_eq!(links.get("mail_address").map(String::as_str), Some("hello@lumira.app"));
        assert_eq!(links.get("docs_link").map(String::as_str), Some("https://lumira.app/docs"));
        assert_eq!(
            links.get("changelog_link").map(String::as_str),
            Some("https://lumira.app/changelog")
        );
        assert!(!links.contains_key("affiliate_link"));
    }

    #[test]
    fn test_pricing_signal_scores_competing_models() {
        let harvester = SignalHarvester::new().unwrap();
        let pages = vec![page(
            "Start with our free plan. Pro is $12 per month, billed monthly. \
             Annual subscription available per month too.",
        )];
        assert_eq!(
            harvester.pricing_signal(&pages),
            Some(PricingModel::Subscription)
        );
    }

    #[test]
    fn test_pricing_signal_fallback_and_absence() {
        let harvester = SignalHarvester::new().unwrap();
        let vague = vec![page("See our pricing page for details.")];
        assert_eq!(harvester.pricing_signal(&vague), Some(PricingModel::Freemium));

        let silent = vec![page("An open tool for everyone.")];
        assert_eq!(harvester.pricing_signal(&silent), None);
    }

    #[test]
    fn test_validation_keywords_include_domain_label() {
        let keywords = validation_keywords("Video Cutter Pro", "lumira.app");
        assert!(keywords.contains(&"video".to_string()));
        assert!(keywords.contains(&"cutter".to_string()));
        assert!(keywords.contains(&"lumira".to_string()));
        assert!(!keywords.iter().any(|k| k == "ai"));
    }
}
