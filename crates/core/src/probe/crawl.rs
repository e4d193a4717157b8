//! # Same-Origin Crawl
//!
//! Bounded breadth-first fetch of a handful of pages from the tool's
//! own site. Informative paths (about, pricing, features) are visited
//! first. Individual page failures are logged and skipped; the crawl
//! itself cannot fail.

use crate::config::ProbeConfig;
use anyhow::Result;
use regex::Regex;
use reqwest::Url;
use std::collections::HashSet;

/// One fetched page, reduced to prompt-sized text plus the absolute
/// link targets the markup carried (hrefs vanish with the tags).
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
}

/// Paths worth visiting before arbitrary internal links.
const PRIORITY_SEGMENTS: [&str; 8] = [
    "about", "pricing", "feature", "docs", "faq", "product", "how", "contact",
];

/// Compiled HTML reduction patterns, built once per probe.
pub struct HtmlScrub {
    script_re: Regex,
    style_re: Regex,
    comment_re: Regex,
    tag_re: Regex,
    space_re: Regex,
    title_re: Regex,
    h1_re: Regex,
    href_re: Regex,
}

impl HtmlScrub {
    pub fn new() -> Result<Self> {
        Ok(Self {
            script_re: Regex::new(r"(?is)<script\b[^>]*>.*?</script>")?,
            style_re: Regex::new(r"(?is)<style\b[^>]*>.*?</style>")?,
            comment_re: Regex::new(r"(?s)<!--.*?-->")?,
            tag_re: Regex::new(r"(?s)<[^>]*>")?,
            space_re: Regex::new(r"\s+")?,
            title_re: Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?,
            h1_re: Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>")?,
            href_re: Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#)?,
        })
    }

    /// Visible text, entities decoded, whitespace collapsed.
    pub fn text(&self, html: &str) -> String {
        let without_scripts = self.script_re.replace_all(html, " ");
        let without_styles = self.style_re.replace_all(&without_scripts, " ");
        let without_comments = self.comment_re.replace_all(&without_styles, " ");
        let without_tags = self.tag_re.replace_all(&without_comments, " ");
        let decoded = decode_entities(&without_tags);
        self.space_re.replace_all(&decoded, " ").trim().to_string()
    }

    /// Page title, falling back to the first H1.
    pub fn title(&self, html: &str) -> String {
        for re in [&self.title_re, &self.h1_re] {
            if let Some(caps) = re.captures(html) {
                if let Some(m) = caps.get(1) {
                    let title = self.text(m.as_str());
                    if !title.is_empty() {
                        return title;
                    }
                }
            }
        }
        String::new()
    }

    /// All resolvable absolute links in the page, fragments dropped.
    pub fn links(&self, html: &str, base: &Url) -> Vec<Url> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for caps in self.href_re.captures_iter(html) {
            let Some(m) = caps.get(1) else { continue };
            let raw = m.as_str().trim();
            if raw.starts_with("mailto:") || raw.starts_with("javascript:") {
                continue;
            }
            let Ok(mut url) = base.join(raw) else { continue };
            url.set_fragment(None);
            if seen.insert(url.to_string()) {
                links.push(url);
            }
        }
        links
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

fn link_score(url: &Url) -> usize {
    let path = url.path().to_ascii_lowercase();
    PRIORITY_SEGMENTS
        .iter()
        .filter(|segment| path.contains(*segment))
        .count()
}

/// Fetches up to `crawl_page_budget` pages from the start URL's origin.
/// The landing page HTML is taken from `seed_html` when the caller
/// already fetched it.
pub async fn crawl_same_origin(
    client: &reqwest::Client,
    scrub: &HtmlScrub,
    start: &Url,
    seed_html: Option<String>,
    config: &ProbeConfig,
) -> Vec<CrawledPage> {
    let mut pages = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: Vec<Url> = Vec::new();

    visited.insert(start.to_string());
    let landing_html = match seed_html {
        Some(html) => Some(html),
        None => fetch_page(client, start, config).await,
    };
    if let Some(html) = landing_html {
        queue.extend(
            scrub
                .links(&html, start)
                .into_iter()
                .filter(|url| url.origin() == start.origin()),
        );
        pages.push(reduce(scrub, start, &html, config));
    }

    // Most informative paths first.
    queue.sort_by_key(|url| std::cmp::Reverse(link_score(url)));

    for url in queue {
        if pages.len() >= config.crawl_page_budget {
            break;
        }
        if !visited.insert(url.to_string()) {
            continue;
        }
        tokio::time::sleep(config.crawl_delay).await;
        if let Some(html) = fetch_page(client, &url, config).await {
            pages.push(reduce(scrub, &url, &html, config));
        }
    }

    tracing::debug!(pages = pages.len(), origin = %start.origin().ascii_serialization(), "crawl finished");
    pages
}

async fn fetch_page(client: &reqwest::Client, url: &Url, config: &ProbeConfig) -> Option<String> {
    let response = match client
        .get(url.clone())
        .timeout(config.request_timeout)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "crawl page fetch failed");
            return None;
        }
    };
    if !response.status().is_success() {
        tracing::debug!(url = %url, status = response.status().as_u16(), "crawl page skipped");
        return None;
    }
    match response.text().await {
        Ok(html) => Some(html),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "crawl page body unreadable");
            None
        }
    }
}

fn reduce(scrub: &HtmlScrub, url: &Url, html: &str, config: &ProbeConfig) -> CrawledPage {
    let mut text = scrub.text(html);
    if let Some((idx, _)) = text.char_indices().nth(config.excerpt_chars) {
        text.truncate(idx);
    }
    CrawledPage {
        url: url.to_string(),
        title: scrub.title(html),
        text,
        links: scrub
            .links(html, url)
            .into_iter()
            .map(|u| u.to_string())
            .collect(),
    }
}
