//! # Site Probe
//!
//! Pre-generation reconnaissance against the tool's URL: liveness
//! check, bounded same-origin crawl, signal harvesting, and an
//! optional screenshot. Nothing here is fatal to a pipeline run except
//! a structurally invalid URL.

pub mod crawl;
pub mod screenshot;
pub mod signals;

pub use screenshot::{DisabledScreenshots, ScreenshotBackend};
pub use signals::PricingModel;

use crate::config::ProbeConfig;
use crate::content::ToolRecord;
use crate::error::PipelineError;
use anyhow::Result;
use crawl::{crawl_same_origin, CrawledPage, HtmlScrub};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use signals::SignalHarvester;
use std::collections::BTreeMap;
use std::sync::Arc;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; PolyglotProbe/1.0)";

/// What the probe learned about a site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    pub url: String,
    /// Final HTTP status after redirects. Zero when the host never
    /// answered.
    pub http_status: u16,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub crawled_pages: usize,
    pub social_links: BTreeMap<String, String>,
    pub useful_links: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_signal: Option<PricingModel>,
    /// Page text fed into the synthesis prompt. Not serialized; it is
    /// prompt material, not report material.
    #[serde(skip)]
    pub excerpts: Vec<CrawledPage>,
}

pub struct SiteProbe {
    client: reqwest::Client,
    config: ProbeConfig,
    scrub: HtmlScrub,
    harvester: SignalHarvester,
    screenshots: Arc<dyn ScreenshotBackend>,
}

impl SiteProbe {
    pub fn new(config: ProbeConfig, screenshots: Arc<dyn ScreenshotBackend>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.navigation_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            scrub: HtmlScrub::new()?,
            harvester: SignalHarvester::new()?,
            screenshots,
        })
    }

    /// Structural URL validation. The only probe error that aborts a
    /// pipeline run.
    pub fn validate_url(raw: &str) -> Result<Url, PipelineError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| PipelineError::invalid_input(format!("unparseable URL '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::invalid_input(format!(
                "URL scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(PipelineError::invalid_input(format!("URL '{raw}' has no host")));
        }
        Ok(url)
    }

    #[tracing::instrument(skip(self, tool), fields(tool = %tool.name, url = %tool.url))]
    pub async fn probe(&self, tool: &ToolRecord) -> Result<ProbeReport, PipelineError> {
        let url = Self::validate_url(&tool.url)?;

        let (http_status, landing_html) = match self.fetch_landing(&url).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "site unreachable");
                (0, None)
            }
        };
        let is_active = active_status(http_status);

        let screenshot = if is_active {
            match self.screenshots.capture(url.as_str()).await {
                Ok(reference) => reference,
                Err(e) => {
                    tracing::warn!(error = %e, "screenshot capture failed");
                    None
                }
            }
        } else {
            None
        };

        let excerpts = if is_active {
            crawl_same_origin(&self.client, &self.scrub, &url, landing_html, &self.config).await
        } else {
            Vec::new()
        };

        let domain = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches("www.")
            .to_string();
        let social_links = self.harvester.social_links(&excerpts, &tool.name, &domain);
        let useful_links = self.harvester.useful_links(&excerpts, &domain);
        let pricing_signal = self.harvester.pricing_signal(&excerpts);

        tracing::info!(
            status = http_status,
            is_active,
            pages = excerpts.len(),
            social = social_links.len(),
            "probe finished"
        );

        Ok(ProbeReport {
            url: url.to_string(),
            http_status,
            is_active,
            screenshot,
            crawled_pages: excerpts.len(),
            social_links,
            useful_links,
            pricing_signal,
            excerpts,
        })
    }

    /// GET first for the body; a host that rejects GET gets one HEAD
    /// chance before the site counts as unreachable.
    async fn fetch_landing(&self, url: &Url) -> Result<(u16, Option<String>), PipelineError> {
        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = if response.status().is_success() {
                    response.text().await.ok()
                } else {
                    None
                };
                Ok((status, body))
            }
            Err(get_err) => {
                tracing::debug!(error = %get_err, "GET failed, retrying with HEAD");
                match self
                    .client
                    .head(url.clone())
                    .timeout(self.config.request_timeout)
                    .send()
                    .await
                {
                    Ok(response) => Ok((response.status().as_u16(), None)),
                    Err(head_err) => Err(PipelineError::probe_failure(format!(
                        "GET failed ({get_err}), HEAD failed ({head_err})"
                    ))),
                }
            }
        }
    }
}

/// A site counts as active for any non-error response, redirects
/// included.
pub fn active_status(status: u16) -> bool {
    (200..400).contains(&status)
}
