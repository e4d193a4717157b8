//! # Screenshot Backend
//!
//! Capture is delegated behind a trait so deployments can plug in a
//! headless-browser service. Failure or absence of a backend never
//! affects the rest of the probe; the report just carries no artifact.

use async_trait::async_trait;

/// Captures a page screenshot and returns a reference to the stored
/// artifact (path or URL). `Ok(None)` means capture is unavailable.
#[async_trait]
pub trait ScreenshotBackend: Send + Sync {
    async fn capture(&self, url: &str) -> anyhow::Result<Option<String>>;
}

/// Default backend: capture disabled, reports carry no screenshot.
pub struct DisabledScreenshots;

#[async_trait]
impl ScreenshotBackend for DisabledScreenshots {
    async fn capture(&self, _url: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}
