//! Offline page loader backed by recorded pages
//!
//! Serves HTML from memory, optionally delayed, with scripted failures. Used by
//! the test suite and by `--replay` runs over a directory of saved pages.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::sleep;

use super::PageLoader;
use crate::domain::errors::NavigationError;

/// Name of the url -> file map inside a replay directory
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayPage {
    Html(String),
    Status(u16),
    Unreachable(String),
}

#[derive(Debug, Default)]
pub struct ReplayPageLoader {
    pages: HashMap<String, ReplayPage>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    requests: Mutex<Vec<String>>,
}

impl ReplayPageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), ReplayPage::Html(html.into()));
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.pages.insert(url.into(), ReplayPage::Status(status));
        self
    }

    pub fn with_unreachable(mut self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.pages
            .insert(url.into(), ReplayPage::Unreachable(reason.into()));
        self
    }

    /// Delay applied to every load without its own delay
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// Load a directory holding `manifest.json` (`{"<url>": "<file>"}`) and
    /// the page files it names
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read replay manifest {manifest_path:?}"))?;
        let entries: HashMap<String, String> = serde_json::from_str(&manifest)
            .with_context(|| format!("Invalid replay manifest {manifest_path:?}"))?;

        let mut loader = Self::new();
        for (url, file) in entries {
            let page_path = dir.join(&file);
            let html = std::fs::read_to_string(&page_path)
                .with_context(|| format!("Failed to read replay page {page_path:?} for {url}"))?;
            loader = loader.with_page(url, html);
        }
        Ok(loader)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// URLs requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageLoader for ReplayPageLoader {
    async fn load(&self, url: &str) -> Result<String, NavigationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        let delay = self.delays.get(url).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            sleep(delay).await;
        }

        match self.pages.get(url) {
            Some(ReplayPage::Html(html)) => Ok(html.clone()),
            Some(ReplayPage::Status(status)) => Err(NavigationError::HttpStatus {
                status: *status,
                url: url.to_string(),
            }),
            Some(ReplayPage::Unreachable(reason)) => Err(NavigationError::load_failed(url, reason)),
            None => Err(NavigationError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}
