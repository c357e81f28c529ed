//! Page capability consumed by the crawl pipeline
//!
//! Everything the pipeline knows about a live page goes through these traits,
//! so the HTTP fetcher and the offline replay surface are interchangeable.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use crate::domain::errors::{CrawlResult, NavigationError};

/// Opaque reference to an element of the page a session currently shows.
///
/// A handle is only valid for the page load that produced it; reading
/// through it after the session navigated again yields `StaleHandle`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    generation: u64,
    path: Vec<usize>,
}

impl ElementHandle {
    pub fn new(generation: u64, path: Vec<usize>) -> Self {
        Self { generation, path }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Child-index path from the document root
    pub fn path(&self) -> &[usize] {
        &self.path
    }
}

/// Bounded wait for a page to become usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ReadyWait {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// One isolated browsing context
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<(), NavigationError>;

    /// URL of the page currently loaded, if any
    fn current_url(&self) -> Option<&str>;

    async fn select_all(&self, selector: &str) -> CrawlResult<Vec<ElementHandle>>;

    async fn select_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> CrawlResult<Vec<ElementHandle>>;

    async fn read_text(&self, element: &ElementHandle) -> CrawlResult<String>;

    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> CrawlResult<Option<String>>;

    /// Poll until `selector` matches at least once or `wait.timeout` elapses.
    async fn wait_for_selector(&self, selector: &str, wait: ReadyWait) -> CrawlResult<()> {
        let started = Instant::now();
        loop {
            if !self.select_all(selector).await?.is_empty() {
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= wait.timeout {
                let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                return Err(NavigationError::ReadyTimeout {
                    url: self.current_url().unwrap_or_default().to_string(),
                    selector: selector.to_string(),
                    waited_ms,
                }
                .into());
            }
            sleep(wait.poll_interval.min(wait.timeout - waited)).await;
        }
    }

    /// Release the context. Idempotent.
    async fn close(&mut self);
}

/// Factory for page sessions
#[async_trait]
pub trait RenderingSurface: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, NavigationError>;
}

/// Convenience reads built on the session primitives
pub async fn first_text_within(
    session: &dyn PageSession,
    scope: &ElementHandle,
    selector: &str,
) -> CrawlResult<Option<String>> {
    let Some(element) = session.select_within(scope, selector).await?.into_iter().next() else {
        return Ok(None);
    };
    let text = session.read_text(&element).await?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Trimmed text of the first element matching `selector` on the whole page
pub async fn first_text(session: &dyn PageSession, selector: &str) -> CrawlResult<Option<String>> {
    let Some(element) = session.select_all(selector).await?.into_iter().next() else {
        return Ok(None);
    };
    let text = session.read_text(&element).await?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
