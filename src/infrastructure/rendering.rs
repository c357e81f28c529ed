//! Document-backed rendering surface
//!
//! A `DocumentSession` keeps the last loaded page as source text and answers
//! selector queries by parsing it with `scraper`. Element handles are
//! child-index paths into the parsed tree, so they survive re-parsing and stay
//! valid until the session navigates again.

pub mod http_loader;
pub mod replay_loader;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::errors::{CrawlError, CrawlResult, NavigationError};
use crate::domain::services::{ElementHandle, PageSession, RenderingSurface};

pub use http_loader::HttpPageLoader;
pub use replay_loader::{ReplayPage, ReplayPageLoader};

/// Fetches raw page source for a URL
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<String, NavigationError>;
}

/// Live and peak session counts for one surface
#[derive(Debug, Default)]
pub struct SessionStats {
    open: AtomicUsize,
    peak: AtomicUsize,
    opened_total: AtomicUsize,
}

impl SessionStats {
    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }
}

/// Rendering surface whose sessions read pages through a `PageLoader`
pub struct DocumentSurface<L> {
    loader: Arc<L>,
    stats: Arc<SessionStats>,
}

pub type HttpRenderingSurface = DocumentSurface<HttpPageLoader>;
pub type ReplayRenderingSurface = DocumentSurface<ReplayPageLoader>;

impl<L: PageLoader + 'static> DocumentSurface<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

#[async_trait]
impl<L: PageLoader + 'static> RenderingSurface for DocumentSurface<L> {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, NavigationError> {
        self.stats.opened();
        let loader: Arc<dyn PageLoader> = self.loader.clone();
        Ok(Box::new(DocumentSession {
            loader,
            stats: Some(Arc::clone(&self.stats)),
            page: None,
        }))
    }
}

struct LoadedPage {
    url: String,
    source: String,
    generation: u64,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub struct DocumentSession {
    loader: Arc<dyn PageLoader>,
    /// `None` once closed
    stats: Option<Arc<SessionStats>>,
    page: Option<LoadedPage>,
}

impl DocumentSession {
    fn ensure_open(&self) -> Result<(), NavigationError> {
        if self.stats.is_none() {
            return Err(NavigationError::SessionClosed);
        }
        Ok(())
    }

    fn page(&self) -> CrawlResult<&LoadedPage> {
        self.ensure_open()?;
        Ok(self.page.as_ref().ok_or(NavigationError::NoPageLoaded)?)
    }

    /// Parse the current page and hand it to `f`
    fn with_document<R>(&self, f: impl FnOnce(&Html, u64) -> CrawlResult<R>) -> CrawlResult<R> {
        let page = self.page()?;
        let document = Html::parse_document(&page.source);
        f(&document, page.generation)
    }

    fn with_element<R>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> R,
    ) -> CrawlResult<R> {
        self.with_document(|document, generation| {
            if handle.generation() != generation {
                return Err(NavigationError::StaleHandle.into());
            }
            let element = resolve_handle(document, handle.path())
                .ok_or(CrawlError::Navigation(NavigationError::StaleHandle))?;
            Ok(f(element))
        })
    }
}

fn compile_selector(selector: &str) -> CrawlResult<Selector> {
    Selector::parse(selector).map_err(|e| CrawlError::selector(selector, e))
}

/// Child-index path from the tree root down to `element`
fn element_path(element: ElementRef<'_>) -> Vec<usize> {
    let mut path: Vec<usize> = std::iter::successors(Some(*element), |node| node.parent())
        .filter(|node| node.parent().is_some())
        .map(|node| node.prev_siblings().count())
        .collect();
    path.reverse();
    path
}

fn resolve_handle<'a>(document: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut node = document.tree.root();
    for &index in path {
        node = node.children().nth(index)?;
    }
    ElementRef::wrap(node)
}

#[async_trait]
impl PageSession for DocumentSession {
    async fn navigate(&mut self, url: &str) -> Result<(), NavigationError> {
        self.ensure_open()?;
        debug!("Navigating to {}", url);

        // A failed load leaves no page behind
        self.page = None;
        let source = self.loader.load(url).await?;
        self.page = Some(LoadedPage {
            url: url.to_string(),
            source,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        });
        Ok(())
    }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.url.as_str())
    }

    async fn select_all(&self, selector: &str) -> CrawlResult<Vec<ElementHandle>> {
        let selector = compile_selector(selector)?;
        self.with_document(|document, generation| {
            Ok(document
                .select(&selector)
                .map(|element| ElementHandle::new(generation, element_path(element)))
                .collect())
        })
    }

    async fn select_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> CrawlResult<Vec<ElementHandle>> {
        let selector = compile_selector(selector)?;
        let generation = scope.generation();
        self.with_element(scope, |element| {
            element
                .select(&selector)
                .map(|found| ElementHandle::new(generation, element_path(found)))
                .collect()
        })
    }

    async fn read_text(&self, element: &ElementHandle) -> CrawlResult<String> {
        self.with_element(element, |element| element.text().collect::<String>())
    }

    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> CrawlResult<Option<String>> {
        self.with_element(element, |element| {
            element.value().attr(name).map(ToString::to_string)
        })
    }

    async fn close(&mut self) {
        if let Some(stats) = self.stats.take() {
            stats.closed();
        }
        self.page = None;
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        if let Some(stats) = self.stats.take() {
            stats.closed();
        }
    }
}
