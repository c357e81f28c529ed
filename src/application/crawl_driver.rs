//! Crawl orchestration
//!
//! Categories run one after another. Within a category the driver walks the
//! listing pages with its own navigator session and hands each page's product
//! refs to the worker pool. A finished category goes to the sink; a category
//! halted by a schema gap is reported and nothing of it is written.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

use super::category_discovery::CategoryDiscovery;
use super::detail_worker::DetailPageWorker;
use super::listing_extractor::ListingExtractor;
use super::pagination_controller::PaginationController;
use super::schema_mapper::SchemaMapper;
use super::spec_extractor::SpecExtractor;
use super::worker_pool::BatchWorkerPool;
use crate::domain::category::Category;
use crate::domain::errors::{CrawlError, CrawlResult};
use crate::domain::product::{CategoryResult, ProductRef};
use crate::domain::services::{PageSession, RecordSink, RenderingSurface};
use crate::infrastructure::config::CrawlerConfig;

/// What to crawl
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Category names or slugs; empty means the configured include list,
    /// or every discovered category when that is empty too
    pub categories: Vec<String>,
    pub concurrency_limit: NonZeroUsize,
}

impl CrawlRequest {
    pub fn new(categories: Vec<String>, concurrency_limit: NonZeroUsize) -> Self {
        Self {
            categories,
            concurrency_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureScope {
    Product,
    Page,
    Category,
}

/// A recovered failure
#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub scope: FailureScope,
    pub category: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CategoryStatus {
    Completed {
        records: usize,
        output: Option<PathBuf>,
    },
    /// Stopped by a category-fatal error; partial results were dropped
    Halted { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryOutcome {
    pub category: String,
    pub pages_visited: u32,
    pub products_seen: usize,
    pub status: CategoryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub categories: Vec<CategoryOutcome>,
    pub failures: Vec<FailureEntry>,
}

impl CrawlReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            categories: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, scope: FailureScope, category: &str, url: &str, error: &CrawlError) {
        self.failures.push(FailureEntry {
            scope,
            category: category.to_string(),
            url: url.to_string(),
            reason: error.to_string(),
        });
    }

    pub fn total_records(&self) -> usize {
        self.categories
            .iter()
            .map(|outcome| match outcome.status {
                CategoryStatus::Completed { records, .. } => records,
                _ => 0,
            })
            .sum()
    }

    pub fn failure_count(&self, scope: FailureScope) -> usize {
        self.failures.iter().filter(|f| f.scope == scope).count()
    }

    pub fn outcome(&self, category: &str) -> Option<&CategoryOutcome> {
        self.categories.iter().find(|o| o.category == category)
    }

    pub fn log_summary(&self) {
        info!("📊 Crawl summary: {} records", self.total_records());
        for outcome in &self.categories {
            match &outcome.status {
                CategoryStatus::Completed { records, output } => info!(
                    "  {}: {} records from {} pages -> {:?}",
                    outcome.category, records, outcome.pages_visited, output
                ),
                CategoryStatus::Halted { reason } => {
                    error!("  {}: halted: {}", outcome.category, reason);
                }
                CategoryStatus::Failed { reason } => {
                    warn!("  {}: failed: {}", outcome.category, reason);
                }
            }
        }
        info!(
            "  failures: {} products, {} pages, {} categories",
            self.failure_count(FailureScope::Product),
            self.failure_count(FailureScope::Page),
            self.failure_count(FailureScope::Category)
        );
        for failure in &self.failures {
            debug!("  {:?} {} {}: {}", failure.scope, failure.category, failure.url, failure.reason);
        }
    }
}

pub struct CrawlDriver {
    surface: Arc<dyn RenderingSurface>,
    mapper: Arc<SchemaMapper>,
    sink: Arc<dyn RecordSink>,
    config: Arc<CrawlerConfig>,
}

impl CrawlDriver {
    pub fn new(
        surface: Arc<dyn RenderingSurface>,
        mapper: Arc<SchemaMapper>,
        sink: Arc<dyn RecordSink>,
        config: Arc<CrawlerConfig>,
    ) -> Self {
        Self {
            surface,
            mapper,
            sink,
            config,
        }
    }

    pub async fn run(&self, request: &CrawlRequest) -> Result<CrawlReport> {
        let mut report = CrawlReport::new();
        let base_url = self.config.site.base_url().context("Invalid site.base_url")?;
        let entry_url = self.config.site.entry_url().context("Invalid site.entry_path")?;

        let mut navigator = self
            .surface
            .open_session()
            .await
            .context("Failed to open navigator session")?;

        let outcome = self
            .crawl_all(navigator.as_mut(), request, &base_url, &entry_url, &mut report)
            .await;
        navigator.close().await;
        outcome?;

        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    async fn crawl_all(
        &self,
        navigator: &mut dyn PageSession,
        request: &CrawlRequest,
        base_url: &Url,
        entry_url: &Url,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let categories = self.resolve_categories(navigator, request, entry_url).await?;
        info!(
            "🚀 Crawling {} categories with concurrency {}",
            categories.len(),
            request.concurrency_limit
        );

        let pool = BatchWorkerPool::new(request.concurrency_limit);
        for category in &categories {
            let (mut outcome, result) = self
                .crawl_category(navigator, &pool, category, base_url, report)
                .await;

            if matches!(outcome.status, CategoryStatus::Completed { .. }) {
                match self.sink.write_category(category, &result).await {
                    Ok(path) => {
                        outcome.status = CategoryStatus::Completed {
                            records: result.len(),
                            output: Some(path),
                        };
                    }
                    Err(e) => {
                        error!("Failed to write category '{}': {:#}", category.name, e);
                        report.failures.push(FailureEntry {
                            scope: FailureScope::Category,
                            category: category.name.clone(),
                            url: category.source_path.clone(),
                            reason: format!("{e:#}"),
                        });
                        outcome.status = CategoryStatus::Failed {
                            reason: format!("output write failed: {e:#}"),
                        };
                    }
                }
            }
            report.categories.push(outcome);
        }
        Ok(())
    }

    /// Discovered categories narrowed to the request, minus exclusions.
    ///
    /// Requested identifiers discovery did not find are built from their slug.
    async fn resolve_categories(
        &self,
        navigator: &mut dyn PageSession,
        request: &CrawlRequest,
        entry_url: &Url,
    ) -> Result<Vec<Category>> {
        let crawl = &self.config.crawl;
        let site = &self.config.site;
        let requested: &[String] = if request.categories.is_empty() {
            &crawl.include_categories
        } else {
            &request.categories
        };

        let selectors = &self.config.selectors.defaults;
        let discovery = CategoryDiscovery::new(
            selectors.category_link.as_str(),
            selectors.entry_ready.as_str(),
            site.catalog_prefix.as_str(),
            crawl.ready_wait(),
        );

        let discovered = match discovery.discover(navigator, entry_url).await {
            Ok(categories) => categories,
            Err(e) if !requested.is_empty() => {
                warn!("Category discovery failed ({}); using requested slugs", e);
                Vec::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Category discovery failed at {entry_url}"));
            }
        };

        let selected =
            select_categories(discovered, requested, &crawl.exclude_categories, &site.catalog_prefix);
        Ok(selected)
    }

    async fn crawl_category(
        &self,
        navigator: &mut dyn PageSession,
        pool: &BatchWorkerPool,
        category: &Category,
        base_url: &Url,
        report: &mut CrawlReport,
    ) -> (CategoryOutcome, CategoryResult) {
        let mut outcome = CategoryOutcome {
            category: category.name.clone(),
            pages_visited: 0,
            products_seen: 0,
            status: CategoryStatus::Completed {
                records: 0,
                output: None,
            },
        };
        let mut result = CategoryResult::new();

        info!("📂 Category '{}' ({})", category.name, category.source_path);
        let category_url = match base_url.join(&category.source_path) {
            Ok(url) => url,
            Err(e) => {
                let reason = format!("invalid category path: {e}");
                warn!("Skipping '{}': {}", category.name, reason);
                report.failures.push(FailureEntry {
                    scope: FailureScope::Category,
                    category: category.name.clone(),
                    url: category.source_path.clone(),
                    reason: reason.clone(),
                });
                outcome.status = CategoryStatus::Failed { reason };
                return (outcome, result);
            }
        };

        let crawl = &self.config.crawl;
        let selectors = self.config.selectors.for_category(category);
        let pagination = PaginationController::new(
            self.config.site.page_addressing.clone(),
            crawl.max_pages_per_category,
            crawl.ready_wait(),
        );

        let detected = match pagination
            .page_count(
                navigator,
                &category_url,
                &selectors.pagination_link,
                &selectors.listing_ready,
            )
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!("Skipping '{}': {}", category.name, e);
                report.record_failure(FailureScope::Category, &category.name, category_url.as_str(), &e);
                outcome.status = CategoryStatus::Failed {
                    reason: e.to_string(),
                };
                return (outcome, result);
            }
        };
        let plan = pagination.plan(category, detected);
        info!("'{}': {} listing pages", category.name, plan.pages_to_visit);

        let listing = ListingExtractor::new(selectors, base_url.clone());
        let worker = Arc::new(DetailPageWorker::new(
            Arc::clone(&self.surface),
            SpecExtractor::new(selectors.clone()),
            Arc::clone(&self.mapper),
            category.clone(),
            selectors.detail_ready.as_str(),
            crawl.ready_wait(),
        ));

        for page in plan.pages() {
            let page_url = pagination.page_url(&category_url, page);
            let products = match self
                .listing_page(navigator, &listing, &page_url, &selectors.listing_ready)
                .await
            {
                Ok(products) => products,
                Err(e) => {
                    warn!("Page {} of '{}' failed: {}", page, category.name, e);
                    report.record_failure(FailureScope::Page, &category.name, page_url.as_str(), &e);
                    continue;
                }
            };
            outcome.pages_visited += 1;
            outcome.products_seen += products.len();

            if products.is_empty() {
                debug!("Page {} of '{}' lists no products", page, category.name);
                continue;
            }

            let pool_result = pool.process(Arc::clone(&worker), &products).await;
            info!(
                "Page {}/{} of '{}': {}/{} products in {} batches",
                page,
                plan.pages_to_visit,
                category.name,
                pool_result.succeeded(),
                products.len(),
                pool_result.batches_run
            );

            for failure in &pool_result.failures {
                report.record_failure(FailureScope::Product, &category.name, &failure.url, &failure.error);
            }

            if let Some(halt) = &pool_result.halted_by {
                error!(
                    "🛑 Category '{}' halted on page {}: {}",
                    category.name, page, halt
                );
                report.record_failure(FailureScope::Category, &category.name, page_url.as_str(), halt);
                outcome.status = CategoryStatus::Halted {
                    reason: halt.to_string(),
                };
                return (outcome, CategoryResult::new());
            }

            result.extend(pool_result.into_values());
        }

        outcome.status = CategoryStatus::Completed {
            records: result.len(),
            output: None,
        };
        info!("✅ Category '{}': {} records", category.name, result.len());
        (outcome, result)
    }

    async fn listing_page(
        &self,
        navigator: &mut dyn PageSession,
        listing: &ListingExtractor,
        page_url: &Url,
        ready_selector: &str,
    ) -> CrawlResult<Vec<ProductRef>> {
        navigator.navigate(page_url.as_str()).await?;
        navigator
            .wait_for_selector(ready_selector, self.config.crawl.ready_wait())
            .await?;
        listing.extract(navigator).await
    }
}

/// Narrow `discovered` to `requested` (all when empty) and drop `excluded`
pub fn select_categories(
    discovered: Vec<Category>,
    requested: &[String],
    excluded: &[String],
    catalog_prefix: &str,
) -> Vec<Category> {
    let candidates: Vec<Category> = if requested.is_empty() {
        discovered
    } else {
        requested
            .iter()
            .map(|identifier| {
                discovered
                    .iter()
                    .find(|category| category.matches(identifier))
                    .cloned()
                    .unwrap_or_else(|| {
                        let category = Category::from_slug(identifier, catalog_prefix);
                        info!(
                            "Category '{}' not discovered; using {}",
                            identifier, category.source_path
                        );
                        category
                    })
            })
            .collect()
    };

    let mut selected: Vec<Category> = Vec::with_capacity(candidates.len());
    for category in candidates {
        if excluded.iter().any(|identifier| category.matches(identifier)) {
            debug!("Category '{}' excluded", category.name);
            continue;
        }
        if selected.iter().all(|kept| kept.name != category.name) {
            selected.push(category);
        }
    }
    selected
}
