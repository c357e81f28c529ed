//! Page count detection and listing page URLs for one category

use tracing::{debug, info};
use url::Url;

use crate::domain::category::Category;
use crate::domain::errors::CrawlResult;
use crate::domain::pagination::{PageAddressing, PagePlan};
use crate::domain::services::{PageSession, ReadyWait};

/// Largest integer among pagination link texts, or 1 when there is none
pub fn parse_page_count<I, S>(link_texts: I) -> u32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    link_texts
        .into_iter()
        .filter_map(|text| text.as_ref().trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .max(1)
}

pub struct PaginationController {
    addressing: PageAddressing,
    max_pages: Option<u32>,
    ready: ReadyWait,
}

impl PaginationController {
    pub fn new(addressing: PageAddressing, max_pages: Option<u32>, ready: ReadyWait) -> Self {
        Self {
            addressing,
            max_pages,
            ready,
        }
    }

    /// Navigate to the category's first page and read its pagination links
    pub async fn page_count(
        &self,
        session: &mut dyn PageSession,
        category_url: &Url,
        pagination_selector: &str,
        ready_selector: &str,
    ) -> CrawlResult<u32> {
        session.navigate(category_url.as_str()).await?;
        session.wait_for_selector(ready_selector, self.ready).await?;

        let mut texts = Vec::new();
        for link in session.select_all(pagination_selector).await? {
            texts.push(session.read_text(&link).await?);
        }

        let count = parse_page_count(&texts);
        debug!("{} pagination links -> {} pages", texts.len(), count);
        Ok(count)
    }

    /// Pages to visit; an applied cap is always logged
    pub fn plan(&self, category: &Category, detected_pages: u32) -> PagePlan {
        let plan = PagePlan::new(detected_pages, self.max_pages);
        if plan.is_capped() {
            info!(
                "✂️ Category '{}': visiting {} of {} pages (max_pages_per_category)",
                category.name, plan.pages_to_visit, plan.detected_pages
            );
        }
        plan
    }

    pub fn page_url(&self, category_url: &Url, page: u32) -> Url {
        self.addressing.page_url(category_url, page)
    }
}
