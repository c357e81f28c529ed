//! Category discovery from the catalog entry page

use std::collections::HashSet;

use tracing::{debug, info};
use url::Url;

use crate::domain::category::Category;
use crate::domain::errors::CrawlResult;
use crate::domain::services::{PageSession, ReadyWait};

/// Anchor texts this short are icons or pagers, not category names
const MIN_NAME_CHARS: usize = 3;

pub struct CategoryDiscovery {
    link_selector: String,
    ready_selector: String,
    catalog_prefix: String,
    ready: ReadyWait,
}

impl CategoryDiscovery {
    pub fn new(
        link_selector: impl Into<String>,
        ready_selector: impl Into<String>,
        catalog_prefix: impl Into<String>,
        ready: ReadyWait,
    ) -> Self {
        Self {
            link_selector: link_selector.into(),
            ready_selector: ready_selector.into(),
            catalog_prefix: catalog_prefix.into(),
            ready,
        }
    }

    /// Load the entry page and collect its categories, first name wins
    pub async fn discover(
        &self,
        session: &mut dyn PageSession,
        entry_url: &Url,
    ) -> CrawlResult<Vec<Category>> {
        session.navigate(entry_url.as_str()).await?;
        session
            .wait_for_selector(&self.ready_selector, self.ready)
            .await?;

        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for anchor in session.select_all(&self.link_selector).await? {
            let Some(href) = session.read_attribute(&anchor, "href").await? else {
                continue;
            };
            let text = session.read_text(&anchor).await?;
            let Some(category) = self.category_from_link(&text, &href) else {
                continue;
            };
            if seen.insert(category.name.clone()) {
                categories.push(category);
            } else {
                debug!("Duplicate category '{}' ({}) ignored", category.name, href);
            }
        }

        info!("🗂️ Discovered {} categories at {}", categories.len(), entry_url);
        Ok(categories)
    }

    fn category_from_link(&self, text: &str, href: &str) -> Option<Category> {
        let text = text.trim();
        let href = href.trim();
        let is_catalog_root =
            href.trim_end_matches('/') == self.catalog_prefix.trim_end_matches('/');

        if text.chars().count() < MIN_NAME_CHARS || href.is_empty() || is_catalog_root {
            return None;
        }
        Some(Category::new(text, href))
    }
}
