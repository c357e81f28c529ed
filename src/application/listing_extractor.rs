//! Product references from one rendered listing page

use tracing::debug;
use url::Url;

use crate::domain::errors::CrawlResult;
use crate::domain::product::ProductRef;
use crate::domain::services::PageSession;
use crate::infrastructure::config::SiteSelectors;

pub struct ListingExtractor {
    row_selector: String,
    link_selector: String,
    base_url: Url,
}

impl ListingExtractor {
    pub fn new(selectors: &SiteSelectors, base_url: Url) -> Self {
        Self {
            row_selector: selectors.product_row.clone(),
            link_selector: selectors.product_link.clone(),
            base_url,
        }
    }

    /// Rows without a name link or with an unusable `href` are skipped
    pub async fn extract(&self, session: &dyn PageSession) -> CrawlResult<Vec<ProductRef>> {
        let rows = session.select_all(&self.row_selector).await?;
        let mut products = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            let Some(link) = session
                .select_within(row, &self.link_selector)
                .await?
                .into_iter()
                .next()
            else {
                debug!("Row {} has no product link", index);
                continue;
            };

            let href = session.read_attribute(&link, "href").await?;
            let Some(detail_url) = href.as_deref().and_then(|href| self.resolve_url(href)) else {
                debug!("Row {} has no usable href ({:?})", index, href);
                continue;
            };

            let name = session.read_text(&link).await?;
            match ProductRef::new(&name, detail_url.as_str()) {
                Some(product) => products.push(product),
                None => debug!("Row {} has an empty product name", index),
            }
        }

        Ok(products)
    }

    /// Absolute and relative links resolved against the site base
    fn resolve_url(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base_url
            .join(href)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
    }
}
