//! Detail page extraction: spec groups, price and rating summary
//!
//! Absent elements are extraction misses, never errors: the affected value is
//! simply `None` / `Missing`.

use tracing::debug;

use crate::domain::errors::CrawlResult;
use crate::domain::normalize::{RatingSummary, normalize_price, parse_user_rating};
use crate::domain::product::{SpecGroup, SpecValue};
use crate::domain::services::{ElementHandle, PageSession, first_text, first_text_within};
use crate::infrastructure::config::SiteSelectors;

/// Everything read from one detail page before schema mapping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawProductDetail {
    pub spec_groups: Vec<SpecGroup>,
    pub price: Option<String>,
    pub rating: RatingSummary,
}

pub struct SpecExtractor {
    selectors: SiteSelectors,
}

impl SpecExtractor {
    pub fn new(selectors: SiteSelectors) -> Self {
        Self { selectors }
    }

    pub async fn extract(&self, session: &dyn PageSession) -> CrawlResult<RawProductDetail> {
        let spec_groups = self.spec_groups(session).await?;

        let price = first_text(session, &self.selectors.final_price)
            .await?
            .as_deref()
            .and_then(normalize_price);

        let rating = first_text(session, &self.selectors.rating_summary)
            .await?
            .as_deref()
            .map(parse_user_rating)
            .unwrap_or_default();

        debug!(
            "Extracted {} spec groups (price: {:?}, ratings: {:?})",
            spec_groups.len(),
            price,
            rating.num_ratings
        );

        Ok(RawProductDetail {
            spec_groups,
            price,
            rating,
        })
    }

    /// Labeled blocks in page order; blocks without a title are skipped
    async fn spec_groups(&self, session: &dyn PageSession) -> CrawlResult<Vec<SpecGroup>> {
        let mut groups = Vec::new();
        for block in session.select_all(&self.selectors.spec_group).await? {
            let Some(label) = first_text_within(session, &block, &self.selectors.spec_title).await?
            else {
                continue;
            };
            let value = self.spec_value(session, &block).await?;
            groups.push(SpecGroup::new(label, value));
        }
        Ok(groups)
    }

    /// A single paragraph wins; otherwise the non-empty list item texts
    async fn spec_value(
        &self,
        session: &dyn PageSession,
        block: &ElementHandle,
    ) -> CrawlResult<SpecValue> {
        if let Some(paragraph) =
            first_text_within(session, block, &self.selectors.spec_paragraph).await?
        {
            return Ok(SpecValue::Text(paragraph));
        }

        let mut items = Vec::new();
        for item in session
            .select_within(block, &self.selectors.spec_list_item)
            .await?
        {
            let text = session.read_text(&item).await?;
            let text = text.trim();
            if !text.is_empty() {
                items.push(text.to_string());
            }
        }

        Ok(if items.is_empty() {
            SpecValue::Missing
        } else {
            SpecValue::List(items)
        })
    }
}
