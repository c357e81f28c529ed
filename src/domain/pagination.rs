//! Listing page addressing and page-range planning.
//!
//! Responsibility:
//! - `page_url`: the single place that knows how a site encodes page numbers
//! - `PagePlan`: detected page count combined with the configured cap

use serde::{Deserialize, Serialize};
use url::Url;

/// How a listing page number is encoded in the category URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageAddressing {
    /// `?page=3`
    Query { param: String },
    /// `/page/3/`
    PathSegment { segment: String },
    /// `#page=3`
    Fragment { key: String },
}

impl Default for PageAddressing {
    fn default() -> Self {
        Self::Query {
            param: "page".to_string(),
        }
    }
}

impl PageAddressing {
    /// Compose the URL of listing page `page` (1-based).
    ///
    /// Page 1 goes through the same composition as every other page.
    pub fn page_url(&self, category_url: &Url, page: u32) -> Url {
        let mut url = category_url.clone();
        match self {
            Self::Query { param } => {
                let retained: Vec<(String, String)> = category_url
                    .query_pairs()
                    .filter(|(key, _)| key != param.as_str())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(retained)
                    .append_pair(param, &page.to_string());
            }
            Self::PathSegment { segment } => {
                let base = category_url.path().trim_end_matches('/');
                url.set_path(&format!("{base}/{segment}/{page}/"));
            }
            Self::Fragment { key } => {
                url.set_fragment(Some(&format!("{key}={page}")));
            }
        }
        url
    }
}

/// Pages to visit for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub detected_pages: u32,
    pub pages_to_visit: u32,
}

impl PagePlan {
    /// `cap` limits the visit range; `None` visits everything detected
    pub fn new(detected_pages: u32, cap: Option<u32>) -> Self {
        let detected_pages = detected_pages.max(1);
        let pages_to_visit = cap.map_or(detected_pages, |cap| detected_pages.min(cap.max(1)));
        Self {
            detected_pages,
            pages_to_visit,
        }
    }

    pub fn is_capped(&self) -> bool {
        self.pages_to_visit < self.detected_pages
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        1..=self.pages_to_visit
    }
}
