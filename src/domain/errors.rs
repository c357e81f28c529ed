//! Crawl error taxonomy
//!
//! Navigation failures are recovered at product, page or category granularity.
//! Schema gaps are the only errors allowed to halt a category, and even those
//! never stop the crawl as a whole.

use thiserror::Error;

/// The rendering surface failed to produce a usable page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Failed to load {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Page {url} not ready: '{selector}' absent after {waited_ms}ms")]
    ReadyTimeout {
        url: String,
        selector: String,
        waited_ms: u64,
    },

    #[error("No page loaded in session")]
    NoPageLoaded,

    #[error("Element handle is stale (page was navigated since it was obtained)")]
    StaleHandle,

    #[error("Session already closed")]
    SessionClosed,
}

impl NavigationError {
    pub fn load_failed(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::LoadFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Schema configuration gaps surfaced while mapping spec labels
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("No mapping found for spec '{label}' in category '{category}'")]
    Violation { category: String, label: String },

    #[error("No custom converter registered for field '{field}' in category '{category}'")]
    MissingConverter { category: String, field: String },

    #[error("Spec '{label}' in category '{category}' maps to reserved column '{field}'")]
    ReservedField {
        category: String,
        label: String,
        field: String,
    },
}

impl SchemaError {
    pub fn violation(category: &str, label: &str) -> Self {
        Self::Violation {
            category: category.to_string(),
            label: label.to_string(),
        }
    }

    pub fn reserved_field(category: &str, label: &str, field: &str) -> Self {
        Self::ReservedField {
            category: category.to_string(),
            label: label.to_string(),
            field: field.to_string(),
        }
    }
}

/// Top-level error type flowing through the crawl pipeline
#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid CSS selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Worker task for {url} aborted: {reason}")]
    Worker { url: String, reason: String },
}

impl CrawlError {
    pub fn selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        Self::Selector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must stop the current category (schema gaps only)
    pub fn is_category_fatal(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_schema_errors_are_category_fatal() {
        let nav: CrawlError = NavigationError::load_failed("https://x.test/a", "timeout").into();
        assert!(!nav.is_category_fatal());

        let schema: CrawlError = SchemaError::violation("cpu", "Unknown Spec").into();
        assert!(schema.is_category_fatal());

        assert!(!CrawlError::selector("div[", "unexpected end").is_category_fatal());
    }

    #[test]
    fn violation_message_names_category_and_label() {
        let err = SchemaError::violation("cpu-cooler", "Fan RPM");
        assert_eq!(
            err.to_string(),
            "No mapping found for spec 'Fan RPM' in category 'cpu-cooler'"
        );
    }
}
