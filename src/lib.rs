//! Catalog Crawler - bounded-concurrency product catalog crawling
//!
//! Walks a paginated product catalog, visits every product detail page with
//! a fixed number of concurrent sessions, and normalizes the spec table of
//! each product through a per-category serialization schema.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CrawlDriver, CrawlReport, CrawlRequest};
pub use domain::{Category, CrawlError, CrawlResult, ProductRecord, SchemaPolicy, SchemaRegistry};
pub use infrastructure::{ConfigManager, CrawlerConfig};
