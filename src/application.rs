//! Application layer
//!
//! Crawl orchestration on top of the domain services: category discovery,
//! pagination, listing and detail extraction, schema mapping and the
//! bounded worker pool.

pub mod category_discovery;
pub mod crawl_driver;
pub mod detail_worker;
pub mod listing_extractor;
pub mod pagination_controller;
pub mod schema_mapper;
pub mod spec_extractor;
pub mod worker_pool;

pub use category_discovery::CategoryDiscovery;
pub use crawl_driver::{
    CategoryOutcome, CategoryStatus, CrawlDriver, CrawlReport, CrawlRequest, FailureEntry,
    FailureScope,
};
pub use detail_worker::DetailPageWorker;
pub use listing_extractor::ListingExtractor;
pub use pagination_controller::{PaginationController, parse_page_count};
pub use schema_mapper::{Converter, ConverterRegistry, SchemaMapper};
pub use spec_extractor::{RawProductDetail, SpecExtractor};
pub use worker_pool::{BatchWorkerPool, PoolResult, ProductWorker, SlotFailure};
