//! Infrastructure layer
//!
//! Configuration, logging, page loading and rendering, schema files and
//! output sinks.

pub mod config;
pub mod logging;
pub mod rendering;
pub mod schema_loader;
pub mod sink;

pub use config::{ConfigManager, CrawlerConfig, OutputFormat, SiteSelectors};
pub use logging::{cleanup_old_logs, init_logging, init_logging_with_config};
pub use rendering::{
    DocumentSurface, HttpPageLoader, HttpRenderingSurface, ReplayPageLoader,
    ReplayRenderingSurface, SessionStats,
};
pub use schema_loader::load_schema_registry;
pub use sink::{CsvSink, JsonSink, RecordCount, count_records, sink_for};
