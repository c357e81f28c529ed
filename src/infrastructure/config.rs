//! Configuration infrastructure
//!
//! Settings are layered in this order, later sources winning:
//! 1. Built-in defaults (`defaults` module)
//! 2. Optional configuration file (TOML or JSON)
//! 3. `CRAWLER__`-prefixed environment variables, e.g.
//!    `CRAWLER__CRAWL__CONCURRENCY_LIMIT=8`

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::domain::category::Category;
use crate::domain::pagination::PageAddressing;
use crate::domain::schema::SchemaPolicy;
use crate::domain::services::ReadyWait;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete crawler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub site: SiteConfig,
    pub crawl: CrawlConfig,
    pub selectors: SelectorConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub schema: SchemaConfig,
    pub logging: LoggingConfig,
}

/// Where the catalog lives and how its listing pages are addressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Page holding the category links, relative to `base_url`
    pub entry_path: String,
    /// Path prefix shared by every category link
    pub catalog_prefix: String,
    pub page_addressing: PageAddressing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum live detail-page sessions
    pub concurrency_limit: usize,
    /// Upper bound on listing pages per category; `None` visits all
    pub max_pages_per_category: Option<u32>,
    /// Category names or slugs to crawl; empty means all discovered
    pub include_categories: Vec<String>,
    /// Category names or slugs to skip
    pub exclude_categories: Vec<String>,
    pub schema_policy: SchemaPolicy,
    pub ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

/// CSS selectors for every page the pipeline reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    pub category_link: String,
    pub pagination_link: String,
    pub product_row: String,
    pub product_link: String,
    pub spec_group: String,
    pub spec_title: String,
    pub spec_paragraph: String,
    pub spec_list_item: String,
    pub rating_summary: String,
    pub final_price: String,
    pub entry_ready: String,
    pub listing_ready: String,
    pub detail_ready: String,
}

/// Default selectors plus per-category replacements.
///
/// An override is a complete selector set; fields it leaves out fall back to
/// the built-in defaults, not to `defaults` from the same file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub defaults: SiteSelectors,
    pub overrides: HashMap<String, SiteSelectors>,
}

impl SelectorConfig {
    /// Selectors for a category, override looked up by slug then name
    pub fn for_category(&self, category: &Category) -> &SiteSelectors {
        self.overrides
            .get(category.slug())
            .or_else(|| self.overrides.get(&category.name))
            .unwrap_or(&self.defaults)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Serialization map file; without one every category runs lenient
    pub path: Option<PathBuf>,
    /// category -> canonical field -> built-in converter name
    pub converters: HashMap<String, HashMap<String, String>>,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    pub directory: PathBuf,

    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            entry_path: defaults::ENTRY_PATH.to_string(),
            catalog_prefix: defaults::CATALOG_PREFIX.to_string(),
            page_addressing: PageAddressing::default(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: defaults::CONCURRENCY_LIMIT,
            max_pages_per_category: defaults::MAX_PAGES_PER_CATEGORY,
            include_categories: Vec::new(),
            exclude_categories: Vec::new(),
            schema_policy: SchemaPolicy::default(),
            ready_timeout_ms: defaults::READY_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            category_link: defaults::selectors::CATEGORY_LINK.to_string(),
            pagination_link: defaults::selectors::PAGINATION_LINK.to_string(),
            product_row: defaults::selectors::PRODUCT_ROW.to_string(),
            product_link: defaults::selectors::PRODUCT_LINK.to_string(),
            spec_group: defaults::selectors::SPEC_GROUP.to_string(),
            spec_title: defaults::selectors::SPEC_TITLE.to_string(),
            spec_paragraph: defaults::selectors::SPEC_PARAGRAPH.to_string(),
            spec_list_item: defaults::selectors::SPEC_LIST_ITEM.to_string(),
            rating_summary: defaults::selectors::RATING_SUMMARY.to_string(),
            final_price: defaults::selectors::FINAL_PRICE.to_string(),
            entry_ready: defaults::selectors::READY.to_string(),
            listing_ready: defaults::selectors::READY.to_string(),
            detail_ready: defaults::selectors::READY.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::OUTPUT_DIRECTORY),
            format: OutputFormat::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            directory: PathBuf::from(defaults::LOG_DIRECTORY),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
        }
    }
}

impl SiteConfig {
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    pub fn entry_url(&self) -> Result<Url, url::ParseError> {
        self.base_url()?.join(&self.entry_path)
    }
}

impl CrawlConfig {
    pub fn ready_wait(&self) -> ReadyWait {
        ReadyWait::new(
            Duration::from_millis(self.ready_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    /// Validated limit; `validate` guarantees the fallback is never taken
    pub fn concurrency(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.concurrency_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl.concurrency_limit == 0 {
            return Err(ConfigError::validation(
                "crawl.concurrency_limit must be greater than 0",
            ));
        }

        if self.crawl.max_pages_per_category == Some(0) {
            return Err(ConfigError::validation(
                "crawl.max_pages_per_category must be greater than 0 when set",
            ));
        }

        if self.crawl.ready_timeout_ms == 0 || self.crawl.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "crawl.ready_timeout_ms and crawl.poll_interval_ms must be greater than 0",
            ));
        }

        if let Err(e) = self.site.entry_url() {
            return Err(ConfigError::validation(format!(
                "site.base_url '{}' with entry path '{}' is not a valid URL: {e}",
                self.site.base_url, self.site.entry_path
            )));
        }

        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "http.timeout_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Loads layered configuration
pub struct ConfigManager {
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Uses `config_path` when given (it must exist), else the optional
    /// `config/crawler.{toml,json}` next to the working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> Result<CrawlerConfig, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&CrawlerConfig::default())?);

        builder = match &self.config_path {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder.add_source(config::File::with_name(defaults::CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("crawl.include_categories")
                    .with_list_parse_key("crawl.exclude_categories"),
            )
            .build()?;

        let config: CrawlerConfig = settings.try_deserialize()?;
        config.validate()?;

        match &self.config_path {
            Some(path) => info!("Loaded configuration from: {:?}", path),
            None => info!("Loaded configuration from defaults and environment"),
        }
        Ok(config)
    }
}

/// Default configuration values
pub mod defaults {
    pub const CONFIG_FILE: &str = "config/crawler";
    pub const ENV_PREFIX: &str = "CRAWLER";

    pub const BASE_URL: &str = "https://pcpartpicker.com";
    pub const ENTRY_PATH: &str = "/products/";
    pub const CATALOG_PREFIX: &str = "/products/";

    /// Detail-page sessions alive at once
    pub const CONCURRENCY_LIMIT: usize = 5;
    pub const MAX_PAGES_PER_CATEGORY: Option<u32> = None;
    pub const READY_TIMEOUT_MS: u64 = 10_000;
    pub const POLL_INTERVAL_MS: u64 = 250;

    pub const USER_AGENT: &str = "catalog-crawler/0.1";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const OUTPUT_DIRECTORY: &str = "output";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_DIRECTORY: &str = "logs";
    pub const LOG_FILE_NAME: &str = "catalog-crawler.log";
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;

    pub mod selectors {
        pub const CATEGORY_LINK: &str = r#"a[href^="/products/"]"#;
        pub const PAGINATION_LINK: &str = "#module-pagination ul.pagination li a";
        pub const PRODUCT_ROW: &str = ".tr__product";
        pub const PRODUCT_LINK: &str = ".td__name a[href]";
        pub const SPEC_GROUP: &str = ".block.xs-block.md-hide.specs .group.group--spec";
        pub const SPEC_TITLE: &str = ".group__title";
        pub const SPEC_PARAGRAPH: &str = ".group__content p";
        pub const SPEC_LIST_ITEM: &str = ".group__content ul li";
        pub const RATING_SUMMARY: &str = ".actionBox__ratings ul.product--rating li:last-child";
        pub const FINAL_PRICE: &str = "#prices table tbody td.td__finalPrice a";
        pub const READY: &str = "body";
    }
}
