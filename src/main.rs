//! catalog-crawler command line entry point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use catalog_crawler::application::{ConverterRegistry, CrawlDriver, CrawlRequest, SchemaMapper};
use catalog_crawler::domain::services::RenderingSurface;
use catalog_crawler::domain::{SchemaPolicy, SchemaRegistry};
use catalog_crawler::infrastructure::config::{ConfigManager, CrawlerConfig, OutputFormat};
use catalog_crawler::infrastructure::logging::init_logging_with_config;
use catalog_crawler::infrastructure::rendering::{DocumentSurface, HttpPageLoader, ReplayPageLoader};
use catalog_crawler::infrastructure::schema_loader::load_schema_registry;
use catalog_crawler::infrastructure::sink::{count_records, sink_for};

#[derive(Parser, Debug)]
#[command(name = "catalog-crawler", version, about = "Paginated product catalog crawler")]
struct Cli {
    /// Configuration file (TOML or JSON); defaults to config/crawler.* when present
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl categories and write one output file per category
    Crawl(CrawlArgs),
    /// Count records in an output directory
    Count {
        /// Directory holding .json or .csv output files
        directory: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Category names or slugs; all discovered categories when omitted
    categories: Vec<String>,

    /// Concurrent detail-page sessions
    #[arg(long)]
    concurrency: Option<usize>,

    /// Serve pages from a recorded directory (manifest.json) instead of HTTP
    #[arg(long, value_name = "DIR")]
    replay: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    #[arg(long, short, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Listing pages visited per category at most
    #[arg(long)]
    max_pages: Option<u32>,

    /// Keep raw labels missing from the schema instead of halting the category
    #[arg(long)]
    lenient: bool,

    /// Serialization map (JSON), overrides schema.path
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl CrawlArgs {
    fn apply(&self, config: &mut CrawlerConfig) {
        if let Some(concurrency) = self.concurrency {
            config.crawl.concurrency_limit = concurrency;
        }
        if let Some(max_pages) = self.max_pages {
            config.crawl.max_pages_per_category = Some(max_pages);
        }
        if self.lenient {
            config.crawl.schema_policy = SchemaPolicy::Lenient;
        }
        if let Some(format) = self.format {
            config.output.format = format.into();
        }
        if let Some(output) = &self.output {
            config.output.directory.clone_from(output);
        }
        if let Some(schema) = &self.schema {
            config.schema.path = Some(schema.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigManager::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;
    if let Command::Crawl(args) = &cli.command {
        args.apply(&mut config);
        config.validate().context("Invalid command line overrides")?;
    }

    init_logging_with_config(&config.logging)?;

    match cli.command {
        Command::Crawl(args) => crawl(config, &args).await,
        Command::Count { directory } => count(&directory).await,
    }
}

async fn crawl(config: CrawlerConfig, args: &CrawlArgs) -> Result<()> {
    let registry = match &config.schema.path {
        Some(path) => load_schema_registry(path).await?,
        None => {
            warn!("No schema path configured; every category is crawled leniently");
            SchemaRegistry::new()
        }
    };

    let mut converters = ConverterRegistry::with_builtins();
    converters.bind_all(&config.schema.converters)?;

    let mapper = Arc::new(SchemaMapper::new(
        Arc::new(registry),
        Arc::new(converters),
        config.crawl.schema_policy,
    ));
    let sink = sink_for(config.output.format, config.output.directory.clone());

    let surface: Arc<dyn RenderingSurface> = match &args.replay {
        Some(directory) => {
            let loader = ReplayPageLoader::from_directory(directory)
                .with_context(|| format!("Failed to load replay directory {directory:?}"))?;
            info!("📼 Replaying {} recorded pages from {:?}", loader.page_count(), directory);
            Arc::new(DocumentSurface::new(loader))
        }
        None => Arc::new(DocumentSurface::new(HttpPageLoader::new(&config.http)?)),
    };

    let request = CrawlRequest::new(args.categories.clone(), config.crawl.concurrency());
    let driver = CrawlDriver::new(surface, mapper, sink, Arc::new(config));
    let report = driver.run(&request).await?;
    report.log_summary();
    Ok(())
}

async fn count(directory: &Path) -> Result<()> {
    let counts = count_records(directory).await?;
    for (file, records) in &counts.files {
        println!("{file}: {records}");
    }
    println!("Total records: {}", counts.total);
    Ok(())
}
