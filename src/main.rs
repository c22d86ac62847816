use clap::Parser;
use course_review_crawler::bruinwalk::Bruinwalk;
use course_review_crawler::catalog;
use course_review_crawler::checkpoint::CsvCheckpointStore;
use course_review_crawler::crawl::{CrawlConfig, Orchestrator};
use course_review_crawler::data;
use course_review_crawler::fetch::HttpFetcher;
use course_review_crawler::review::CourseReviewer;
use course_review_crawler::sentiment::{self, HttpClassifier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Crawl course reviews from a paginated review site into a CSV dataset,
/// resuming from the last checkpoint after an interruption.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Crawl a single department code instead of the full catalog
    #[arg(long)]
    dept: Option<u32>,

    /// Highest department code in full-catalog mode
    #[arg(long, default_value_t = 300)]
    dept_bound: u32,

    #[arg(long, default_value = "https://www.bruinwalk.com")]
    base_url: String,

    /// Checkpoint CSV path (a sibling .cursor file marks resume position)
    #[arg(long, default_value = "progress.csv")]
    checkpoint: PathBuf,

    /// Courses between checkpoint snapshots
    #[arg(long, default_value_t = 1000)]
    checkpoint_interval: usize,

    /// Courses crawled concurrently
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Final dataset path
    #[arg(long, default_value = "reviews.csv")]
    out: PathBuf,

    /// Sentiment classifier endpoint; enrichment is skipped when absent
    #[arg(long)]
    classifier_url: Option<String>,

    /// Minimum delay between requests, in milliseconds
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Retries per request for transient failures
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();

    let fetcher = Arc::new(HttpFetcher::new(
        Duration::from_millis(args.delay_ms),
        Duration::from_secs(args.timeout_secs),
        args.retries,
    )?);
    let departments = match args.dept {
        Some(code) => code..=code,
        None => 1..=args.dept_bound,
    };
    let courses =
        catalog::discover(fetcher.as_ref(), &Bruinwalk, &args.base_url, departments).await;
    info!("Catalog: {} courses", courses.len());

    let reviewer = CourseReviewer::new(Arc::clone(&fetcher), Bruinwalk, args.base_url.clone());
    let store = CsvCheckpointStore::new(&args.checkpoint);
    let orchestrator = Orchestrator::new(
        reviewer,
        store,
        CrawlConfig {
            checkpoint_interval: args.checkpoint_interval,
            workers: args.workers,
        },
    );

    let dataset = orchestrator.run(&courses).await?;
    info!("Crawl complete: {} records", dataset.len());

    let mut records = dataset.into_records();
    if let Some(endpoint) = args.classifier_url {
        let classifier = HttpClassifier::new(endpoint);
        sentiment::enrich_all(&classifier, &mut records).await;
    }

    let out = std::fs::File::create(&args.out)?;
    data::write_csv(out, &records)?;
    info!("Wrote {} records to {}", records.len(), args.out.display());

    Ok(())
}
