mod sources;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobscout_client::FeedFetcher;
use jobscout_core::{
    JobType, PayPeriod, PostingQuery, RemotePreference, SalaryPreference, ScoringCriteria,
    ScoringEngine, ScoringWeights, SearchConfig, SearchService, SourceId,
};

use crate::sources::load_sources;

#[derive(Parser)]
#[command(name = "jobscout", version, about = "Search job feeds concurrently, deduplicate and rank postings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search across the configured sources
    Search(SearchArgs),

    /// List configured sources
    Sources {
        /// JSON file describing the job feeds
        #[arg(long, env = "JOBSCOUT_SOURCES", default_value = "sources.json")]
        sources_file: PathBuf,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Search keywords
    query: String,

    /// JSON file describing the job feeds
    #[arg(long, env = "JOBSCOUT_SOURCES", default_value = "sources.json")]
    sources_file: PathBuf,

    /// Location filter passed to every source
    #[arg(short, long)]
    location: Option<String>,

    /// Only search these sources (repeatable; defaults to all configured)
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Per-source timeout in seconds
    #[arg(long, env = "JOBSCOUT_TIMEOUT_SECS", default_value_t = 60)]
    timeout: u64,

    /// Maximum postings requested from each source
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Employment type filter (full-time, part-time, contract, temporary, internship)
    #[arg(long)]
    job_type: Option<String>,

    /// Only postings from the last N days
    #[arg(long)]
    days: Option<u32>,

    /// Keep duplicate postings
    #[arg(long, default_value_t = false)]
    no_dedup: bool,

    /// Allow feeds on private/loopback addresses
    #[arg(long, default_value_t = false)]
    allow_private: bool,

    /// Rank the postings instead of printing the raw report
    #[arg(long, default_value_t = false)]
    score: bool,

    /// Title keywords for ranking (repeatable; defaults to the query)
    #[arg(long = "keywords")]
    keywords: Vec<String>,

    /// Preferred location for ranking
    #[arg(long)]
    prefer_location: Option<String>,

    /// Remote preference for ranking
    #[arg(long, value_enum, default_value_t = RemoteArg::Any)]
    remote: RemoteArg,

    /// Minimum acceptable salary, in --salary-period units
    #[arg(long)]
    salary_min: Option<f64>,

    /// Maximum expected salary, in --salary-period units
    #[arg(long)]
    salary_max: Option<f64>,

    /// Period of --salary-min/--salary-max (hourly, daily, weekly, monthly, yearly)
    #[arg(long, default_value = "yearly")]
    salary_period: String,

    /// Factor weights as "location,title,salary,source", summing to 1
    #[arg(long)]
    weights: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RemoteArg {
    Any,
    RemoteOnly,
    OnsiteOnly,
}

impl From<RemoteArg> for RemotePreference {
    fn from(arg: RemoteArg) -> Self {
        match arg {
            RemoteArg::Any => RemotePreference::Any,
            RemoteArg::RemoteOnly => RemotePreference::RemoteOnly,
            RemoteArg::OnsiteOnly => RemotePreference::OnsiteOnly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobscout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => cmd_search(args).await?,
        Commands::Sources { sources_file } => cmd_sources(&sources_file)?,
    }

    Ok(())
}

async fn cmd_search(args: SearchArgs) -> Result<()> {
    let query = build_query(&args)?;
    let criteria = if args.score {
        Some(build_criteria(&args)?)
    } else {
        None
    };
    let weights = match &args.weights {
        Some(raw) => parse_weights(raw)?,
        None => ScoringWeights::default(),
    };

    let mut service = SearchService::new().with_config(SearchConfig::default());
    for config in load_sources(&args.sources_file)? {
        let id = config.id.clone();
        let mut fetcher = FeedFetcher::new(config)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to set up source '{id}'"))?;
        if args.allow_private {
            fetcher = fetcher.allow_private_urls();
        }
        service.register(fetcher);
    }
    let query = if query.sources.is_empty() {
        query.with_sources(service.sources())
    } else {
        query
    };

    let service = Arc::new(service);
    let stop = CancellationToken::new();
    let poller = tokio::spawn(poll_progress(
        Arc::clone(&service),
        service.config().progress_interval,
        stop.clone(),
    ));

    let result = service.search(&query).await;
    stop.cancel();
    let _ = poller.await;
    service.close().await;
    let report = result.map_err(|e| anyhow::anyhow!(e))?;

    if report.failed_everywhere() {
        tracing::warn!("Every source failed");
    }

    let output = match criteria {
        Some(criteria) => {
            let ranked = ScoringEngine::new(weights).score(&report.postings, &criteria);
            json!({
                "search_id": report.search_id,
                "partial_results": report.partial_results,
                "successful_sources": report.successful_sources,
                "failed_sources": report.failed_sources,
                "errors": report.errors,
                "duplicates_removed": report.duplicates_removed,
                "ranked": ranked,
            })
        }
        None => serde_json::to_value(&report)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Log per-source progress until `stop` fires.
async fn poll_progress(service: Arc<SearchService>, every: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(100)));
    ticker.tick().await;
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                for p in service.progress() {
                    tracing::info!(
                        source = %p.source,
                        status = %p.status,
                        progress = p.progress,
                        postings = p.postings_found,
                        "Progress"
                    );
                }
            }
        }
    }
}

fn cmd_sources(path: &Path) -> Result<()> {
    let sources = load_sources(path)?;
    let listing: Vec<_> = sources
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "url": s.url.as_str(),
                "timeout_secs": s.request_timeout().as_secs(),
                "user_agent": s.user_agent,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn build_query(args: &SearchArgs) -> Result<PostingQuery> {
    if args.query.trim().is_empty() {
        bail!("Search query must not be empty");
    }
    if args.timeout == 0 {
        bail!("--timeout must be at least 1 second");
    }

    let mut query = PostingQuery::new(args.query.trim())
        .with_max_results(args.limit)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_deduplicate(!args.no_dedup)
        .with_sources(args.sources.iter().map(|s| SourceId::new(s)));
    if let Some(location) = &args.location {
        query = query.with_location(location);
    }
    if let Some(raw) = &args.job_type {
        let job_type: JobType = raw.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        query = query.with_job_type(job_type);
    }
    if let Some(days) = args.days {
        query = query.with_posted_within_days(days);
    }
    Ok(query)
}

fn build_criteria(args: &SearchArgs) -> Result<ScoringCriteria> {
    let mut criteria = ScoringCriteria::new().with_remote(args.remote.into());
    let keywords = if args.keywords.is_empty() {
        vec![args.query.clone()]
    } else {
        args.keywords.clone()
    };
    for keyword in keywords {
        criteria = criteria.with_keyword(keyword);
    }
    if let Some(location) = args.prefer_location.as_ref().or(args.location.as_ref()) {
        criteria = criteria.with_location(location);
    }
    if args.salary_min.is_some() || args.salary_max.is_some() {
        let period: PayPeriod = args
            .salary_period
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        criteria = criteria.with_salary(SalaryPreference {
            min: args.salary_min,
            max: args.salary_max,
            period,
        });
    }
    Ok(criteria)
}

/// Parse "location,title,salary,source" into validated weights.
fn parse_weights(raw: &str) -> Result<ScoringWeights> {
    let parts = raw
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid weight '{}'", p.trim()))
        })
        .collect::<Result<Vec<_>>>()?;
    let [location, title, salary, source] = parts[..] else {
        bail!("Expected 4 comma-separated weights, got {}", parts.len());
    };
    ScoringWeights::new(location, title, salary, source).map_err(|e| anyhow::anyhow!(e))
}
