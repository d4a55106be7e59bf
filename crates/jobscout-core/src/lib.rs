pub mod config;
pub mod dedup;
pub mod error;
pub mod models;
pub mod progress;
pub mod report;
pub mod retry;
pub mod scoring;
pub mod search;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SearchConfig;
pub use dedup::{DedupResult, Deduplicator, deduplicate};
pub use error::AppError;
pub use models::{
    FetchError, FetchErrorKind, FetchOutcome, JobType, PayPeriod, PostingQuery, RawPosting,
    Salary, SearchReport, SourceId, compute_hash, posting_id,
};
pub use progress::{ProgressTracker, SearchProgress, SourceStatus};
pub use report::{SearchEvent, SearchReporter, TracingSearchReporter};
pub use retry::RetryPolicy;
pub use scoring::{
    RemotePreference, SalaryPreference, ScoredPosting, ScoringCriteria, ScoringEngine,
    ScoringWeights, score_postings,
};
pub use search::SearchService;
pub use traits::{DynFetcher, Fetcher};
