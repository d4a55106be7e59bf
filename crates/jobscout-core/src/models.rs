use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

/// Stable identifier of a job source, used as a map key everywhere.
///
/// Stored lowercased and trimmed so `"LinkedIn "` and `"linkedin"` name the
/// same source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        SourceId::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        SourceId::new(s)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

/// Employment type of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full_time",
            JobType::PartTime => "part_time",
            JobType::Contract => "contract",
            JobType::Temporary => "temporary",
            JobType::Internship => "internship",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "full_time" | "fulltime" => Ok(JobType::FullTime),
            "part_time" | "parttime" => Ok(JobType::PartTime),
            "contract" | "contractor" => Ok(JobType::Contract),
            "temporary" | "temp" => Ok(JobType::Temporary),
            "internship" | "intern" => Ok(JobType::Internship),
            _ => Err(format!("Unknown job type: {}", s)),
        }
    }
}

/// Pay period of a salary figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayPeriod {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    #[default]
    Yearly,
}

impl PayPeriod {
    /// Multiplier converting an amount in this period to a yearly equivalent.
    pub fn yearly_multiplier(&self) -> f64 {
        match self {
            PayPeriod::Hourly => 2080.0,
            PayPeriod::Daily => 260.0,
            PayPeriod::Weekly => 52.0,
            PayPeriod::Monthly => 12.0,
            PayPeriod::Yearly => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayPeriod::Hourly => "hourly",
            PayPeriod::Daily => "daily",
            PayPeriod::Weekly => "weekly",
            PayPeriod::Monthly => "monthly",
            PayPeriod::Yearly => "yearly",
        }
    }
}

impl FromStr for PayPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" | "hour" | "hr" => Ok(PayPeriod::Hourly),
            "daily" | "day" => Ok(PayPeriod::Daily),
            "weekly" | "week" => Ok(PayPeriod::Weekly),
            "monthly" | "month" => Ok(PayPeriod::Monthly),
            "yearly" | "year" | "annual" | "annually" => Ok(PayPeriod::Yearly),
            _ => Err(format!("Unknown pay period: {}", s)),
        }
    }
}

/// Salary range as advertised by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Salary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: String,
    pub period: PayPeriod,
}

impl Salary {
    pub fn new(min: Option<f64>, max: Option<f64>, period: PayPeriod) -> Self {
        Self {
            min,
            max,
            currency: "USD".to_string(),
            period,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// True when at least one bound is present.
    pub fn is_disclosed(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Midpoint of the range in this salary's own period.
    pub fn midpoint(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some((min + max) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }

    /// Midpoint normalized to a yearly equivalent.
    pub fn yearly_midpoint(&self) -> Option<f64> {
        self.midpoint().map(|m| m * self.period.yearly_multiplier())
    }
}

/// A single job listing as returned by a source fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPosting {
    /// SHA-256 of `source|url`, see [`posting_id`].
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<Salary>,
    pub description: String,
    pub url: String,
    pub source: SourceId,
    pub job_type: Option<JobType>,
    pub posted_date: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RawPosting {
    pub fn new(
        source: SourceId,
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: posting_id(&source, &url),
            title: title.into(),
            company: company.into(),
            location: location.into(),
            salary: None,
            description: String::new(),
            url,
            source,
            job_type: None,
            posted_date: None,
            scraped_at: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_salary(mut self, salary: Salary) -> Self {
        self.salary = Some(salary);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    pub fn with_posted_date(mut self, posted: DateTime<Utc>) -> Self {
        self.posted_date = Some(posted);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True when the posting has a salary with at least one bound.
    pub fn has_salary(&self) -> bool {
        self.salary.as_ref().is_some_and(Salary::is_disclosed)
    }

    /// Remote if the location says so or the source flagged it in metadata.
    pub fn is_remote(&self) -> bool {
        let loc = self.location.to_lowercase();
        loc.contains("remote")
            || loc.contains("anywhere")
            || self
                .metadata
                .get("remote")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
    }
}

/// Compute the stable id of a posting from its source and URL.
pub fn posting_id(source: &SourceId, url: &str) -> String {
    compute_hash(&format!("{}|{}", source, url))
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Default per-source timeout.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Input to a single search. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingQuery {
    pub keywords: String,
    pub location: Option<String>,
    pub job_type: Option<JobType>,
    pub max_results_per_source: usize,
    pub posted_within_days: Option<u32>,
    pub sources: Vec<SourceId>,
    /// Per-source timeout; each source is raced against it independently.
    pub timeout: Duration,
    pub deduplicate: bool,
}

impl PostingQuery {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location: None,
            job_type: None,
            max_results_per_source: 50,
            posted_within_days: None,
            sources: Vec::new(),
            timeout: DEFAULT_SOURCE_TIMEOUT,
            deduplicate: true,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results_per_source = max;
        self
    }

    pub fn with_posted_within_days(mut self, days: u32) -> Self {
        self.posted_within_days = Some(days);
        self
    }

    pub fn with_source(mut self, source: impl Into<SourceId>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceId>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }
}

/// Classification of a per-source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchErrorKind {
    Timeout,
    /// An anti-automation signal was detected; retrying makes it worse.
    RateLimited,
    NetworkError,
    /// The structure the fetcher expects is gone.
    ParseError,
    InvalidConfig,
    GenericFailure,
}

impl FetchErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout | FetchErrorKind::NetworkError | FetchErrorKind::GenericFailure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "TIMEOUT",
            FetchErrorKind::RateLimited => "RATE_LIMITED",
            FetchErrorKind::NetworkError => "NETWORK_ERROR",
            FetchErrorKind::ParseError => "PARSE_ERROR",
            FetchErrorKind::InvalidConfig => "INVALID_CONFIG",
            FetchErrorKind::GenericFailure => "GENERIC_FAILURE",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, per-source failure. Always reported, never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchError {
    pub source: SourceId,
    pub message: String,
    pub kind: FetchErrorKind,
    pub timestamp: DateTime<Utc>,
    pub context: Option<serde_json::Value>,
}

impl FetchError {
    pub fn new(source: SourceId, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            kind,
            timestamp: Utc::now(),
            context: None,
        }
    }

    pub fn from_app_error(source: SourceId, error: &AppError) -> Self {
        Self::new(source, error.kind(), error.to_string())
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Result of one fetcher run for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub source: SourceId,
    pub postings: Vec<RawPosting>,
    /// Postings the source reported, which may exceed `postings.len()`.
    pub total_found: usize,
    pub errors: Vec<FetchError>,
    pub fetched_at: DateTime<Utc>,
    pub duration: Duration,
}

impl FetchOutcome {
    pub fn new(source: SourceId, postings: Vec<RawPosting>) -> Self {
        Self {
            source,
            total_found: postings.len(),
            postings,
            errors: Vec::new(),
            fetched_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// An outcome carrying only a failure.
    pub fn failed(source: SourceId, error: FetchError) -> Self {
        Self {
            source,
            postings: Vec::new(),
            total_found: 0,
            errors: vec![error],
            fetched_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn with_error(mut self, error: FetchError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Zero postings and at least one error.
    pub fn is_failure(&self) -> bool {
        self.postings.is_empty() && !self.errors.is_empty()
    }
}

/// Final union of a search across all requested sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub search_id: Uuid,
    pub postings: Vec<RawPosting>,
    pub total_postings: usize,
    pub unique_postings: usize,
    pub duplicates_removed: usize,
    pub outcomes: BTreeMap<SourceId, FetchOutcome>,
    pub errors: Vec<FetchError>,
    pub successful_sources: Vec<SourceId>,
    pub failed_sources: Vec<SourceId>,
    pub duration: Duration,
    /// True whenever any requested source failed or timed out.
    pub partial_results: bool,
}

impl SearchReport {
    /// Empty posting list with errors: every source failed.
    pub fn failed_everywhere(&self) -> bool {
        self.postings.is_empty() && !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_posting_id_depends_on_source_and_url() {
        let a = posting_id(&SourceId::new("indeed"), "https://x.test/1");
        let b = posting_id(&SourceId::new("linkedin"), "https://x.test/1");
        let c = posting_id(&SourceId::new("indeed"), "https://x.test/2");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, posting_id(&SourceId::new(" Indeed "), "https://x.test/1"));
    }

    #[test]
    fn test_salary_yearly_midpoint() {
        let hourly = Salary::new(Some(35.0), None, PayPeriod::Hourly);
        assert_eq!(hourly.yearly_midpoint(), Some(72_800.0));

        let monthly = Salary::new(Some(5_000.0), Some(7_000.0), PayPeriod::Monthly);
        assert_eq!(monthly.yearly_midpoint(), Some(72_000.0));

        let empty = Salary::new(None, None, PayPeriod::Yearly);
        assert!(!empty.is_disclosed());
        assert_eq!(empty.yearly_midpoint(), None);
    }

    #[test]
    fn test_pay_period_multipliers() {
        assert_eq!(PayPeriod::Daily.yearly_multiplier(), 260.0);
        assert_eq!(PayPeriod::Weekly.yearly_multiplier(), 52.0);
        assert_eq!("annual".parse::<PayPeriod>().unwrap(), PayPeriod::Yearly);
        assert!("fortnightly".parse::<PayPeriod>().is_err());
    }

    #[test]
    fn test_job_type_parse() {
        assert_eq!("Full-Time".parse::<JobType>().unwrap(), JobType::FullTime);
        assert_eq!("intern".parse::<JobType>().unwrap(), JobType::Internship);
        assert!("gig".parse::<JobType>().is_err());
    }

    #[test]
    fn test_remote_detection() {
        let src = SourceId::new("test");
        assert!(RawPosting::new(src.clone(), "Dev", "Acme", "Remote (US)", "u1").is_remote());
        assert!(
            RawPosting::new(src.clone(), "Dev", "Acme", "Austin, TX", "u2")
                .with_metadata("remote", serde_json::json!(true))
                .is_remote()
        );
        assert!(!RawPosting::new(src, "Dev", "Acme", "Austin, TX", "u3").is_remote());
    }

    #[test]
    fn test_outcome_failure_classification() {
        let src = SourceId::new("test");
        let err = FetchError::new(src.clone(), FetchErrorKind::NetworkError, "down");
        assert!(FetchOutcome::failed(src.clone(), err.clone()).is_failure());

        let posting = RawPosting::new(src.clone(), "Dev", "Acme", "Remote", "u1");
        let partial = FetchOutcome::new(src.clone(), vec![posting]).with_error(err);
        assert!(!partial.is_failure());
        assert!(!FetchOutcome::new(src, vec![]).is_failure());
    }

    #[test]
    fn test_fetch_error_retryable_follows_kind() {
        let src = SourceId::new("test");
        assert!(FetchError::new(src.clone(), FetchErrorKind::NetworkError, "x").retryable());
        assert!(!FetchError::new(src, FetchErrorKind::RateLimited, "x").retryable());
    }

    #[test]
    fn test_source_id_normalized_when_deserialized() {
        let id: SourceId = serde_json::from_str(r#"" LinkedIn ""#).unwrap();
        assert_eq!(id.as_str(), "linkedin");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""linkedin""#);
    }
}
