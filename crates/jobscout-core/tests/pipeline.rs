//! Search, deduplicate and rank across several in-process sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jobscout_core::models::FetchErrorKind;
use jobscout_core::scoring::Factor;
use jobscout_core::{
    AppError, FetchError, FetchOutcome, Fetcher, PayPeriod, PostingQuery, RawPosting,
    RemotePreference, Salary, SalaryPreference, ScoringCriteria, ScoringEngine, ScoringWeights,
    SearchService, SourceId, SourceStatus, score_postings,
};

/// Board that serves a fixed page after an optional delay.
struct StaticBoard {
    id: &'static str,
    postings: Vec<RawPosting>,
    errors: Vec<FetchErrorKind>,
    delay: Duration,
    closes: Arc<AtomicUsize>,
}

impl StaticBoard {
    fn new(id: &'static str, postings: Vec<RawPosting>) -> Self {
        Self {
            id,
            postings,
            errors: Vec::new(),
            delay: Duration::ZERO,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_error(mut self, kind: FetchErrorKind) -> Self {
        self.errors.push(kind);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Fetcher for StaticBoard {
    fn source_id(&self) -> SourceId {
        SourceId::new(self.id)
    }

    async fn fetch(&self, _query: &PostingQuery) -> Result<FetchOutcome, AppError> {
        tokio::time::sleep(self.delay).await;
        let source = SourceId::new(self.id);
        let mut outcome = FetchOutcome::new(source.clone(), self.postings.clone());
        for kind in &self.errors {
            outcome = outcome.with_error(FetchError::new(source.clone(), *kind, "page 2 failed"));
        }
        Ok(outcome)
    }

    async fn close(&self) -> Result<(), AppError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn linkedin_page() -> Vec<RawPosting> {
    let src = SourceId::new("linkedin");
    vec![
        RawPosting::new(src.clone(), "Senior Rust Engineer", "Acme", "Seattle, WA", "https://l/1")
            .with_posted_date(now() - TimeDelta::days(3)),
        RawPosting::new(src.clone(), "Staff Platform Engineer", "Initech", "Remote", "https://l/2")
            .with_salary(Salary::new(Some(190_000.0), Some(230_000.0), PayPeriod::Yearly)),
        RawPosting::new(src, "Office Manager", "Globex", "Miami, FL", "https://l/3"),
    ]
}

fn indeed_page() -> Vec<RawPosting> {
    let src = SourceId::new("indeed");
    vec![
        // Same job as linkedin's first posting, but with a salary.
        RawPosting::new(src.clone(), "Senior Rust Engineer", "ACME", " Seattle, WA", "https://i/9")
            .with_salary(Salary::new(Some(160_000.0), Some(185_000.0), PayPeriod::Yearly)),
        RawPosting::new(src, "Rust Developer", "Hooli", "Bellevue, WA", "https://i/10")
            .with_salary(Salary::new(Some(80.0), Some(90.0), PayPeriod::Hourly)),
    ]
}

#[tokio::test(start_paused = true)]
async fn search_dedup_and_rank() {
    let linkedin = StaticBoard::new("linkedin", linkedin_page()).with_delay(Duration::from_millis(300));
    let indeed = StaticBoard::new("indeed", indeed_page()).with_error(FetchErrorKind::ParseError);
    let dead = StaticBoard::new("dice", Vec::new()).with_error(FetchErrorKind::RateLimited);
    let closes = [
        Arc::clone(&linkedin.closes),
        Arc::clone(&indeed.closes),
        Arc::clone(&dead.closes),
    ];

    let service = SearchService::new()
        .with_fetcher(linkedin)
        .with_fetcher(indeed)
        .with_fetcher(dead);
    let query = PostingQuery::new("senior rust engineer")
        .with_location("Seattle, WA")
        .with_sources(["linkedin", "indeed", "dice"])
        .with_timeout(Duration::from_secs(5));

    let report = service.search(&query).await.unwrap();

    assert_eq!(report.total_postings, 5);
    assert_eq!(report.unique_postings, 4);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.failed_sources, vec![SourceId::new("dice")]);
    assert_eq!(report.successful_sources.len(), 2);
    assert!(report.partial_results);
    // Partial-page errors from a successful source are still surfaced.
    assert_eq!(report.errors.len(), 2);
    for c in &closes {
        assert_eq!(c.load(Ordering::SeqCst), 1);
    }

    let merged = report
        .postings
        .iter()
        .find(|p| p.title == "Senior Rust Engineer")
        .unwrap();
    assert!(merged.has_salary(), "record with salary should win the merge");

    let progress = service.progress();
    assert_eq!(progress.len(), 3);
    let dice = progress.iter().find(|p| p.source.as_str() == "dice").unwrap();
    assert_eq!(dice.status, SourceStatus::Failed);

    let criteria = ScoringCriteria::new()
        .with_location("Seattle, WA")
        .with_keyword("senior rust engineer")
        .with_salary(SalaryPreference::yearly(Some(150_000.0), Some(200_000.0)));
    let ranked = ScoringEngine::default()
        .with_reference_time(now())
        .score(&report.postings, &criteria);

    assert_eq!(ranked.len(), 4);
    assert_eq!(ranked[0].posting.title, "Senior Rust Engineer");
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked.last().unwrap().posting.title, "Office Manager");
    for s in &ranked {
        assert!((0.0..=100.0).contains(&s.total_score));
        assert!(s.top_reasons.len() <= 5);
        assert!(s.factor(Factor::Salary).is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn every_source_failing_is_still_a_report() {
    let a = StaticBoard::new("a", Vec::new()).with_error(FetchErrorKind::NetworkError);
    let b = StaticBoard::new("b", Vec::new()).with_delay(Duration::from_secs(30));
    let service = SearchService::new().with_fetcher(a).with_fetcher(b);

    let report = service
        .search(
            &PostingQuery::new("anything")
                .with_sources(["a", "b"])
                .with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap();

    assert!(report.failed_everywhere());
    assert_eq!(report.failed_sources.len(), 2);
    let kinds: Vec<_> = report.errors.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&FetchErrorKind::Timeout));
    assert!(kinds.contains(&FetchErrorKind::NetworkError));
}

#[test]
fn remote_posting_scores_full_marks_for_location() {
    let posting = RawPosting::new(SourceId::new("remoteok"), "Rust Engineer", "Acme", "Remote", "u");
    let criteria = ScoringCriteria::new()
        .with_location("Austin, TX")
        .with_remote(RemotePreference::Any);
    let scored = score_postings(&[posting], &criteria, ScoringWeights::default()).unwrap();
    let location = scored[0].factor(Factor::Location).unwrap();
    assert_eq!(location.score, 100.0);
    assert_eq!(location.confidence, 1.0);
}

#[test]
fn hourly_salary_is_normalized_for_ranking() {
    let posting = RawPosting::new(SourceId::new("indeed"), "Analyst", "Acme", "Austin, TX", "u")
        .with_salary(Salary::new(Some(35.0), Some(35.0), PayPeriod::Hourly));
    let criteria = ScoringCriteria::new()
        .with_salary(SalaryPreference::yearly(Some(70_000.0), Some(90_000.0)));
    let scored = score_postings(&[posting], &criteria, ScoringWeights::default()).unwrap();
    assert!(scored[0].factor(Factor::Salary).unwrap().score >= 85.0);
}

#[test]
fn invalid_weights_are_rejected_up_front() {
    assert!(matches!(
        ScoringWeights::new(0.5, 0.5, 0.5, 0.5),
        Err(AppError::WeightInvariant { .. })
    ));
}
