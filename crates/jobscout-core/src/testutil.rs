//! Test utilities: mock fetchers and reporters.
//!
//! Handwritten mocks for dependency injection in unit tests. They use
//! `Arc<Mutex<_>>` for interior mutability so clones handed to the service
//! still let the test assert on recorded calls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{FetchOutcome, PostingQuery, RawPosting, SourceId};
use crate::report::{SearchEvent, SearchReporter};
use crate::traits::Fetcher;

/// Build a posting with the given fields and nothing else.
pub fn posting(source: &str, title: &str, company: &str, location: &str, url: &str) -> RawPosting {
    RawPosting::new(SourceId::new(source), title, company, location, url)
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    Postings(Vec<RawPosting>),
    /// Taken on the first call; later calls return no postings.
    Error(Arc<Mutex<Option<AppError>>>),
    Hang,
    Panic,
}

/// Mock fetcher with a fixed behavior, counting fetch and close calls.
#[derive(Clone)]
pub struct MockFetcher {
    source: SourceId,
    behavior: Behavior,
    delay: Option<Duration>,
    fail_close: bool,
    fetch_calls: Arc<Mutex<usize>>,
    close_calls: Arc<Mutex<usize>>,
    in_flight: Arc<AtomicUsize>,
    closed_mid_fetch: Arc<AtomicBool>,
}

/// Counts a fetch as in flight until dropped, including on cancel or panic.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFetcher {
    fn with_behavior(source: &str, behavior: Behavior) -> Self {
        Self {
            source: SourceId::new(source),
            behavior,
            delay: None,
            fail_close: false,
            fetch_calls: Arc::new(Mutex::new(0)),
            close_calls: Arc::new(Mutex::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            closed_mid_fetch: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn new(source: &str, postings: Vec<RawPosting>) -> Self {
        Self::with_behavior(source, Behavior::Postings(postings))
    }

    /// Returns `Err(error)` from `fetch`.
    pub fn with_error(source: &str, error: AppError) -> Self {
        Self::with_behavior(source, Behavior::Error(Arc::new(Mutex::new(Some(error)))))
    }

    /// A fetch that never resolves.
    pub fn hanging(source: &str) -> Self {
        Self::with_behavior(source, Behavior::Hang)
    }

    pub fn panicking(source: &str) -> Self {
        Self::with_behavior(source, Behavior::Panic)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetch_calls.lock().unwrap()
    }

    pub fn close_count(&self) -> usize {
        *self.close_calls.lock().unwrap()
    }

    /// Whether `close` was ever called while a fetch was running.
    pub fn closed_mid_fetch(&self) -> bool {
        self.closed_mid_fetch.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    fn source_id(&self) -> SourceId {
        self.source.clone()
    }

    async fn fetch(&self, _query: &PostingQuery) -> Result<FetchOutcome, AppError> {
        *self.fetch_calls.lock().unwrap() += 1;
        let _running = InFlight::enter(&self.in_flight);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            Behavior::Postings(postings) => Ok(FetchOutcome::new(self.source.clone(), postings.clone())),
            Behavior::Error(error) => match error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(FetchOutcome::new(self.source.clone(), Vec::new())),
            },
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("fetcher {} exploded", self.source),
        }
    }

    async fn close(&self) -> Result<(), AppError> {
        *self.close_calls.lock().unwrap() += 1;
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            self.closed_mid_fetch.store(true, Ordering::SeqCst);
        }
        if self.fail_close {
            return Err(AppError::Generic("session already gone".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records a compact tag per event.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl SearchReporter for RecordingReporter {
    fn report(&self, event: SearchEvent<'_>) {
        let tag = match event {
            SearchEvent::SearchStarted { .. } => "search_started".to_string(),
            SearchEvent::SourceStarted { source, .. } => format!("source_started:{source}"),
            SearchEvent::SourceCompleted { source, .. } => format!("source_completed:{source}"),
            SearchEvent::SourceFailed { source, kind, .. } => format!("source_failed:{source}:{kind}"),
            SearchEvent::SourceTimedOut { source, .. } => format!("source_timed_out:{source}"),
            SearchEvent::Deduplicated { .. } => "deduplicated".to_string(),
            SearchEvent::SearchFinished { .. } => "search_finished".to_string(),
        };
        self.events.lock().unwrap().push(tag);
    }
}
