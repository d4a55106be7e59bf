//! Concurrent fan-out of one query across every requested source.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::dedup::Deduplicator;
use crate::error::AppError;
use crate::models::{FetchError, FetchOutcome, PostingQuery, SearchReport, SourceId};
use crate::progress::{ProgressTracker, SearchProgress};
use crate::report::{SearchEvent, SearchReporter, TracingSearchReporter};
use crate::traits::{DynFetcher, Fetcher};

type FetchResult = Result<FetchOutcome, AppError>;

/// `None` when the fetch was cancelled by [`SearchService::close`].
type TaskOutput = Option<Result<FetchResult, Box<dyn Any + Send>>>;

/// Keeps a fetcher's release from overlapping any fetch on it.
///
/// Every fetch holds a shared guard while it runs. A release that finds a
/// fetch in flight is parked, and whichever fetch leaves last runs the parked
/// releases, so a timed-out fetch from an earlier search never closes the
/// fetcher under a later one.
#[derive(Default)]
struct ReleaseGate {
    fetches: Arc<RwLock<()>>,
    pending: AtomicUsize,
}

impl ReleaseGate {
    async fn enter(&self) -> OwnedRwLockReadGuard<()> {
        Arc::clone(&self.fetches).read_owned().await
    }

    /// Queue one close, then run every queued close if no fetch is running.
    async fn release(&self, source: &SourceId, fetcher: &dyn DynFetcher) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        while self.pending.load(Ordering::SeqCst) > 0 {
            let Ok(_closing) = self.fetches.try_write() else {
                tracing::debug!(%source, "Fetch in flight, deferring close");
                return;
            };
            for _ in 0..self.pending.swap(0, Ordering::SeqCst) {
                if let Err(e) = fetcher.close_boxed().await {
                    tracing::warn!(%source, error = %e, "Failed to close fetcher after fetch");
                }
            }
        }
    }
}

struct Registered {
    fetcher: Arc<dyn DynFetcher>,
    gate: Arc<ReleaseGate>,
}

/// Runs registered fetchers concurrently and merges their results.
///
/// A slow or broken source never blocks or fails the others: each one is
/// raced against its own deadline and every failure is folded into the
/// report. Share it as `Arc<SearchService>` to poll [`progress`] while a
/// search is running.
///
/// [`progress`]: SearchService::progress
pub struct SearchService {
    fetchers: HashMap<SourceId, Registered>,
    progress: ProgressTracker,
    config: SearchConfig,
    reporter: Arc<dyn SearchReporter>,
    tracker: TaskTracker,
    cancel: Mutex<CancellationToken>,
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchService {
    pub fn new() -> Self {
        Self {
            fetchers: HashMap::new(),
            progress: ProgressTracker::new(),
            config: SearchConfig::default(),
            reporter: Arc::new(TracingSearchReporter),
            tracker: TaskTracker::new(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reporter(mut self, reporter: impl SearchReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn with_fetcher(mut self, fetcher: impl Fetcher) -> Self {
        self.register(fetcher);
        self
    }

    /// Register a fetcher under its `source_id()`, replacing any previous one.
    pub fn register(&mut self, fetcher: impl Fetcher) {
        let source = Fetcher::source_id(&fetcher);
        let registered = Registered {
            fetcher: Arc::new(fetcher),
            gate: Arc::new(ReleaseGate::default()),
        };
        if self.fetchers.insert(source.clone(), registered).is_some() {
            tracing::warn!(%source, "Replaced existing fetcher");
        }
    }

    /// Registered sources, sorted.
    pub fn sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<SourceId> = self.fetchers.keys().cloned().collect();
        sources.sort();
        sources
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Current per-source progress, ordered by source.
    pub fn progress(&self) -> Vec<SearchProgress> {
        self.progress.snapshot()
    }

    /// Run `query` against every source it names.
    ///
    /// Fails only when the query names no sources or an unregistered one;
    /// both are checked before any fetch starts. Per-source failures and
    /// timeouts end up in the report instead.
    pub async fn search(&self, query: &PostingQuery) -> Result<SearchReport, AppError> {
        let units = self.resolve(query)?;
        let sources: Vec<SourceId> = units.iter().map(|(s, ..)| s.clone()).collect();

        let search_id = Uuid::new_v4();
        let started = Instant::now();
        self.progress.reset(&sources);
        self.reporter.report(SearchEvent::SearchStarted {
            search_id,
            sources: &sources,
        });

        let token = self.lock_cancel().clone();
        let shared_query = Arc::new(query.clone());
        let settled = join_all(units.into_iter().map(|(source, fetcher, gate)| {
            self.run_source(
                search_id,
                source,
                fetcher,
                gate,
                Arc::clone(&shared_query),
                token.clone(),
            )
        }))
        .await;

        let mut postings = Vec::new();
        let mut errors = Vec::new();
        let mut outcomes = BTreeMap::new();
        let mut successful_sources = Vec::new();
        let mut failed_sources = Vec::new();
        for outcome in settled {
            if !outcome.postings.is_empty() {
                successful_sources.push(outcome.source.clone());
            } else if !outcome.errors.is_empty() {
                failed_sources.push(outcome.source.clone());
            }
            postings.extend(outcome.postings.iter().cloned());
            errors.extend(outcome.errors.iter().cloned());
            outcomes.insert(outcome.source.clone(), outcome);
        }

        let total_postings = postings.len();
        let (postings, duplicates_removed) = if query.deduplicate {
            let result = Deduplicator::new()
                .with_batch_size(self.config.dedup_batch_size)
                .deduplicate(postings);
            self.reporter.report(SearchEvent::Deduplicated {
                search_id,
                before: total_postings,
                after: result.unique.len(),
            });
            (result.unique, result.duplicates_removed)
        } else {
            (postings, 0)
        };

        let duration = started.elapsed();
        self.reporter.report(SearchEvent::SearchFinished {
            search_id,
            postings: postings.len(),
            failed_sources: failed_sources.len(),
            duration,
        });

        Ok(SearchReport {
            search_id,
            unique_postings: postings.len(),
            postings,
            total_postings,
            duplicates_removed,
            outcomes,
            errors,
            partial_results: !failed_sources.is_empty(),
            successful_sources,
            failed_sources,
            duration,
        })
    }

    /// Stop background fetches and release every registered fetcher.
    ///
    /// Fetches still running are cancelled and given `close_grace` to wind
    /// down. Close failures are logged and do not stop the remaining fetchers
    /// from being closed. The service stays usable afterwards.
    pub async fn close(&self) {
        let token = std::mem::replace(&mut *self.lock_cancel(), CancellationToken::new());
        token.cancel();

        self.tracker.close();
        if tokio::time::timeout(self.config.close_grace, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                grace_secs = self.config.close_grace.as_secs_f64(),
                "Background fetches still running after grace period"
            );
        }
        self.tracker.reopen();

        for source in self.sources() {
            let Some(registered) = self.fetchers.get(&source) else {
                continue;
            };
            if let Err(e) = registered.fetcher.close_boxed().await {
                tracing::warn!(%source, error = %e, "Failed to close fetcher");
            }
        }
    }

    fn resolve(
        &self,
        query: &PostingQuery,
    ) -> Result<Vec<(SourceId, Arc<dyn DynFetcher>, Arc<ReleaseGate>)>, AppError> {
        if query.sources.is_empty() {
            return Err(AppError::InvalidConfig(
                "at least one source must be requested".into(),
            ));
        }
        let mut seen = HashSet::new();
        let mut units = Vec::with_capacity(query.sources.len());
        for source in &query.sources {
            if !seen.insert(source.clone()) {
                continue;
            }
            let registered = self
                .fetchers
                .get(source)
                .ok_or_else(|| AppError::UnknownSource(source.clone()))?;
            units.push((
                source.clone(),
                Arc::clone(&registered.fetcher),
                Arc::clone(&registered.gate),
            ));
        }
        Ok(units)
    }

    async fn run_source(
        &self,
        search_id: Uuid,
        source: SourceId,
        fetcher: Arc<dyn DynFetcher>,
        gate: Arc<ReleaseGate>,
        query: Arc<PostingQuery>,
        token: CancellationToken,
    ) -> FetchOutcome {
        let started = Instant::now();
        let timeout = query.timeout;
        self.progress.start(&source);
        self.reporter.report(SearchEvent::SourceStarted {
            search_id,
            source: &source,
        });

        let mut handle = self.spawn_fetch(source.clone(), fetcher, gate, query, token);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval_at(
            started + self.progress_interval(),
            self.progress_interval(),
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break Some(joined),
                () = &mut deadline => break None,
                _ = ticker.tick() => {
                    self.progress.advance(
                        &source,
                        self.config.progress_step,
                        self.config.progress_ceiling,
                    );
                    tracing::debug!(%source, "Progress tick");
                }
            }
        };

        let Some(joined) = joined else {
            let error = FetchError::from_app_error(source.clone(), &AppError::Timeout(timeout));
            self.progress.time_out(&source, error.message.clone());
            self.reporter.report(SearchEvent::SourceTimedOut {
                search_id,
                source: &source,
                timeout,
            });
            return FetchOutcome::failed(source, error).with_duration(started.elapsed());
        };

        let mut outcome = match settle(joined) {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = FetchError::from_app_error(source.clone(), &e);
                FetchOutcome::failed(source.clone(), error)
            }
        };
        outcome.source = source.clone();
        outcome.duration = started.elapsed();

        if outcome.is_failure() {
            let first = &outcome.errors[0];
            self.progress.fail(&source, first.message.clone());
            self.reporter.report(SearchEvent::SourceFailed {
                search_id,
                source: &source,
                kind: first.kind,
                error: &first.message,
            });
        } else {
            self.progress.complete(&source, outcome.postings.len());
            self.reporter.report(SearchEvent::SourceCompleted {
                search_id,
                source: &source,
                postings: outcome.postings.len(),
                duration: outcome.duration,
            });
        }
        outcome
    }

    /// Spawn the fetch on the tracker. The task releases the fetcher once the
    /// fetch settles, whether or not anyone is still waiting for it.
    fn spawn_fetch(
        &self,
        source: SourceId,
        fetcher: Arc<dyn DynFetcher>,
        gate: Arc<ReleaseGate>,
        query: Arc<PostingQuery>,
        token: CancellationToken,
    ) -> JoinHandle<TaskOutput> {
        self.tracker.spawn(async move {
            let running = gate.enter().await;
            let output = tokio::select! {
                result = AssertUnwindSafe(fetcher.fetch_boxed(&query)).catch_unwind() => Some(result),
                () = token.cancelled() => None,
            };
            drop(running);
            gate.release(&source, fetcher.as_ref()).await;
            output
        })
    }

    fn progress_interval(&self) -> Duration {
        self.config.progress_interval.max(Duration::from_millis(1))
    }

    /// Acquires the cancel-token lock, recovering from poison if necessary.
    fn lock_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned cancel token");
            poisoned.into_inner()
        })
    }
}

/// Flatten the layers around a finished fetch into one result.
fn settle(joined: Result<TaskOutput, tokio::task::JoinError>) -> FetchResult {
    match joined {
        Ok(Some(Ok(result))) => result,
        Ok(Some(Err(panic))) => Err(AppError::Generic(format!(
            "Fetcher panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Ok(None) => Err(AppError::Generic("Fetch cancelled".into())),
        Err(e) => Err(AppError::Generic(format!("Fetch task failed: {e}"))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
