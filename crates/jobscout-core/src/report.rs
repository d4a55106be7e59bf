use std::time::Duration;

use uuid::Uuid;

use crate::models::{FetchErrorKind, SourceId};

/// Events emitted by the search service for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SearchEvent<'a> {
    SearchStarted {
        search_id: Uuid,
        sources: &'a [SourceId],
    },
    SourceStarted {
        search_id: Uuid,
        source: &'a SourceId,
    },
    SourceCompleted {
        search_id: Uuid,
        source: &'a SourceId,
        postings: usize,
        duration: Duration,
    },
    SourceFailed {
        search_id: Uuid,
        source: &'a SourceId,
        kind: FetchErrorKind,
        error: &'a str,
    },
    SourceTimedOut {
        search_id: Uuid,
        source: &'a SourceId,
        timeout: Duration,
    },
    Deduplicated {
        search_id: Uuid,
        before: usize,
        after: usize,
    },
    SearchFinished {
        search_id: Uuid,
        postings: usize,
        failed_sources: usize,
        duration: Duration,
    },
}

/// Trait for receiving search events (decoupled logging).
pub trait SearchReporter: Send + Sync {
    fn report(&self, event: SearchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSearchReporter;

impl SearchReporter for TracingSearchReporter {
    fn report(&self, event: SearchEvent<'_>) {
        match event {
            SearchEvent::SearchStarted { search_id, sources } => {
                tracing::info!(%search_id, sources = sources.len(), "Search started");
            }
            SearchEvent::SourceStarted { search_id, source } => {
                tracing::debug!(%search_id, %source, "Source started");
            }
            SearchEvent::SourceCompleted {
                search_id,
                source,
                postings,
                duration,
            } => {
                tracing::info!(
                    %search_id,
                    %source,
                    postings,
                    duration_ms = duration.as_millis() as u64,
                    "Source completed"
                );
            }
            SearchEvent::SourceFailed {
                search_id,
                source,
                kind,
                error,
            } => {
                tracing::warn!(%search_id, %source, %kind, %error, "Source failed");
            }
            SearchEvent::SourceTimedOut {
                search_id,
                source,
                timeout,
            } => {
                tracing::warn!(%search_id, %source, timeout_secs = timeout.as_secs_f64(), "Source timed out");
            }
            SearchEvent::Deduplicated {
                search_id,
                before,
                after,
            } => {
                tracing::info!(%search_id, before, after, removed = before.saturating_sub(after), "Deduplicated postings");
            }
            SearchEvent::SearchFinished {
                search_id,
                postings,
                failed_sources,
                duration,
            } => {
                tracing::info!(
                    %search_id,
                    postings,
                    failed_sources,
                    duration_ms = duration.as_millis() as u64,
                    "Search finished"
                );
            }
        }
    }
}
