use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::models::SourceId;

/// Lifecycle state of one source within a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Running => "running",
            SourceStatus::Completed => "completed",
            SourceStatus::Failed => "failed",
            SourceStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceStatus::Completed | SourceStatus::Failed | SourceStatus::Timeout
        )
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SourceStatus::Pending),
            "running" => Ok(SourceStatus::Running),
            "completed" => Ok(SourceStatus::Completed),
            "failed" => Ok(SourceStatus::Failed),
            "timeout" => Ok(SourceStatus::Timeout),
            _ => Err(format!("Unknown source status: {}", s)),
        }
    }
}

/// Snapshot of one source's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProgress {
    pub source: SourceId,
    pub status: SourceStatus,
    /// 0-100 estimate. Stays below the soft ceiling until the source settles.
    pub progress: u8,
    pub postings_found: usize,
    pub error: Option<String>,
}

impl SearchProgress {
    fn pending(source: SourceId) -> Self {
        Self {
            source,
            status: SourceStatus::Pending,
            progress: 0,
            postings_found: 0,
            error: None,
        }
    }
}

/// Per-source progress map shared between the search service and pollers.
///
/// Each entry is written only by the unit running that source, so the lock
/// is held just long enough for a single insert or update.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    entries: Arc<Mutex<HashMap<SourceId, SearchProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the map lock, recovering from poison if necessary.
    fn lock(&self) -> MutexGuard<'_, HashMap<SourceId, SearchProgress>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned progress map");
            poisoned.into_inner()
        })
    }

    /// Clear previous state and mark every source as pending.
    pub fn reset(&self, sources: &[SourceId]) {
        let mut map = self.lock();
        map.clear();
        for source in sources {
            map.insert(source.clone(), SearchProgress::pending(source.clone()));
        }
    }

    pub fn start(&self, source: &SourceId) {
        self.update(source, |p| {
            p.status = SourceStatus::Running;
            p.progress = 0;
        });
    }

    /// Move a running source `step` points closer to `ceiling`, never past it.
    pub fn advance(&self, source: &SourceId, step: u8, ceiling: u8) {
        self.update(source, |p| {
            if p.status == SourceStatus::Running {
                p.progress = p.progress.saturating_add(step).min(ceiling);
            }
        });
    }

    pub fn complete(&self, source: &SourceId, postings_found: usize) {
        self.update(source, |p| {
            p.status = SourceStatus::Completed;
            p.progress = 100;
            p.postings_found = postings_found;
            p.error = None;
        });
    }

    pub fn fail(&self, source: &SourceId, error: impl Into<String>) {
        let error = error.into();
        self.update(source, |p| {
            p.status = SourceStatus::Failed;
            p.progress = 100;
            p.error = Some(error);
        });
    }

    pub fn time_out(&self, source: &SourceId, error: impl Into<String>) {
        let error = error.into();
        self.update(source, |p| {
            p.status = SourceStatus::Timeout;
            p.progress = 100;
            p.postings_found = 0;
            p.error = Some(error);
        });
    }

    pub fn get(&self, source: &SourceId) -> Option<SearchProgress> {
        self.lock().get(source).cloned()
    }

    /// Read-only copy of every entry, ordered by source.
    pub fn snapshot(&self) -> Vec<SearchProgress> {
        let mut entries: Vec<SearchProgress> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.source.cmp(&b.source));
        entries
    }

    fn update(&self, source: &SourceId, f: impl FnOnce(&mut SearchProgress)) {
        let mut map = self.lock();
        let entry = map
            .entry(source.clone())
            .or_insert_with(|| SearchProgress::pending(source.clone()));
        f(entry);
    }
}
