//! Structural-key deduplication of postings.
//!
//! Two keys identify a posting:
//!
//! - the **exact key** `title|company|location` after lowercasing and trimming;
//! - the **fuzzy key**, the first 50 alphanumeric characters of the title
//!   followed by the first 50 alphanumeric characters of the company.
//!
//! A posting with an unseen exact key is always kept. Only on an exact-key
//! collision is the fuzzy key consulted: an unseen fuzzy key keeps the
//! posting as a new record, a seen one merges it into the record already
//! kept under the exact key. Location is part of the exact key, so the same
//! title at the same company in two cities stays two records.
//!
//! When two postings merge, the better record survives (see
//! [`should_replace`]). This is not similarity matching: paraphrased titles
//! stay distinct.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::RawPosting;

pub const DEFAULT_DEDUP_BATCH_SIZE: usize = 100;

const FUZZY_PART_LEN: usize = 50;

/// Output of a deduplication pass.
#[derive(Debug, Clone)]
pub struct DedupResult {
    /// Survivors, in order of first appearance.
    pub unique: Vec<RawPosting>,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    batch_size: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_DEDUP_BATCH_SIZE,
        }
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches only bound the working set; output does not depend on size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn deduplicate(&self, postings: Vec<RawPosting>) -> DedupResult {
        let total = postings.len();
        let mut kept: Vec<RawPosting> = Vec::with_capacity(total);
        let mut exact_index: HashMap<String, usize> = HashMap::new();
        let mut fuzzy_seen: HashSet<String> = HashSet::new();

        let mut input = postings.into_iter().peekable();
        let mut batch = Vec::with_capacity(self.batch_size);
        while input.peek().is_some() {
            batch.extend(input.by_ref().take(self.batch_size));
            for posting in batch.drain(..) {
                let exact = exact_key(&posting);
                let Some(&slot) = exact_index.get(&exact) else {
                    fuzzy_seen.insert(fuzzy_key(&posting));
                    exact_index.insert(exact, kept.len());
                    kept.push(posting);
                    continue;
                };

                if fuzzy_seen.insert(fuzzy_key(&posting)) {
                    kept.push(posting);
                } else {
                    merge_into(&mut kept[slot], posting);
                }
            }
        }

        let duplicates_removed = total - kept.len();
        if duplicates_removed > 0 {
            tracing::debug!(
                total,
                unique = kept.len(),
                duplicates_removed,
                "Deduplicated postings"
            );
        }

        DedupResult {
            unique: kept,
            duplicates_removed,
        }
    }
}

/// Convenience wrapper using the default batch size.
pub fn deduplicate(postings: Vec<RawPosting>) -> DedupResult {
    Deduplicator::default().deduplicate(postings)
}

fn merge_into(existing: &mut RawPosting, candidate: RawPosting) {
    if should_replace(existing, &candidate) {
        *existing = candidate;
    }
}

/// Decide whether `candidate` should replace `existing`.
///
/// Levels, in priority order: salary presence, description length, posted
/// date recency. The first level on which the two records differ decides;
/// a full tie keeps `existing`.
pub fn should_replace(existing: &RawPosting, candidate: &RawPosting) -> bool {
    let by_salary = candidate.has_salary().cmp(&existing.has_salary());
    let by_description = candidate
        .description
        .chars()
        .count()
        .cmp(&existing.description.chars().count());
    let by_recency = match (candidate.posted_date, existing.posted_date) {
        (Some(c), Some(e)) => c.cmp(&e),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };

    by_salary.then(by_description).then(by_recency) == Ordering::Greater
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

pub(crate) fn exact_key(posting: &RawPosting) -> String {
    format!(
        "{}|{}|{}",
        normalize(&posting.title),
        normalize(&posting.company),
        normalize(&posting.location)
    )
}

fn alnum_prefix(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .take(FUZZY_PART_LEN)
        .collect()
}

pub(crate) fn fuzzy_key(posting: &RawPosting) -> String {
    format!(
        "{}{}",
        alnum_prefix(&posting.title),
        alnum_prefix(&posting.company)
    )
}
