//! Rule-based, explainable ranking of postings against caller preferences.
//!
//! Four independent strategies each return a score in `[0, 100]`, a
//! confidence in `[0, 1]` and human-readable reasons. The engine combines
//! them as
//!
//! ```text
//! total      = Σ weight[f] × score[f]
//! confidence = Σ weight[f] × confidence[f]
//! ```
//!
//! sorts descending and assigns a dense 1-based rank.

pub mod location;
pub mod salary;
pub mod source;
pub mod title;
pub mod weights;

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{PayPeriod, RawPosting, SourceId};

pub use location::{LocationMatch, LocationStrategy};
pub use salary::{AlignmentKind, SalaryAlignment, SalaryStrategy};
pub use source::{SourceQuality, SourceQualityDetails, SourceQualityStrategy};
pub use title::{TitleDetails, TitleStrategy};
pub use weights::ScoringWeights;

pub const DEFAULT_SCORING_BATCH_SIZE: usize = 50;

/// Number of reasons surfaced per scored posting.
pub const TOP_REASONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Location,
    TitleRelevance,
    Salary,
    SourceQuality,
}

impl Factor {
    pub const ALL: [Factor; 4] = [
        Factor::Location,
        Factor::TitleRelevance,
        Factor::Salary,
        Factor::SourceQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Location => "location",
            Factor::TitleRelevance => "title_relevance",
            Factor::Salary => "salary",
            Factor::SourceQuality => "source_quality",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the caller feels about remote work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePreference {
    #[default]
    Any,
    RemoteOnly,
    OnsiteOnly,
}

/// Desired pay range, expressed in `period` units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryPreference {
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub period: PayPeriod,
}

impl SalaryPreference {
    pub fn yearly(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            period: PayPeriod::Yearly,
        }
    }

    pub fn yearly_min(&self) -> Option<f64> {
        self.min.map(|v| v * self.period.yearly_multiplier())
    }

    pub fn yearly_max(&self) -> Option<f64> {
        self.max.map(|v| v * self.period.yearly_multiplier())
    }
}

/// Caller preferences the postings are ranked against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringCriteria {
    pub location: Option<String>,
    #[serde(default)]
    pub remote: RemotePreference,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub salary: Option<SalaryPreference>,
    /// Additive per-source bonus (may be negative).
    #[serde(default)]
    pub source_bonus: HashMap<SourceId, f64>,
}

impl ScoringCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_remote(mut self, remote: RemotePreference) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn with_salary(mut self, salary: SalaryPreference) -> Self {
        self.salary = Some(salary);
        self
    }

    pub fn with_source_bonus(mut self, source: impl Into<SourceId>, bonus: f64) -> Self {
        self.source_bonus.insert(source.into(), bonus);
        self
    }
}

/// Strategy-specific explanation attached to a [`StrategyScore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreDetails {
    Location { matched: LocationMatch },
    Title(TitleDetails),
    Salary(SalaryAlignment),
    Source(SourceQualityDetails),
}

/// Result of one strategy for one posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyScore {
    pub score: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub details: ScoreDetails,
}

impl StrategyScore {
    /// Score and confidence are clamped into range.
    pub fn new(score: f64, confidence: f64, details: ScoreDetails) -> Self {
        Self {
            score: score.clamp(0.0, 100.0),
            confidence: confidence.clamp(0.0, 1.0),
            reasons: Vec::new(),
            details,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

/// Inputs shared by every strategy during one scoring pass.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext {
    /// "Now" for recency calculations.
    pub now: DateTime<Utc>,
}

/// One scoring factor.
pub trait ScoringStrategy: Send + Sync {
    fn factor(&self) -> Factor;

    fn score(
        &self,
        posting: &RawPosting,
        criteria: &ScoringCriteria,
        ctx: &ScoringContext,
    ) -> StrategyScore;
}

/// One factor's share of a posting's total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: Factor,
    pub score: f64,
    pub confidence: f64,
    pub weight: f64,
    /// `weight × score`, the points this factor adds to the total.
    pub contribution: f64,
    pub details: ScoreDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPosting {
    pub posting: RawPosting,
    pub total_score: f64,
    pub overall_confidence: f64,
    pub breakdown: Vec<FactorScore>,
    /// Dense, 1-based, assigned after the full sort.
    pub rank: usize,
    pub top_reasons: Vec<String>,
}

impl ScoredPosting {
    pub fn factor(&self, factor: Factor) -> Option<&FactorScore> {
        self.breakdown.iter().find(|f| f.factor == factor)
    }
}

pub struct ScoringEngine {
    weights: ScoringWeights,
    strategies: Vec<Box<dyn ScoringStrategy>>,
    batch_size: usize,
    reference_time: Option<DateTime<Utc>>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights,
            strategies: vec![
                Box::new(LocationStrategy),
                Box::new(TitleStrategy),
                Box::new(SalaryStrategy),
                Box::new(SourceQualityStrategy::default()),
            ],
            batch_size: DEFAULT_SCORING_BATCH_SIZE,
            reference_time: None,
        }
    }

    /// Pin "now" so recency bonuses are reproducible.
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Replace the strategy for its factor.
    pub fn with_strategy(mut self, strategy: Box<dyn ScoringStrategy>) -> Self {
        let factor = strategy.factor();
        self.strategies.retain(|s| s.factor() != factor);
        self.strategies.push(strategy);
        self
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Validate and install new weights. On rejection the previous weights stay.
    pub fn update_weights(&mut self, weights: ScoringWeights) -> Result<(), AppError> {
        weights.validate()?;
        tracing::info!(
            location = weights.location(),
            title_relevance = weights.title_relevance(),
            salary = weights.salary(),
            source_quality = weights.source_quality(),
            "Scoring weights updated"
        );
        self.weights = weights;
        Ok(())
    }

    /// Build weights from raw values and install them if they are valid.
    pub fn set_weights(
        &mut self,
        location: f64,
        title_relevance: f64,
        salary: f64,
        source_quality: f64,
    ) -> Result<(), AppError> {
        let weights = ScoringWeights::new(location, title_relevance, salary, source_quality)?;
        self.update_weights(weights)
    }

    /// Score, sort and rank `postings`.
    pub fn score(&self, postings: &[RawPosting], criteria: &ScoringCriteria) -> Vec<ScoredPosting> {
        let ctx = ScoringContext {
            now: self.reference_time.unwrap_or_else(Utc::now),
        };

        let mut scored = Vec::with_capacity(postings.len());
        for batch in postings.chunks(self.batch_size) {
            scored.extend(batch.iter().map(|p| self.score_one(p, criteria, &ctx)));
        }

        scored.sort_by(|a, b| {
            b.total_score
                .total_cmp(&a.total_score)
                .then_with(|| a.posting.id.cmp(&b.posting.id))
        });
        for (i, s) in scored.iter_mut().enumerate() {
            s.rank = i + 1;
        }

        tracing::debug!(count = scored.len(), "Scored postings");
        scored
    }

    fn score_one(
        &self,
        posting: &RawPosting,
        criteria: &ScoringCriteria,
        ctx: &ScoringContext,
    ) -> ScoredPosting {
        let mut total = 0.0;
        let mut confidence = 0.0;
        let mut breakdown = Vec::with_capacity(self.strategies.len());
        let mut weighted_reasons: Vec<(f64, String)> = Vec::new();

        for strategy in &self.strategies {
            let factor = strategy.factor();
            let weight = self.weights.get(factor);
            let result = strategy.score(posting, criteria, ctx);

            let contribution = weight * (result.score / 100.0) * 100.0;
            total += contribution;
            confidence += weight * result.confidence;

            let importance = (result.score / 100.0) * result.confidence * weight;
            weighted_reasons.extend(result.reasons.iter().map(|r| (importance, r.clone())));

            breakdown.push(FactorScore {
                factor,
                score: result.score,
                confidence: result.confidence,
                weight,
                contribution,
                details: result.details,
            });
        }

        ScoredPosting {
            posting: posting.clone(),
            total_score: total.clamp(0.0, 100.0),
            overall_confidence: confidence.clamp(0.0, 1.0),
            breakdown,
            rank: 0,
            top_reasons: top_reasons(weighted_reasons),
        }
    }
}

/// Highest-importance reasons first, de-duplicated. Ties keep strategy order.
fn top_reasons(mut weighted: Vec<(f64, String)>) -> Vec<String> {
    weighted.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut seen = HashSet::new();
    weighted
        .into_iter()
        .filter(|(_, r)| seen.insert(r.clone()))
        .map(|(_, r)| r)
        .take(TOP_REASONS)
        .collect()
}

/// Standalone scoring with explicit weights.
pub fn score_postings(
    postings: &[RawPosting],
    criteria: &ScoringCriteria,
    weights: ScoringWeights,
) -> Result<Vec<ScoredPosting>, AppError> {
    weights.validate()?;
    Ok(ScoringEngine::new(weights).score(postings, criteria))
}

/// Lowercase, trim, and collapse internal whitespace.
pub(crate) fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercased alphanumeric words.
pub(crate) fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
