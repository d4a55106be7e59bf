use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::scoring::Factor;

/// Accepted deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Per-factor weights. Always non-negative and summing to 1.0.
///
/// The only way to build one is through [`ScoringWeights::new`] (or serde,
/// which goes through the same check), so a value of this type is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct ScoringWeights {
    location: f64,
    title_relevance: f64,
    salary: f64,
    source_quality: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    location: f64,
    title_relevance: f64,
    salary: f64,
    source_quality: f64,
}

impl TryFrom<RawWeights> for ScoringWeights {
    type Error = AppError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        ScoringWeights::new(raw.location, raw.title_relevance, raw.salary, raw.source_quality)
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            location: 0.25,
            title_relevance: 0.35,
            salary: 0.25,
            source_quality: 0.15,
        }
    }
}

impl ScoringWeights {
    pub fn new(
        location: f64,
        title_relevance: f64,
        salary: f64,
        source_quality: f64,
    ) -> Result<Self, AppError> {
        let weights = Self {
            location,
            title_relevance,
            salary,
            source_quality,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let parts = [
            self.location,
            self.title_relevance,
            self.salary,
            self.source_quality,
        ];
        let sum: f64 = parts.iter().sum();
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0)
            || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE
        {
            return Err(AppError::WeightInvariant { sum });
        }
        Ok(())
    }

    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Location => self.location,
            Factor::TitleRelevance => self.title_relevance,
            Factor::Salary => self.salary,
            Factor::SourceQuality => self.source_quality,
        }
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn title_relevance(&self) -> f64 {
        self.title_relevance
    }

    pub fn salary(&self) -> f64 {
        self.salary
    }

    pub fn source_quality(&self) -> f64 {
        self.source_quality
    }
}
