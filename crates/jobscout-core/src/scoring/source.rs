//! Source quality: a per-board baseline adjusted by how complete and how
//! fresh the posting is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{RawPosting, SourceId};
use crate::scoring::{
    Factor, ScoreDetails, ScoringContext, ScoringCriteria, ScoringStrategy, StrategyScore,
};

const DEFAULT_QUALITY: SourceQuality = SourceQuality {
    base: 50.0,
    reliability: 0.5,
};

const KNOWN_SOURCES: &[(&str, SourceQuality)] = &[
    ("linkedin", SourceQuality { base: 80.0, reliability: 0.9 }),
    ("indeed", SourceQuality { base: 75.0, reliability: 0.85 }),
    ("glassdoor", SourceQuality { base: 75.0, reliability: 0.85 }),
    ("google", SourceQuality { base: 75.0, reliability: 0.85 }),
    ("dice", SourceQuality { base: 70.0, reliability: 0.8 }),
    ("wellfound", SourceQuality { base: 70.0, reliability: 0.8 }),
    ("ziprecruiter", SourceQuality { base: 65.0, reliability: 0.75 }),
    ("remoteok", SourceQuality { base: 65.0, reliability: 0.75 }),
    ("weworkremotely", SourceQuality { base: 65.0, reliability: 0.75 }),
    ("monster", SourceQuality { base: 60.0, reliability: 0.7 }),
];

const RICH_DESCRIPTION_CHARS: usize = 200;

const PLACEHOLDER_COMPANIES: &[&str] = &["", "n/a", "na", "unknown", "confidential", "company"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceQuality {
    pub base: f64,
    /// Used as the strategy's confidence.
    pub reliability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQualityDetails {
    pub base: f64,
    pub reliability: f64,
    /// Sum of every adjustment applied on top of `base`, caller bonus included.
    pub bonus: f64,
}

#[derive(Debug, Clone)]
pub struct SourceQualityStrategy {
    table: HashMap<SourceId, SourceQuality>,
}

impl Default for SourceQualityStrategy {
    fn default() -> Self {
        Self {
            table: KNOWN_SOURCES
                .iter()
                .map(|(id, q)| (SourceId::new(id), *q))
                .collect(),
        }
    }
}

impl SourceQualityStrategy {
    /// Override or add the baseline for one source.
    pub fn with_source(mut self, source: impl Into<SourceId>, quality: SourceQuality) -> Self {
        self.table.insert(source.into(), quality);
        self
    }

    pub fn quality(&self, source: &SourceId) -> SourceQuality {
        self.table.get(source).copied().unwrap_or(DEFAULT_QUALITY)
    }
}

impl ScoringStrategy for SourceQualityStrategy {
    fn factor(&self) -> Factor {
        Factor::SourceQuality
    }

    fn score(
        &self,
        posting: &RawPosting,
        criteria: &ScoringCriteria,
        ctx: &ScoringContext,
    ) -> StrategyScore {
        let quality = self.quality(&posting.source);
        let mut reasons = Vec::new();
        let mut bonus = 0.0;

        if posting.has_salary() {
            bonus += 5.0;
            reasons.push("Salary disclosed".to_string());
        }
        if posting.description.chars().count() > RICH_DESCRIPTION_CHARS {
            bonus += 3.0;
            reasons.push("Detailed description".to_string());
        }
        if let Some(posted) = posting.posted_date {
            let age_days = (ctx.now - posted).num_days();
            if age_days <= 7 {
                bonus += 5.0;
                reasons.push("Posted in the last week".to_string());
            } else if age_days <= 14 {
                bonus += 3.0;
                reasons.push("Posted in the last two weeks".to_string());
            } else if age_days > 30 {
                bonus -= 5.0;
                reasons.push(format!("Posted {age_days} days ago"));
            }
        }
        if is_plausible_company(&posting.company) {
            bonus += 2.0;
        }
        if let Some(extra) = criteria.source_bonus.get(&posting.source)
            && extra.is_finite()
        {
            bonus += extra;
            if *extra != 0.0 {
                reasons.push(format!("Preferred source {}", posting.source));
            }
        }

        let details = SourceQualityDetails {
            base: quality.base,
            reliability: quality.reliability,
            bonus,
        };
        let mut result = StrategyScore::new(
            quality.base + bonus,
            quality.reliability,
            ScoreDetails::Source(details),
        );
        for reason in reasons {
            result = result.with_reason(reason);
        }
        result
    }
}

fn is_plausible_company(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    name.chars().count() >= 2 && !PLACEHOLDER_COMPANIES.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::models::{PayPeriod, Salary};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn score(posting: &RawPosting, criteria: &ScoringCriteria) -> (StrategyScore, SourceQualityDetails) {
        let s = SourceQualityStrategy::default().score(posting, criteria, &ScoringContext { now: now() });
        let details = match &s.details {
            ScoreDetails::Source(d) => d.clone(),
            other => panic!("unexpected details {other:?}"),
        };
        (s, details)
    }

    fn bare(source: &str, company: &str) -> RawPosting {
        RawPosting::new(SourceId::new(source), "Engineer", company, "Seattle", "u1")
    }

    #[test]
    fn baseline_from_table() {
        let (s, d) = score(&bare("linkedin", ""), &ScoringCriteria::new());
        assert_eq!((s.score, s.confidence), (80.0, 0.9));
        assert_eq!(d.bonus, 0.0);

        let (s, _) = score(&bare("Monster", ""), &ScoringCriteria::new());
        assert_eq!((s.score, s.confidence), (60.0, 0.7));

        let (s, _) = score(&bare("someboard", ""), &ScoringCriteria::new());
        assert_eq!((s.score, s.confidence), (50.0, 0.5));
    }

    #[test]
    fn completeness_and_freshness_bonuses() {
        let posting = bare("indeed", "Acme Corp")
            .with_salary(Salary::new(Some(100_000.0), None, PayPeriod::Yearly))
            .with_description("d".repeat(201))
            .with_posted_date(now() - TimeDelta::days(3));
        let (s, d) = score(&posting, &ScoringCriteria::new());
        assert_eq!(d.bonus, 15.0);
        assert_eq!(s.score, 90.0);
        assert!(s.reasons.iter().any(|r| r.contains("Salary")));
    }

    #[test]
    fn recency_bands() {
        let at = |days| {
            let p = bare("dice", "").with_posted_date(now() - TimeDelta::days(days));
            score(&p, &ScoringCriteria::new()).1.bonus
        };
        assert_eq!(at(7), 5.0);
        assert_eq!(at(10), 3.0);
        assert_eq!(at(20), 0.0);
        assert_eq!(at(45), -5.0);
    }

    #[test]
    fn description_length_counts_chars_not_bytes() {
        let posting = bare("dice", "").with_description("é".repeat(150));
        assert_eq!(score(&posting, &ScoringCriteria::new()).1.bonus, 0.0);
    }

    #[test]
    fn caller_bonus_is_clamped() {
        let criteria = ScoringCriteria::new().with_source_bonus("linkedin", 50.0);
        let (s, d) = score(&bare("linkedin", ""), &criteria);
        assert_eq!(d.bonus, 50.0);
        assert_eq!(s.score, 100.0);

        let criteria = ScoringCriteria::new().with_source_bonus("monster", -90.0);
        assert_eq!(score(&bare("monster", ""), &criteria).0.score, 0.0);
    }

    #[test]
    fn placeholder_companies_get_no_bonus() {
        assert!(is_plausible_company("Acme"));
        assert!(!is_plausible_company("  Confidential "));
        assert!(!is_plausible_company("x"));
    }

    #[test]
    fn custom_table_entry() {
        let strategy = SourceQualityStrategy::default().with_source(
            "internal",
            SourceQuality {
                base: 95.0,
                reliability: 1.0,
            },
        );
        assert_eq!(strategy.quality(&SourceId::new("internal")).base, 95.0);
        assert_eq!(strategy.quality(&SourceId::new("nope")), DEFAULT_QUALITY);
    }
}
