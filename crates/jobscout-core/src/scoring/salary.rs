//! Salary fit. Both sides are normalized to yearly equivalents before any
//! comparison; the posting is represented by its range midpoint.

use serde::{Deserialize, Serialize};

use crate::models::RawPosting;
use crate::scoring::{
    Factor, ScoreDetails, ScoringContext, ScoringCriteria, ScoringStrategy, StrategyScore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentKind {
    /// Inside the preferred range.
    Perfect,
    Above,
    Below,
    /// No preference or no disclosed salary.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryAlignment {
    pub kind: AlignmentKind,
    pub posting_yearly: Option<f64>,
    pub preferred_min: Option<f64>,
    pub preferred_max: Option<f64>,
    /// Percent above the max or below the min, when outside the range.
    pub deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SalaryStrategy;

impl ScoringStrategy for SalaryStrategy {
    fn factor(&self) -> Factor {
        Factor::Salary
    }

    fn score(
        &self,
        posting: &RawPosting,
        criteria: &ScoringCriteria,
        _ctx: &ScoringContext,
    ) -> StrategyScore {
        let (mut min, mut max) = criteria
            .salary
            .as_ref()
            .map(|p| (p.yearly_min(), p.yearly_max()))
            .unwrap_or((None, None));
        if let (Some(lo), Some(hi)) = (min, max)
            && lo > hi
        {
            (min, max) = (Some(hi), Some(lo));
        }
        let posting_yearly = posting.salary.as_ref().and_then(|s| s.yearly_midpoint());

        let mut alignment = SalaryAlignment {
            kind: AlignmentKind::Unknown,
            posting_yearly,
            preferred_min: min,
            preferred_max: max,
            deviation_pct: None,
        };

        if min.is_none() && max.is_none() {
            return StrategyScore::new(50.0, 0.3, ScoreDetails::Salary(alignment))
                .with_reason("No salary preference");
        }
        let Some(yearly) = posting_yearly else {
            return StrategyScore::new(40.0, 0.4, ScoreDetails::Salary(alignment))
                .with_reason("Salary not disclosed");
        };

        let (score, confidence, reason) = match (min, max) {
            (Some(lo), _) if yearly < lo => {
                let shortfall = (lo - yearly) / lo * 100.0;
                alignment.kind = AlignmentKind::Below;
                alignment.deviation_pct = Some(shortfall);
                (
                    below_range_score(shortfall),
                    0.85,
                    format!("Pays {} ({shortfall:.0}% below your minimum)", dollars(yearly)),
                )
            }
            (_, Some(hi)) if yearly > hi => {
                let excess = (yearly - hi) / hi * 100.0;
                alignment.kind = AlignmentKind::Above;
                alignment.deviation_pct = Some(excess);
                (
                    (90.0 + excess * 0.5).min(100.0),
                    0.9,
                    format!("Pays {} ({excess:.0}% above your range)", dollars(yearly)),
                )
            }
            (Some(lo), Some(hi)) => {
                let position = if hi > lo { (yearly - lo) / (hi - lo) } else { 1.0 };
                alignment.kind = AlignmentKind::Perfect;
                (
                    85.0 + 15.0 * position,
                    0.95,
                    format!("Pays {}, within your range", dollars(yearly)),
                )
            }
            _ => {
                alignment.kind = AlignmentKind::Perfect;
                (
                    90.0,
                    0.9,
                    format!("Pays {}, meets your target", dollars(yearly)),
                )
            }
        };

        StrategyScore::new(score, confidence, ScoreDetails::Salary(alignment)).with_reason(reason)
    }
}

/// Downward scale from 80 with fixed bands at 10/20/30 % shortfall.
fn below_range_score(shortfall_pct: f64) -> f64 {
    let s = shortfall_pct;
    let score = if s < 10.0 {
        80.0 - s
    } else if s < 20.0 {
        65.0 - (s - 10.0) * 1.5
    } else if s < 30.0 {
        45.0 - (s - 20.0) * 1.5
    } else {
        25.0 - (s - 30.0)
    };
    score.max(0.0)
}

fn dollars(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if whole < 0 {
        format!("-${out}/yr")
    } else {
        format!("${out}/yr")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{PayPeriod, Salary, SourceId};
    use crate::scoring::SalaryPreference;

    fn score(salary: Option<Salary>, pref: Option<SalaryPreference>) -> (StrategyScore, SalaryAlignment) {
        let mut posting = RawPosting::new(SourceId::new("test"), "Engineer", "Acme", "Seattle", "u1");
        posting.salary = salary;
        let criteria = ScoringCriteria {
            salary: pref,
            ..Default::default()
        };
        let s = SalaryStrategy.score(&posting, &criteria, &ScoringContext { now: Utc::now() });
        let alignment = match &s.details {
            ScoreDetails::Salary(a) => a.clone(),
            other => panic!("unexpected details {other:?}"),
        };
        (s, alignment)
    }

    fn range(min: f64, max: f64) -> Option<SalaryPreference> {
        Some(SalaryPreference::yearly(Some(min), Some(max)))
    }

    #[test]
    fn hourly_salary_normalized_into_range() {
        let (s, a) = score(
            Some(Salary::new(Some(35.0), Some(35.0), PayPeriod::Hourly)),
            range(70_000.0, 90_000.0),
        );
        assert_eq!(a.posting_yearly, Some(72_800.0));
        assert_eq!(a.kind, AlignmentKind::Perfect);
        assert!(s.score >= 85.0);
        assert!(s.reasons[0].contains("$72,800/yr"));
    }

    #[test]
    fn position_within_range_raises_score() {
        let low = score(Some(Salary::new(Some(71_000.0), None, PayPeriod::Yearly)), range(70_000.0, 90_000.0)).0;
        let high = score(Some(Salary::new(Some(89_000.0), None, PayPeriod::Yearly)), range(70_000.0, 90_000.0)).0;
        assert!(high.score > low.score);
        assert!(low.score >= 85.0 && high.score <= 100.0);
    }

    #[test]
    fn above_range_scales_up_and_caps() {
        let (s, a) = score(
            Some(Salary::new(Some(99_000.0), None, PayPeriod::Yearly)),
            range(70_000.0, 90_000.0),
        );
        assert_eq!(a.kind, AlignmentKind::Above);
        assert!((s.score - 95.0).abs() < 1e-9);

        let (s, _) = score(
            Some(Salary::new(Some(300_000.0), None, PayPeriod::Yearly)),
            range(70_000.0, 90_000.0),
        );
        assert_eq!(s.score, 100.0);
    }

    #[test]
    fn below_range_bands() {
        assert!((below_range_score(5.0) - 75.0).abs() < 1e-9);
        assert!((below_range_score(15.0) - 57.5).abs() < 1e-9);
        assert!((below_range_score(25.0) - 37.5).abs() < 1e-9);
        assert!((below_range_score(40.0) - 15.0).abs() < 1e-9);
        assert_eq!(below_range_score(90.0), 0.0);

        let (s, a) = score(
            Some(Salary::new(Some(5_000.0), None, PayPeriod::Monthly)),
            range(80_000.0, 100_000.0),
        );
        assert_eq!(a.kind, AlignmentKind::Below);
        assert_eq!(a.deviation_pct, Some(25.0));
        assert!((s.score - 37.5).abs() < 1e-9);
    }

    #[test]
    fn degraded_defaults() {
        let (s, a) = score(Some(Salary::new(Some(1.0), None, PayPeriod::Yearly)), None);
        assert_eq!((s.score, s.confidence), (50.0, 0.3));
        assert_eq!(a.kind, AlignmentKind::Unknown);

        let (s, a) = score(None, range(70_000.0, 90_000.0));
        assert_eq!((s.score, s.confidence), (40.0, 0.4));
        assert_eq!(a.kind, AlignmentKind::Unknown);
    }

    #[test]
    fn open_ended_preferences() {
        let min_only = Some(SalaryPreference::yearly(Some(80_000.0), None));
        let (s, a) = score(Some(Salary::new(Some(100_000.0), None, PayPeriod::Yearly)), min_only);
        assert_eq!(a.kind, AlignmentKind::Perfect);
        assert_eq!(s.score, 90.0);

        let max_only = Some(SalaryPreference::yearly(None, Some(80_000.0)));
        let (_, a) = score(Some(Salary::new(Some(100_000.0), None, PayPeriod::Yearly)), max_only);
        assert_eq!(a.kind, AlignmentKind::Above);
    }

    #[test]
    fn preference_in_hourly_units() {
        let pref = Some(SalaryPreference {
            min: Some(40.0),
            max: Some(60.0),
            period: PayPeriod::Hourly,
        });
        let (_, a) = score(Some(Salary::new(Some(100_000.0), None, PayPeriod::Yearly)), pref);
        assert_eq!(a.preferred_min, Some(83_200.0));
        assert_eq!(a.kind, AlignmentKind::Perfect);
    }

    #[test]
    fn dollar_formatting() {
        assert_eq!(dollars(72_800.0), "$72,800/yr");
        assert_eq!(dollars(1_250_000.4), "$1,250,000/yr");
        assert_eq!(dollars(950.0), "$950/yr");
    }
}
