//! Location fit: remote handling, then city > state > country specificity.
//!
//! City names are compared with containment or normalized Levenshtein
//! similarity of at least [`CITY_SIMILARITY_THRESHOLD`]; states are
//! normalized through a fixed name/abbreviation table.

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::models::RawPosting;
use crate::scoring::{
    Factor, RemotePreference, ScoreDetails, ScoringContext, ScoringCriteria, ScoringStrategy,
    StrategyScore, normalize_text,
};

pub const CITY_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMatch {
    Remote,
    /// Remote posting, caller wants on-site.
    RemoteRejected,
    /// On-site posting, caller wants remote.
    OnsiteRejected,
    /// On-site posting, caller wants on-site but named no place.
    OnsiteAccepted,
    Exact,
    City,
    State,
    Country,
    NoMatch,
    NoPreference,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationStrategy;

impl ScoringStrategy for LocationStrategy {
    fn factor(&self) -> Factor {
        Factor::Location
    }

    fn score(
        &self,
        posting: &RawPosting,
        criteria: &ScoringCriteria,
        _ctx: &ScoringContext,
    ) -> StrategyScore {
        let result = |score, confidence, matched| {
            StrategyScore::new(score, confidence, ScoreDetails::Location { matched })
        };

        if posting.is_remote() {
            return if criteria.remote == RemotePreference::OnsiteOnly {
                result(10.0, 0.9, LocationMatch::RemoteRejected)
                    .with_reason("Remote role, but on-site work preferred")
            } else {
                result(100.0, 1.0, LocationMatch::Remote).with_reason("Remote position")
            };
        }

        let preferred = match (&criteria.location, criteria.remote) {
            (_, RemotePreference::RemoteOnly) => {
                return result(20.0, 0.9, LocationMatch::OnsiteRejected)
                    .with_reason(format!("On-site in {}, remote work required", posting.location));
            }
            (None, RemotePreference::OnsiteOnly) => {
                return result(60.0, 0.5, LocationMatch::OnsiteAccepted)
                    .with_reason("On-site role matches on-site preference");
            }
            (None, RemotePreference::Any) => {
                return result(50.0, 0.3, LocationMatch::NoPreference)
                    .with_reason("No location preference");
            }
            (Some(pref), _) => pref,
        };

        let posting_norm = normalize_text(&posting.location);
        let pref_norm = normalize_text(preferred);
        if !posting_norm.is_empty() && posting_norm == pref_norm {
            return result(100.0, 1.0, LocationMatch::Exact)
                .with_reason(format!("Located in {}", posting.location.trim()));
        }

        let have = ParsedLocation::parse(&posting.location);
        let want = ParsedLocation::parse(preferred);

        let states_conflict = matches!((have.state, want.state), (Some(a), Some(b)) if a != b);
        if let (Some(a), Some(b)) = (&have.city, &want.city)
            && !states_conflict
            && fuzzy_match(a, b)
        {
            return result(95.0, 0.95, LocationMatch::City)
                .with_reason(format!("Same city as {}", preferred.trim()));
        }

        if let (Some(a), Some(b)) = (have.state, want.state)
            && a == b
        {
            return result(70.0, 0.8, LocationMatch::State)
                .with_reason(format!("Same state ({})", a.to_uppercase()));
        }

        if let (Some(a), Some(b)) = (have.country, want.country)
            && a == b
        {
            return result(40.0, 0.6, LocationMatch::Country)
                .with_reason(format!("Same country ({})", a.to_uppercase()));
        }

        result(20.0, 0.7, LocationMatch::NoMatch).with_reason(format!(
            "{} is far from {}",
            posting.location.trim(),
            preferred.trim()
        ))
    }
}

/// Containment counts as a match; otherwise normalized Levenshtein similarity.
pub fn fuzzy_match(a: &str, b: &str) -> bool {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a) || normalized_levenshtein(&a, &b) >= CITY_SIMILARITY_THRESHOLD
}

/// City / state / country parts of a free-form location string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLocation {
    pub city: Option<String>,
    /// Two-letter US state code.
    pub state: Option<&'static str>,
    /// Short country code.
    pub country: Option<&'static str>,
}

impl ParsedLocation {
    pub fn parse(location: &str) -> Self {
        let parts: Vec<String> = location
            .split(',')
            .map(|part| {
                // Drop postal codes: "WA 98101" -> "wa"
                part.split_whitespace()
                    .filter(|w| !w.chars().all(|c| c.is_ascii_digit() || c == '-'))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .filter(|p| !p.is_empty())
            .collect();

        let mut parsed = ParsedLocation::default();
        for (i, part) in parts.iter().enumerate() {
            if i == 0 && parts.len() > 1 {
                parsed.city = Some(part.clone());
                continue;
            }
            if parsed.country.is_none()
                && let Some(country) = country_code(part)
            {
                parsed.country = Some(country);
                continue;
            }
            if parsed.state.is_none()
                && let Some(state) = state_code(part)
            {
                parsed.state = Some(state);
                continue;
            }
            if i == 0 {
                parsed.city = Some(part.clone());
            }
        }

        if parsed.state.is_some() && parsed.country.is_none() {
            parsed.country = Some("us");
        }
        parsed
    }
}

const US_STATES: &[(&str, &str)] = &[
    ("alabama", "al"),
    ("alaska", "ak"),
    ("arizona", "az"),
    ("arkansas", "ar"),
    ("california", "ca"),
    ("colorado", "co"),
    ("connecticut", "ct"),
    ("delaware", "de"),
    ("district of columbia", "dc"),
    ("florida", "fl"),
    ("georgia", "ga"),
    ("hawaii", "hi"),
    ("idaho", "id"),
    ("illinois", "il"),
    ("indiana", "in"),
    ("iowa", "ia"),
    ("kansas", "ks"),
    ("kentucky", "ky"),
    ("louisiana", "la"),
    ("maine", "me"),
    ("maryland", "md"),
    ("massachusetts", "ma"),
    ("michigan", "mi"),
    ("minnesota", "mn"),
    ("mississippi", "ms"),
    ("missouri", "mo"),
    ("montana", "mt"),
    ("nebraska", "ne"),
    ("nevada", "nv"),
    ("new hampshire", "nh"),
    ("new jersey", "nj"),
    ("new mexico", "nm"),
    ("new york", "ny"),
    ("north carolina", "nc"),
    ("north dakota", "nd"),
    ("ohio", "oh"),
    ("oklahoma", "ok"),
    ("oregon", "or"),
    ("pennsylvania", "pa"),
    ("rhode island", "ri"),
    ("south carolina", "sc"),
    ("south dakota", "sd"),
    ("tennessee", "tn"),
    ("texas", "tx"),
    ("utah", "ut"),
    ("vermont", "vt"),
    ("virginia", "va"),
    ("washington", "wa"),
    ("west virginia", "wv"),
    ("wisconsin", "wi"),
    ("wyoming", "wy"),
];

const COUNTRIES: &[(&str, &str)] = &[
    ("us", "us"),
    ("usa", "us"),
    ("u.s.", "us"),
    ("u.s.a.", "us"),
    ("united states", "us"),
    ("united states of america", "us"),
    ("uk", "gb"),
    ("u.k.", "gb"),
    ("united kingdom", "gb"),
    ("great britain", "gb"),
    ("england", "gb"),
    ("canada", "ca"),
    ("germany", "de"),
    ("deutschland", "de"),
    ("france", "fr"),
    ("spain", "es"),
    ("netherlands", "nl"),
    ("ireland", "ie"),
    ("india", "in"),
    ("australia", "au"),
    ("mexico", "mx"),
    ("brazil", "br"),
    ("japan", "jp"),
    ("singapore", "sg"),
];

/// Two-letter code for a US state name or abbreviation.
pub fn state_code(s: &str) -> Option<&'static str> {
    let s = normalize_text(s);
    US_STATES
        .iter()
        .find(|(name, abbr)| *name == s || *abbr == s)
        .map(|(_, abbr)| *abbr)
}

fn country_code(s: &str) -> Option<&'static str> {
    let s = normalize_text(s);
    COUNTRIES
        .iter()
        .find(|(alias, _)| *alias == s)
        .map(|(_, code)| *code)
}
