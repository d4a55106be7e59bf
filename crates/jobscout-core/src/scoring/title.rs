//! Title relevance: keyword match (50 %), role synonyms (30 %) and
//! seniority alignment (20 %).

use serde::{Deserialize, Serialize};

use crate::models::RawPosting;
use crate::scoring::{
    Factor, ScoreDetails, ScoringContext, ScoringCriteria, ScoringStrategy, StrategyScore,
    normalize_text, words,
};

const KEYWORD_WEIGHT: f64 = 0.5;
const SYNONYM_WEIGHT: f64 = 0.3;
const SENIORITY_WEIGHT: f64 = 0.2;

/// Minimum share of a keyword's words that must appear in the title.
pub const WORD_OVERLAP_THRESHOLD: f64 = 0.7;

/// Level assumed for titles that carry no seniority token.
const DEFAULT_LEVEL: u8 = 3;

const ROLE_SYNONYMS: &[&[&str]] = &[
    &["engineer", "developer", "programmer", "coder", "swe"],
    &["manager", "supervisor", "head"],
    &["designer", "ux", "ui"],
    &["analyst", "specialist"],
    &["scientist", "researcher"],
    &["administrator", "admin", "sysadmin"],
    &["architect"],
    &["consultant", "advisor"],
    &["devops", "sre", "reliability"],
    &["qa", "tester", "sdet"],
];

const SENIORITY_LEVELS: &[(&str, u8)] = &[
    ("intern", 1),
    ("internship", 1),
    ("junior", 2),
    ("jr", 2),
    ("entry", 2),
    ("graduate", 2),
    ("associate", 2),
    ("mid", 3),
    ("intermediate", 3),
    ("senior", 4),
    ("sr", 4),
    ("staff", 5),
    ("lead", 5),
    ("principal", 5),
    ("director", 6),
    ("vp", 7),
    ("chief", 7),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleDetails {
    pub keyword_score: f64,
    pub synonym_score: f64,
    pub seniority_score: f64,
    pub matched_keyword: Option<String>,
    pub posting_level: Option<u8>,
    pub preferred_level: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TitleStrategy;

impl ScoringStrategy for TitleStrategy {
    fn factor(&self) -> Factor {
        Factor::TitleRelevance
    }

    fn score(
        &self,
        posting: &RawPosting,
        criteria: &ScoringCriteria,
        _ctx: &ScoringContext,
    ) -> StrategyScore {
        let keywords: Vec<String> = criteria
            .keywords
            .iter()
            .map(|k| normalize_text(k))
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            let details = TitleDetails {
                keyword_score: 0.0,
                synonym_score: 0.0,
                seniority_score: 0.0,
                matched_keyword: None,
                posting_level: seniority_level(&posting.title),
                preferred_level: None,
            };
            return StrategyScore::new(50.0, 0.3, ScoreDetails::Title(details))
                .with_reason("No title keywords given");
        }

        let title = normalize_text(&posting.title);
        let (keyword_score, matched_keyword) = keyword_match(&title, &keywords);
        let synonym = synonym_match(&title, &keywords);
        let posting_level = seniority_level(&title);
        let preferred_level = keywords.iter().find_map(|k| seniority_level(k));
        let seniority_score = seniority_alignment(posting_level, preferred_level);

        let score = KEYWORD_WEIGHT * keyword_score
            + SYNONYM_WEIGHT * synonym.score
            + SENIORITY_WEIGHT * seniority_score;
        let confidence = if keyword_score >= 80.0 {
            0.9
        } else if keyword_score > 0.0 {
            0.75
        } else {
            0.6
        };

        let mut result = StrategyScore::new(
            score,
            confidence,
            ScoreDetails::Title(TitleDetails {
                keyword_score,
                synonym_score: synonym.score,
                seniority_score,
                matched_keyword: matched_keyword.clone(),
                posting_level,
                preferred_level,
            }),
        );

        result = match (&matched_keyword, keyword_score) {
            (Some(k), s) if s >= 100.0 => result.with_reason(format!("Title is exactly '{k}'")),
            (Some(k), s) if s >= 80.0 => result.with_reason(format!("Title contains '{k}'")),
            (Some(k), _) => result.with_reason(format!("Title overlaps with '{k}'")),
            (None, _) => result.with_reason("Title does not match keywords"),
        };
        if let Some((wanted, found)) = synonym.pair
            && wanted != found
        {
            result = result.with_reason(format!("'{found}' is a synonym for '{wanted}'"));
        }
        if preferred_level.is_some() {
            result = match seniority_score {
                s if s >= 100.0 => result.with_reason("Seniority matches"),
                s if s >= 80.0 => result.with_reason("Seniority is one level off"),
                _ => result.with_reason("Seniority differs"),
            };
        }
        result
    }
}

/// Best keyword match: exact 100, containment 80, word overlap 60.
fn keyword_match(title: &str, keywords: &[String]) -> (f64, Option<String>) {
    let title_words = words(title);
    let mut best: (f64, Option<String>) = (0.0, None);
    for keyword in keywords {
        let score = if title == keyword {
            100.0
        } else if title.contains(keyword.as_str()) {
            80.0
        } else {
            let kw_words = words(keyword);
            if kw_words.is_empty() {
                0.0
            } else {
                let hits = kw_words.iter().filter(|w| title_words.contains(w)).count();
                let ratio = hits as f64 / kw_words.len() as f64;
                if ratio >= WORD_OVERLAP_THRESHOLD { 60.0 } else { 0.0 }
            }
        };
        if score > best.0 {
            best = (score, Some(keyword.clone()));
        }
    }
    best
}

struct SynonymMatch {
    score: f64,
    /// (role word from keywords, role word found in title)
    pair: Option<(String, String)>,
}

/// 100 when the title names the same role family as the keywords, 0 when it
/// names none of them, 50 when the keywords name no known role.
fn synonym_match(title: &str, keywords: &[String]) -> SynonymMatch {
    let title_words = words(title);
    let mut keyword_has_role = false;
    for keyword in keywords {
        for word in words(keyword) {
            let Some(group) = ROLE_SYNONYMS.iter().find(|g| g.contains(&word.as_str())) else {
                continue;
            };
            keyword_has_role = true;
            if let Some(found) = title_words.iter().find(|t| group.contains(&t.as_str())) {
                return SynonymMatch {
                    score: 100.0,
                    pair: Some((word.clone(), found.clone())),
                };
            }
        }
    }
    SynonymMatch {
        score: if keyword_has_role { 0.0 } else { 50.0 },
        pair: None,
    }
}

/// Seniority level of a title or keyword, if it names one.
pub fn seniority_level(text: &str) -> Option<u8> {
    let lower = normalize_text(text);
    if lower.contains("vice president") {
        return Some(7);
    }
    words(&lower).iter().find_map(|w| {
        SENIORITY_LEVELS
            .iter()
            .find(|(token, _)| *token == w.as_str())
            .map(|(_, level)| *level)
    })
}

fn seniority_alignment(posting: Option<u8>, preferred: Option<u8>) -> f64 {
    let Some(preferred) = preferred else {
        return 70.0;
    };
    let posting = posting.unwrap_or(DEFAULT_LEVEL);
    match posting.abs_diff(preferred) {
        0 => 100.0,
        1 => 80.0,
        2 => 50.0,
        _ => 30.0,
    }
}
