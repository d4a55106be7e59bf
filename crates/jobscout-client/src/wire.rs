//! JSON shapes accepted from a job feed.
//!
//! A feed answers either with a bare array of postings or with a page object
//! `{ "postings": [...], "total": n, "next": "url" }`. Items are kept as raw
//! values until conversion so one malformed item does not sink the page.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use jobscout_core::models::{JobType, PayPeriod, RawPosting, Salary, SourceId};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedPayload {
    Page(FeedPage),
    Items(Vec<serde_json::Value>),
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedPage {
    #[serde(alias = "jobs", alias = "results")]
    pub postings: Vec<serde_json::Value>,
    #[serde(default)]
    pub total: Option<usize>,
    /// Absolute or feed-relative URL of the following page.
    #[serde(default)]
    pub next: Option<String>,
}

impl From<FeedPayload> for FeedPage {
    fn from(payload: FeedPayload) -> Self {
        match payload {
            FeedPayload::Page(page) => page,
            FeedPayload::Items(postings) => FeedPage {
                postings,
                ..FeedPage::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedItem {
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub salary_currency: Option<String>,
    #[serde(default)]
    pub salary_period: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default, alias = "posted_date")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remote: Option<bool>,
}

impl FeedItem {
    pub fn into_posting(self, source: &SourceId) -> RawPosting {
        let mut posting = RawPosting::new(
            source.clone(),
            self.title.trim(),
            self.company.trim(),
            self.location.trim(),
            self.url,
        )
        .with_description(self.description);

        if self.salary_min.is_some() || self.salary_max.is_some() {
            let period = self
                .salary_period
                .as_deref()
                .and_then(|p| PayPeriod::from_str(p).ok())
                .unwrap_or_default();
            let mut salary = Salary::new(self.salary_min, self.salary_max, period);
            if let Some(currency) = self.salary_currency {
                salary = salary.with_currency(currency);
            }
            posting = posting.with_salary(salary);
        }
        if let Some(job_type) = self.job_type.as_deref().and_then(|j| JobType::from_str(j).ok()) {
            posting = posting.with_job_type(job_type);
        }
        if let Some(posted) = self.posted_at {
            posting = posting.with_posted_date(posted);
        }
        if let Some(remote) = self.remote {
            posting = posting.with_metadata("remote", serde_json::Value::Bool(remote));
        }
        posting
    }
}
