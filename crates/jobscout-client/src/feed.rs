use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::{Host, Url};

use jobscout_core::error::AppError;
use jobscout_core::models::{FetchError, FetchErrorKind, FetchOutcome, PostingQuery, SourceId};
use jobscout_core::retry::RetryPolicy;
use jobscout_core::traits::Fetcher;

use crate::wire::{FeedItem, FeedPage, FeedPayload};

pub const DEFAULT_USER_AGENT: &str = concat!("jobscout/", env!("CARGO_PKG_VERSION"));

/// Per-request HTTP timeout when a source does not set one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on `next` links followed in one fetch.
pub const MAX_PAGES: usize = 5;

/// One configured JSON feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: SourceId,
    pub url: Url,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl FeedConfig {
    pub fn new(id: impl Into<SourceId>, url: Url) -> Self {
        Self {
            id: id.into(),
            url,
            timeout_secs: None,
            user_agent: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}

/// Fetches postings from a JSON job feed over HTTP.
///
/// The query is passed as `q`, `location`, `limit`, `job_type` and `days`
/// parameters. Transient failures are retried per the [`RetryPolicy`];
/// throttling and layout problems are reported straight away.
///
/// Requests to private/reserved addresses are refused unless
/// [`allow_private_urls`](Self::allow_private_urls) is set, since feed URLs
/// come from user-edited files.
#[derive(Clone)]
pub struct FeedFetcher {
    config: FeedConfig,
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
    ssrf_protection: bool,
}

impl FeedFetcher {
    pub fn new(config: FeedConfig) -> Result<Self, AppError> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            timeout,
            retry: RetryPolicy::default(),
            ssrf_protection: true,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Feed URL with the query encoded as parameters.
    pub fn request_url(&self, query: &PostingQuery) -> Url {
        let mut url = self.config.url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.keywords);
            if let Some(location) = &query.location {
                pairs.append_pair("location", location);
            }
            pairs.append_pair("limit", &query.max_results_per_source.to_string());
            if let Some(job_type) = query.job_type {
                pairs.append_pair("job_type", job_type.as_str());
            }
            if let Some(days) = query.posted_within_days {
                pairs.append_pair("days", &days.to_string());
            }
        }
        url
    }

    async fn get_page(&self, url: &Url) -> Result<FeedPage, AppError> {
        if self.ssrf_protection {
            check_host(url).await?;
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, url));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.classify_transport(&e))?;
        let payload: FeedPayload = serde_json::from_str(&body)
            .map_err(|e| AppError::ParseError(format!("Unexpected feed payload from {url}: {e}")))?;
        Ok(payload.into())
    }

    /// Map a reqwest failure onto a typed variant.
    fn classify_transport(&self, e: &reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else if e.is_request() || e.is_body() || e.is_decode() {
            AppError::NetworkError(format!("Transfer failed: {e}"))
        } else if e.is_builder() || e.is_redirect() {
            AppError::InvalidConfig(format!("Unusable feed request: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for FeedFetcher {
    fn source_id(&self) -> SourceId {
        self.config.id.clone()
    }

    async fn fetch(&self, query: &PostingQuery) -> Result<FetchOutcome, AppError> {
        let source = self.config.id.clone();
        let limit = query.max_results_per_source;
        let mut next = Some(self.request_url(query));
        let mut postings = Vec::new();
        let mut errors = Vec::new();
        let mut total_found = None;
        let mut pages = 0;

        while let Some(url) = next.take()
            && pages < MAX_PAGES
            && postings.len() < limit
        {
            pages += 1;
            let page = match self.retry.run(&source, |_| self.get_page(&url)).await {
                Ok(page) => page,
                Err(e) => {
                    errors.push(
                        FetchError::from_app_error(source.clone(), &e)
                            .with_context(serde_json::json!({ "url": url.as_str(), "page": pages })),
                    );
                    break;
                }
            };

            if total_found.is_none() {
                total_found = page.total;
            }
            for (index, value) in page.postings.into_iter().enumerate() {
                match serde_json::from_value::<FeedItem>(value) {
                    Ok(item) => postings.push(item.into_posting(&source)),
                    Err(e) => errors.push(
                        FetchError::new(
                            source.clone(),
                            FetchErrorKind::ParseError,
                            format!("Skipped malformed posting: {e}"),
                        )
                        .with_context(serde_json::json!({ "page": pages, "index": index })),
                    ),
                }
            }
            next = page.next.and_then(|n| url.join(&n).ok());
        }

        postings.truncate(limit);
        tracing::debug!(
            %source,
            pages,
            postings = postings.len(),
            errors = errors.len(),
            "Feed fetched"
        );

        let mut outcome = FetchOutcome::new(source, postings);
        outcome.total_found = total_found.unwrap_or(outcome.postings.len()).max(outcome.postings.len());
        outcome.errors = errors;
        Ok(outcome)
    }
}

/// Map a non-success status onto the error taxonomy.
fn classify_status(status: StatusCode, body: &str, url: &Url) -> AppError {
    let code = status.as_u16();
    let captcha = body.to_lowercase().contains("captcha");
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN || captcha {
        AppError::RateLimited(format!("HTTP {code} from {url}"))
    } else if status.is_server_error() {
        AppError::NetworkError(format!("HTTP {code} from {url}"))
    } else if status.is_client_error() {
        AppError::InvalidConfig(format!("HTTP {code} from {url}"))
    } else {
        AppError::HttpError(format!("HTTP {code} from {url}"))
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Refuse non-http(s) URLs and hosts that resolve to private/reserved IPs.
async fn check_host(url: &Url) -> Result<(), AppError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidConfig(format!(
            "URL scheme '{}' is not allowed (only http/https)",
            url.scheme()
        )));
    }

    let addrs: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(v4)) => vec![IpAddr::V4(v4)],
        Some(Host::Ipv6(v6)) => vec![IpAddr::V6(v6)],
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {domain}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
        None => return Err(AppError::InvalidConfig(format!("URL has no host: {url}"))),
    };

    if let Some(ip) = addrs.into_iter().find(|ip| is_private_ip(*ip)) {
        return Err(AppError::InvalidConfig(format!(
            "Refusing to fetch {url}: resolves to private/reserved address {ip}"
        )));
    }
    Ok(())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFFC0) == 0xFE80
                || (first & 0xFE00) == 0xFC00
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
