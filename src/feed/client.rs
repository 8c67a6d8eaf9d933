//! Blocking HTTP transport with optional retries, and the AtomPub feed client built on it.

use super::{decode_feed, FeedClient, FeedError, ImageFetcher};
use crate::auth::Authenticator;
use crate::model::FeedPage;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("blogcrawl/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Default number of attempts per request: one, i.e. no retry.
const DEFAULT_RETRY_COUNT: u32 = 1;
/// Backoff delays in seconds after each failed attempt when retries are enabled.
const DEFAULT_BACKOFF_SECS: [u64; 4] = [1, 2, 4, 8];
/// Backoff for HTTP 429 (rate limit): wait longer so the server can recover.
const BACKOFF_429_SECS: [u64; 4] = [30, 60, 90, 120];

/// Public host of the feed API.
pub const DEFAULT_ENDPOINT: &str = "https://blog.hatena.ne.jp";

/// Blocking HTTP client. Retries belong here rather than to the crawl: only timeouts,
/// connection failures, HTTP 5xx and HTTP 429 are retried, and only when `retry_count > 1`.
#[derive(Debug, Clone)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl PoliteClient {
    /// Client with the default User-Agent, timeout and a single attempt per request.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    fn backoff(&self, attempt: u32, status: Option<u16>) -> Duration {
        let table: &[u64] = if status == Some(429) {
            &BACKOFF_429_SECS
        } else {
            &self.backoff_secs
        };
        let secs = table
            .get(attempt as usize)
            .or_else(|| table.last())
            .copied()
            .unwrap_or(1);
        Duration::from_secs(secs)
    }

    /// GET `url`, attaching the header produced by `auth` (recomputed on every attempt so each
    /// carries a fresh nonce). Non-success statuses are returned as responses, not errors.
    pub fn get(
        &self,
        url: &Url,
        auth: Option<&dyn Authenticator>,
    ) -> Result<reqwest::blocking::Response, FeedError> {
        let mut attempt = 0;
        loop {
            let last_attempt = attempt + 1 >= self.retry_count;
            let mut request = self.inner.get(url.clone());
            if let Some(auth) = auth {
                let (name, value) = auth.authorize("GET", url)?;
                request = request.header(name, value);
            }
            debug!(url = %url, attempt = attempt + 1, "GET");
            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if retryable && !last_attempt {
                        let wait = self.backoff(attempt, Some(status.as_u16()));
                        warn!(url = %url, status = status.as_u16(), ?wait, "retrying request");
                        std::thread::sleep(wait);
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && !last_attempt {
                        let wait = self.backoff(attempt, None);
                        warn!(url = %url, error = %e, ?wait, "retrying request");
                        std::thread::sleep(wait);
                        attempt += 1;
                        continue;
                    }
                    return Err(FeedError::Network {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }
    }
}

fn check_status(
    response: reqwest::blocking::Response,
    url: &Url,
    page: Option<&str>,
) -> Result<reqwest::blocking::Response, FeedError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(FeedError::HttpStatus {
        status: status.as_u16(),
        url: url.to_string(),
        page: page.map(str::to_string),
        body: body.trim().to_string(),
    })
}

impl ImageFetcher for PoliteClient {
    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>, FeedError> {
        let parsed = Url::parse(url).map_err(|e| FeedError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        let response = check_status(self.get(&parsed, None)?, &parsed, None)?;
        let bytes = response.bytes().map_err(|e| FeedError::BodyRead {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Builder for PoliteClient with optional User-Agent, timeout, and retry settings.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl PoliteClientBuilder {
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Number of attempts for transient failures (default 1, minimum 1).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Backoff delays in seconds before each retry; the last value is reused when shorter.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PoliteClient {
            inner,
            retry_count: self.retry_count,
            backoff_secs: self.retry_backoff_secs,
        })
    }
}

/// Reads the AtomPub entry collection of one blog.
pub struct AtomPubClient {
    http: PoliteClient,
    collection: Url,
    auth: Option<Box<dyn Authenticator>>,
}

impl AtomPubClient {
    /// Collection URL is `{endpoint}/{account}/{blog}/atom/entry`.
    pub fn new(
        http: PoliteClient,
        endpoint: &str,
        account: &str,
        blog: &str,
        auth: Option<Box<dyn Authenticator>>,
    ) -> Result<Self, FeedError> {
        let input = format!(
            "{}/{}/{}/atom/entry",
            endpoint.trim_end_matches('/'),
            account,
            blog
        );
        let collection = Url::parse(&input).map_err(|e| FeedError::InvalidUrl {
            input: input.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            http,
            collection,
            auth,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection
    }

    pub(crate) fn page_url(&self, token: Option<&str>) -> Url {
        let mut url = self.collection.clone();
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("page", token);
        }
        url
    }
}

impl FeedClient for AtomPubClient {
    fn fetch_page(&mut self, token: Option<&str>) -> Result<FeedPage, FeedError> {
        let url = self.page_url(token);
        let response = self.http.get(&url, self.auth.as_deref())?;
        let response = check_status(response, &url, token)?;
        let body = response.text().map_err(|e| FeedError::BodyRead {
            url: url.to_string(),
            source: e,
        })?;
        decode_feed(&body).map_err(|e| match e {
            FeedError::Decode { reason, .. } => FeedError::Decode {
                page: token.map(str::to_string),
                reason,
            },
            other => other,
        })
    }
}
