//! Best-effort URL probing with HTTP `HEAD` requests.

use core::time::Duration;
use std::sync::LazyLock;

use futures_util::StreamExt;
use futures_util::stream;
use regex::RegexSet;

use catalint_config::UrlCheckConfig;

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Requests in flight when no worker count is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// Status codes that count as a working URL even though they match an
/// invalid pattern. 429 means the server is there but throttling us.
pub const EXCEPTION_STATUS_CODES: &[u16] = &[429];

pub const INVALID_STATUS_CODE_PATTERNS: &[&str] = &["^4[0-9]+$", "^5[0-9]+$"];

/// Status code reported for a request that timed out.
pub const TIMEOUT_STATUS_CODE: u16 = 408;

static INVALID_STATUS_CODES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(INVALID_STATUS_CODE_PATTERNS).expect("status code patterns are valid")
});

/// Outcome of probing one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlStatus {
    pub is_valid: bool,
    /// `None` when no HTTP response was received.
    pub status_code: Option<u16>,
}

impl UrlStatus {
    pub const UNREACHABLE: Self = Self {
        is_valid: false,
        status_code: None,
    };

    pub const TIMED_OUT: Self = Self {
        is_valid: false,
        status_code: Some(TIMEOUT_STATUS_CODE),
    };
}

/// Classify an HTTP status code.
pub fn classify(status: u16) -> UrlStatus {
    let is_valid = EXCEPTION_STATUS_CODES.contains(&status)
        || !INVALID_STATUS_CODES.is_match(&status.to_string());
    UrlStatus {
        is_valid,
        status_code: Some(status),
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HeadError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
}

/// Trait for issuing HTTP `HEAD` requests.
#[async_trait::async_trait]
pub trait HttpHead: Clone + Send + Sync + 'static {
    /// Send a `HEAD` request and return the response status code.
    ///
    /// # Errors
    ///
    /// Returns [`HeadError::Timeout`] when the request timed out and
    /// [`HeadError::Transport`] for any other failure to get a response.
    async fn head(&self, url: &str) -> Result<u16, HeadError>;
}

/// Default `HEAD` client using reqwest. Redirects are not followed.
#[derive(Clone)]
pub struct ReqwestHead(pub reqwest::Client);

impl ReqwestHead {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(options: &UrlCheckOptions) -> Result<Self, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_tls)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map(Self)
    }
}

#[async_trait::async_trait]
impl HttpHead for ReqwestHead {
    async fn head(&self, url: &str) -> Result<u16, HeadError> {
        match self.0.head(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) if e.is_timeout() => Err(HeadError::Timeout),
            Err(e) => Err(HeadError::Transport(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UrlCheckOptions {
    pub verify_tls: bool,
    pub timeout: Duration,
    pub workers: usize,
}

impl Default for UrlCheckOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl From<&UrlCheckConfig> for UrlCheckOptions {
    fn from(config: &UrlCheckConfig) -> Self {
        let defaults = Self::default();
        Self {
            verify_tls: config.verify_tls.unwrap_or(defaults.verify_tls),
            timeout: config.timeout().unwrap_or(defaults.timeout),
            workers: config.workers.unwrap_or(defaults.workers).max(1),
        }
    }
}

/// Run `check` over `items` with at most `workers` futures in flight.
///
/// The output is index-aligned with the input regardless of completion order.
pub async fn apply_concurrently<T, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    check: F,
    workers: usize,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(check)
        .buffered(workers.max(1))
        .collect()
        .await
}

/// Sends HEAD requests to URLs and classifies the answers.
#[derive(Clone)]
pub struct UrlChecker<H: HttpHead = ReqwestHead> {
    head: H,
    timeout: Duration,
    workers: usize,
}

impl UrlChecker<ReqwestHead> {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: &UrlCheckOptions) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(ReqwestHead::new(options)?, options))
    }
}

impl<H: HttpHead> UrlChecker<H> {
    pub fn with_client(head: H, options: &UrlCheckOptions) -> Self {
        Self {
            head,
            timeout: options.timeout,
            workers: options.workers.max(1),
        }
    }

    /// Check one URL. Absent and blank URLs are unreachable without a request.
    pub async fn is_working_url(&self, url: Option<&str>) -> UrlStatus {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return UrlStatus::UNREACHABLE;
        };
        let status = match tokio::time::timeout(self.timeout, self.head.head(url)).await {
            Err(_) | Ok(Err(HeadError::Timeout)) => UrlStatus::TIMED_OUT,
            Ok(Err(HeadError::Transport(error))) => {
                tracing::debug!(url, %error, "request failed");
                UrlStatus::UNREACHABLE
            }
            Ok(Ok(code)) => classify(code),
        };
        tracing::debug!(url, valid = status.is_valid, code = ?status.status_code, "checked");
        status
    }

    /// Check every URL concurrently; results are in input order.
    #[tracing::instrument(skip_all, fields(count = urls.len(), workers = self.workers))]
    pub async fn check_all(&self, urls: &[Option<&str>]) -> Vec<UrlStatus> {
        let owned: Vec<Option<String>> = urls.iter().map(|u| u.map(str::to_string)).collect();
        apply_concurrently(
            owned,
            |url| {
                let checker = self.clone();
                async move { checker.is_working_url(url.as_deref()).await }
            },
            self.workers,
        )
        .await
    }
}
