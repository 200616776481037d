//! Content fetchers: plain HTTP, remote headless browser, and a retrying
//! decorator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::redirect::Policy;
use serde_json::json;
use tracing::{debug, instrument, warn};

use np_core::config::{BrowserConfig, HttpConfig};
use np_core::{ContentFetcher, Error, FetchFailure, FetchStrategy, Result};

/// Browser-like default headers sent with every plain request.
pub fn default_headers(config: &HttpConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = |v: &str| {
        HeaderValue::from_str(v).map_err(|e| Error::Validation(format!("invalid header value '{}': {}", v, e)))
    };
    headers.insert(USER_AGENT, value(&config.user_agent)?);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, value(&config.accept_language)?);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    Ok(headers)
}

fn classify(err: reqwest::Error) -> FetchFailure {
    FetchFailure::from(&err)
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .redirect(Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<String, FetchFailure> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let failure = FetchFailure::from_status(status.as_u16());
            match failure {
                FetchFailure::Forbidden => warn!(url, "🚫 access forbidden"),
                FetchFailure::RateLimited => warn!(url, "⏳ rate limited"),
                _ => warn!(url, status = status.as_u16(), "unexpected status"),
            }
            return Err(failure);
        }

        let body = response.text().await.map_err(classify)?;
        if body.trim().is_empty() {
            return Err(FetchFailure::Empty);
        }
        debug!(url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

/// Renders pages through a remote headless browser service exposing a
/// `/content` endpoint that returns the final DOM as HTML.
#[derive(Clone)]
pub struct BrowserFetcher {
    client: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
    settle_delay: Duration,
    accept_language: String,
}

impl BrowserFetcher {
    pub fn new(browser: &BrowserConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: browser
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            token: browser.token.clone(),
            settle_delay: Duration::from_millis(browser.settle_delay_ms),
            accept_language: http.accept_language.clone(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn render(&self, url: &str, timeout: Duration) -> std::result::Result<String, FetchFailure> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| FetchFailure::Render("no rendering endpoint configured".to_string()))?;

        let body = json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": "domcontentloaded",
                "timeout": timeout.as_millis() as u64,
            },
            "waitForTimeout": self.settle_delay.as_millis() as u64,
            "setExtraHTTPHeaders": {
                "Accept-Language": self.accept_language,
            },
        });

        let mut request = self.client.post(format!("{}/content", endpoint));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }
        let response = request
            .timeout(timeout + self.settle_delay)
            .json(&body)
            .send()
            .await
            .map_err(|e| match classify(e) {
                FetchFailure::Connection(msg) => FetchFailure::Render(msg),
                other => other,
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(url, status = status.as_u16(), "render service refused page");
            return Err(FetchFailure::Render(format!("status {}: {}", status, detail.trim())));
        }

        let html = response.text().await.map_err(classify)?;
        if html.trim().is_empty() {
            return Err(FetchFailure::Empty);
        }
        Ok(html)
    }
}

/// Dispatches to the plain or browser fetcher by strategy.
#[derive(Clone)]
pub struct StrategyFetcher {
    http: HttpFetcher,
    browser: BrowserFetcher,
}

impl StrategyFetcher {
    pub fn new(http: HttpFetcher, browser: BrowserFetcher) -> Self {
        Self { http, browser }
    }

    pub fn from_config(http: &HttpConfig, browser: &BrowserConfig) -> Result<Self> {
        Ok(Self::new(HttpFetcher::new(http)?, BrowserFetcher::new(browser, http)?))
    }
}

#[async_trait]
impl ContentFetcher for StrategyFetcher {
    async fn fetch(
        &self,
        url: &str,
        strategy: FetchStrategy,
        timeout: Duration,
    ) -> std::result::Result<String, FetchFailure> {
        match strategy {
            FetchStrategy::Http => self.http.get(url, timeout).await,
            FetchStrategy::Browser => self.browser.render(url, timeout).await,
        }
    }
}

/// Retries transient failures with exponential backoff.
pub struct RetryingFetcher<F> {
    inner: F,
    max_retries: u32,
    base_delay: Duration,
}

impl<F: ContentFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }
}

#[async_trait]
impl<F: ContentFetcher> ContentFetcher for RetryingFetcher<F> {
    async fn fetch(
        &self,
        url: &str,
        strategy: FetchStrategy,
        timeout: Duration,
    ) -> std::result::Result<String, FetchFailure> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch(url, strategy, timeout).await {
                Ok(markup) => return Ok(markup),
                Err(failure) if failure.is_transient() && attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    debug!(url, attempt, ?delay, %failure, "retrying fetch");
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
