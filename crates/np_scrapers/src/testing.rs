//! Test doubles shared by the crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use np_core::{ContentFetcher, FetchFailure, FetchStrategy};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 29, 10, 0, 0).unwrap()
}

pub fn midnight_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 29, 0, 0, 0).unwrap()
}

#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves canned markup per URL and measures fetch concurrency. Unknown URLs
/// fail with a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, Result<String, FetchFailure>>,
    delay: Duration,
    listing: Gauge,
    articles: Gauge,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, markup: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Ok(markup.into()));
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, failure: FetchFailure) -> Self {
        self.pages.insert(url.into(), Err(failure));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_listing(&self) -> usize {
        self.listing.peak.load(Ordering::SeqCst)
    }

    pub fn peak_articles(&self) -> usize {
        self.articles.peak.load(Ordering::SeqCst)
    }

    fn is_listing(url: &str) -> bool {
        url.contains("/date_") || url.contains("newsfeed?") || url.ends_with("newsfeed")
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _strategy: FetchStrategy, _timeout: Duration) -> Result<String, FetchFailure> {
        self.calls.lock().unwrap().push(url.to_string());
        let gauge = if Self::is_listing(url) { &self.listing } else { &self.articles };
        gauge.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        gauge.leave();
        self.pages
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchFailure::ClientError(404)))
    }
}

/// An epravda-style listing page.
pub fn epravda_listing(entries: &[(&str, &str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(time, href, title)| {
            format!(
                r#"<div class="article_news"><div class="article_date">{}</div><div class="article_title"><a href="{}">{}</a></div></div>"#,
                time, href, title
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="section_articles_grid_wrapper">{}</div></body></html>"#,
        items
    )
}

/// A politeka-style listing page.
pub fn politeka_listing(entries: &[(&str, &str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(date, href, title)| {
            format!(
                r#"<div class="b_post b_post--image-sm"><div class="b_post--media"><a href="{}">{}</a></div><div class="b_post--date">{}</div></div>"#,
                href, title, date
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="col-lg-8 col-md-12">{}</div></body></html>"#,
        items
    )
}

/// A generic article page understood by every built-in source.
pub fn article_page(title: &str, body: &str, published: Option<&str>) -> String {
    let time = published
        .map(|p| format!(r#"<time datetime="{}">{}</time>"#, p, p))
        .unwrap_or_default();
    format!(
        r#"<html><body><article class="post"><h1>{}</h1>{}<div class="post_text b_article-text"><p>{}</p></div></article></body></html>"#,
        title, time, body
    )
}
