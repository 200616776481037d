use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use np_core::text::{host_of, same_site};
use np_core::{ArticleRecord, ArticleStub, Error, Result};
use scraper::{ElementRef, Html, Selector};

pub mod extract;
pub mod ukraine;

/// How a source's listing pages are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// One listing page per calendar day, from today back to the boundary.
    DateSweep,
    /// `?page=N` pages, newest first, stopped at the first page holding an
    /// article older than the boundary.
    PageSweep { max_pages: usize },
}

/// A listing page to fetch, with the calendar date its URL encodes, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub url: String,
    pub page_date: Option<NaiveDate>,
}

impl ListingPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_date: None,
        }
    }
}

/// Per-site rules for a news source.
///
/// Fetching and concurrency live in the pipeline; a source only knows which
/// pages to ask for and how to read them.
pub trait NewsSource: Send + Sync {
    /// Short display name
    fn name(&self) -> &'static str;

    /// Registrable domain routed to this source
    fn domain(&self) -> &'static str;

    /// Listing URL parsed when a caller names the source instead of a URL
    fn default_url(&self) -> &'static str;

    fn pagination(&self) -> Pagination;

    /// Listing pages to fetch for a request.
    fn listing_urls_for(
        &self,
        source_url: &str,
        boundary: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        max_pages: usize,
    ) -> Vec<ListingPage>;

    /// Stubs found on one listing page. Fails when the listing container is
    /// missing from the markup.
    fn extract_stubs(&self, markup: &str, page: &ListingPage, now: DateTime<Utc>) -> Result<Vec<ArticleStub>>;

    /// Full record from an article page, `None` when the article container is
    /// missing.
    fn extract_full_record(&self, markup: &str, article_url: &str, now: DateTime<Utc>) -> Option<ArticleRecord>;

    /// Whether the article lives on the source's own site and is worth a
    /// full fetch.
    fn should_fetch_full_record(&self, source_url: &str, article_url: &str) -> bool {
        same_site(source_url, article_url, false)
    }

    /// Returns a list of CLI shorthand names for this source
    fn cli_names(&self) -> Vec<&str> {
        vec![]
    }
}

/// Day-by-day listing pages from today back to the boundary's day, newest
/// first. Without a boundary only today's page is produced; the sweep never
/// exceeds `cap` pages.
pub fn date_sweep(news_url: &str, boundary: Option<DateTime<Utc>>, now: DateTime<Utc>, cap: usize) -> Vec<ListingPage> {
    let today = now.date_naive();
    let last = boundary.map(|b| b.date_naive().min(today)).unwrap_or(today);
    let news_url = news_url.trim_end_matches('/');

    let mut pages = Vec::new();
    let mut day = today;
    while day >= last && pages.len() < cap.max(1) {
        pages.push(ListingPage {
            url: format!("{}/date_{}/", news_url, day.format("%d%m%Y")),
            page_date: Some(day),
        });
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    pages
}

/// `base`, `base?page=2`, ... up to `max_pages` pages.
pub fn page_sweep(source_url: &str, max_pages: usize) -> Vec<ListingPage> {
    let separator = if source_url.contains('?') { '&' } else { '?' };
    (1..=max_pages.max(1))
        .map(|n| {
            if n == 1 {
                ListingPage::new(source_url)
            } else {
                ListingPage::new(format!("{}{}page={}", source_url, separator, n))
            }
        })
        .collect()
}

/// Routes source URLs to sources by host.
///
/// Domains are matched longest first on label boundaries, so
/// `epravda.com.ua` never resolves to the `pravda.com.ua` source.
#[derive(Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn NewsSource>>,
}

impl SourceRegistry {
    pub fn new(mut sources: Vec<Arc<dyn NewsSource>>) -> Self {
        sources.sort_by_key(|s| std::cmp::Reverse(s.domain().len()));
        Self { sources }
    }

    /// Registry with every built-in source.
    pub fn with_defaults() -> Self {
        Self::new(ukraine::get_sources())
    }

    pub fn sources(&self) -> &[Arc<dyn NewsSource>] {
        &self.sources
    }

    pub fn resolve(&self, source_url: &str) -> Result<Arc<dyn NewsSource>> {
        let host = host_of(source_url).ok_or_else(|| Error::InvalidUrl(source_url.to_string()))?;
        self.sources
            .iter()
            .find(|s| host == s.domain() || host.ends_with(&format!(".{}", s.domain())))
            .cloned()
            .ok_or_else(|| Error::UnsupportedSource(host))
    }

    pub fn by_cli_name(&self, name: &str) -> Option<Arc<dyn NewsSource>> {
        self.sources
            .iter()
            .find(|s| s.cli_names().contains(&name))
            .cloned()
    }

    pub fn supported_domains(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.domain()).collect()
    }
}

/// Common utilities for sources
pub(crate) mod utils {
    use super::*;

    pub fn parse_selector(selector: &str) -> Result<Selector> {
        Selector::parse(selector).map_err(|e| Error::Scraping(format!("Invalid selector {}: {:?}", selector, e)))
    }

    pub fn element_text(element: &ElementRef) -> String {
        np_core::text::clean_text(&element.text().collect::<Vec<_>>().join(" "))
    }

    pub fn select_first<'a>(scope: &ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
        let selector = parse_selector(selector).ok()?;
        scope.select(&selector).next()
    }

    pub fn extract_text(scope: &ElementRef, selector: &str) -> Option<String> {
        select_first(scope, selector)
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
    }

    pub fn extract_texts(scope: &ElementRef, selector: &str) -> Vec<String> {
        let Ok(selector) = parse_selector(selector) else {
            return Vec::new();
        };
        scope
            .select(&selector)
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// First element matching `selector` in a whole document.
    pub fn document_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
        let selector = parse_selector(selector).ok()?;
        document.select(&selector).next()
    }
}
