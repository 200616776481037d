//! Two-phase news parse: listing pages fan out into stubs, eligible stubs fan
//! out into full article fetches, and everything is merged into one
//! collection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use np_core::config::PipelineConfig;
use np_core::text::date_is_acceptable;
use np_core::{
    ArticleRecord, ArticleStub, ContentFetcher, FetchStrategy, NewsCollection, NewsItem, NewsRequest,
    ParseStatus,
};

use crate::fanout::{BoundedFanOut, FaultRecord, Stage, TaskOutcome};
use crate::scrapers::{ListingPage, NewsSource, Pagination};

/// Source of "now" for date arithmetic.
pub type Clock = fn() -> DateTime<Utc>;

/// Batches of full-record fetches allowed to overlap.
const BATCHES_IN_FLIGHT: usize = 2;

/// What happened during a parse, beyond the items themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    pub pages_requested: usize,
    pub pages_failed: usize,
    /// Fetched alongside the boundary page but never read.
    pub pages_discarded: usize,
    pub stubs_found: usize,
    pub duplicates_dropped: usize,
    pub full_records: usize,
    pub fallbacks: usize,
    pub filtered_out: usize,
    pub faults: Vec<FaultRecord>,
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub collection: NewsCollection,
    pub report: ParseReport,
}

pub struct NewsPipeline {
    fetcher: Arc<dyn ContentFetcher>,
    config: PipelineConfig,
    timeout: Duration,
    clock: Clock,
}

impl NewsPipeline {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, config: PipelineConfig, timeout: Duration) -> Self {
        Self {
            fetcher,
            config,
            timeout,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn parse(&self, source: Arc<dyn NewsSource>, request: &NewsRequest) -> NewsCollection {
        self.parse_detailed(source, request).await.collection
    }

    /// Never fails: every fault ends up either in the report or in a
    /// `failed` collection.
    #[instrument(skip_all, fields(source = source.name(), url = %request.source_url, strategy = %request.strategy))]
    pub async fn parse_detailed(&self, source: Arc<dyn NewsSource>, request: &NewsRequest) -> ParseOutcome {
        let started = Instant::now();
        info!(until = ?request.until, "📰 starting news parse");

        let work = self.run(source, request);
        let outcome = match self.config.deadline() {
            Some(deadline) => match tokio::time::timeout(deadline, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let message = format!("parse exceeded its {}s deadline", deadline.as_secs());
                    error!(%message, "parse aborted");
                    ParseOutcome {
                        collection: NewsCollection::failed(&request.source_url, message)
                            .with_parsed_at(self.now()),
                        report: ParseReport::default(),
                    }
                }
            },
            None => work.await,
        };

        info!(
            status = %outcome.collection.status,
            items = outcome.collection.total_items(),
            faults = outcome.report.faults.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ news parse finished"
        );
        outcome
    }

    async fn run(&self, source: Arc<dyn NewsSource>, request: &NewsRequest) -> ParseOutcome {
        let now = self.now();
        let mut report = ParseReport::default();

        let pages = source.listing_urls_for(&request.source_url, request.until, now, self.config.max_listing_pages);
        let page_fan = BoundedFanOut::new(self.config.page_concurrency);
        let stubs = match source.pagination() {
            Pagination::DateSweep => {
                self.sweep_all(source.as_ref(), &page_fan, pages, request.strategy, now, &mut report)
                    .await
            }
            Pagination::PageSweep { .. } => {
                self.sweep_until_boundary(source.as_ref(), &page_fan, pages, request, now, &mut report)
                    .await
            }
        };

        report.stubs_found = stubs.len();
        let stubs = dedupe(stubs);
        report.duplicates_dropped = report.stubs_found - stubs.len();

        // Listing timestamps are authoritative, so old stubs can be dropped
        // before spending a fetch on them.
        let before = stubs.len();
        let stubs: Vec<ArticleStub> = stubs
            .into_iter()
            .filter(|stub| date_is_acceptable(stub.timestamp, request.until))
            .collect();
        report.filtered_out = before - stubs.len();

        let items = self.build_items(source, stubs, request, now, &mut report).await;
        let before = items.len();
        let items: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| date_is_acceptable(item.record.published_at, request.until))
            .collect();
        report.filtered_out += before - items.len();

        let collection = finish(&request.source_url, items, &report).with_parsed_at(now);
        ParseOutcome { collection, report }
    }

    async fn fetch_pages(
        &self,
        fan: &BoundedFanOut,
        pages: Vec<ListingPage>,
        strategy: FetchStrategy,
        report: &mut ParseReport,
    ) -> Vec<(ListingPage, TaskOutcome<String>)> {
        report.pages_requested += pages.len();
        let fetcher = self.fetcher.clone();
        let timeout = self.timeout;
        let urls: Vec<String> = pages.iter().map(|p| p.url.clone()).collect();

        let outcomes = fan
            .run(urls, |url| (Stage::ListingPage, url.clone()), move |url: String| {
                let fetcher = fetcher.clone();
                async move {
                    fetcher
                        .fetch(&url, strategy, timeout)
                        .await
                        .map_err(|failure| FaultRecord::new(Stage::ListingPage, url.clone(), failure))
                }
            })
            .await;

        pages.into_iter().zip(outcomes).collect()
    }

    /// Stubs of one fetched page. `None` means the fetch itself failed.
    fn read_page(
        &self,
        source: &dyn NewsSource,
        page: &ListingPage,
        outcome: TaskOutcome<String>,
        now: DateTime<Utc>,
        report: &mut ParseReport,
    ) -> Option<Vec<ArticleStub>> {
        match outcome {
            TaskOutcome::Done(markup) => match source.extract_stubs(&markup, page, now) {
                Ok(stubs) => {
                    debug!(page = %page.url, stubs = stubs.len(), "read listing page");
                    Some(stubs)
                }
                Err(e) => {
                    warn!(page = %page.url, error = %e, "⚠️ listing page has no news container");
                    report.faults.push(FaultRecord::new(Stage::ListingExtraction, &page.url, e));
                    Some(Vec::new())
                }
            },
            TaskOutcome::Fault(fault) => {
                warn!(page = %page.url, error = %fault.message, "listing page fetch failed");
                report.pages_failed += 1;
                report.faults.push(fault);
                None
            }
        }
    }

    async fn sweep_all(
        &self,
        source: &dyn NewsSource,
        fan: &BoundedFanOut,
        pages: Vec<ListingPage>,
        strategy: FetchStrategy,
        now: DateTime<Utc>,
        report: &mut ParseReport,
    ) -> Vec<ArticleStub> {
        let fetched = self.fetch_pages(fan, pages, strategy, report).await;
        let mut stubs = Vec::new();
        for (page, outcome) in fetched {
            if let Some(found) = self.read_page(source, &page, outcome, now, report) {
                stubs.extend(found);
            }
        }
        stubs
    }

    /// Fetches pages a window at a time and stops at the first stub older
    /// than the boundary.
    async fn sweep_until_boundary(
        &self,
        source: &dyn NewsSource,
        fan: &BoundedFanOut,
        pages: Vec<ListingPage>,
        request: &NewsRequest,
        now: DateTime<Utc>,
        report: &mut ParseReport,
    ) -> Vec<ArticleStub> {
        let mut stubs = Vec::new();
        let mut remaining = pages.into_iter();

        'windows: loop {
            let window: Vec<ListingPage> = remaining.by_ref().take(self.config.page_concurrency).collect();
            if window.is_empty() {
                break;
            }
            let fetched = self.fetch_pages(fan, window, request.strategy, report).await;
            let fetched_count = fetched.len();
            for (position, (page, outcome)) in fetched.into_iter().enumerate() {
                let Some(mut found) = self.read_page(source, &page, outcome, now, report) else {
                    continue;
                };
                let cut = found
                    .iter()
                    .position(|stub| !date_is_acceptable(stub.timestamp, request.until));
                if let Some(cut) = cut {
                    found.truncate(cut);
                    stubs.extend(found);
                    let unread = fetched_count - position - 1;
                    report.pages_requested -= unread;
                    report.pages_discarded += unread;
                    info!(page = %page.url, unread, "reached articles older than the boundary");
                    break 'windows;
                }
                stubs.extend(found);
            }
        }
        stubs
    }

    async fn build_items(
        &self,
        source: Arc<dyn NewsSource>,
        stubs: Vec<ArticleStub>,
        request: &NewsRequest,
        now: DateTime<Utc>,
        report: &mut ParseReport,
    ) -> Vec<NewsItem> {
        let mut records: Vec<ArticleRecord> = stubs.iter().map(ArticleRecord::from_stub).collect();

        let eligible: Vec<(usize, ArticleStub)> = stubs
            .iter()
            .enumerate()
            .filter(|(_, stub)| source.should_fetch_full_record(&request.source_url, &stub.url))
            .map(|(index, stub)| (index, stub.clone()))
            .collect();
        info!(
            stubs = stubs.len(),
            full = eligible.len(),
            "splitting stubs into stub-only and full records"
        );

        let article_fan = BoundedFanOut::new(self.config.article_concurrency);
        let batches: Vec<Vec<(usize, ArticleStub)>> = eligible
            .chunks(self.config.article_batch_size.max(1))
            .map(<[_]>::to_vec)
            .collect();

        let results: Vec<_> = stream::iter(batches)
            .map(|batch| self.fetch_batch(&article_fan, source.clone(), batch, request.strategy, now))
            .buffered(BATCHES_IN_FLIGHT)
            .collect()
            .await;

        for (index, stub, outcome) in results.into_iter().flatten() {
            match outcome {
                TaskOutcome::Done(mut record) => {
                    if stub.timestamp.is_some() {
                        record.published_at = stub.timestamp;
                    }
                    if record.title.trim().is_empty() {
                        record.title = stub.title.clone();
                    }
                    records[index] = record;
                    report.full_records += 1;
                }
                TaskOutcome::Fault(fault) => {
                    warn!(article = %fault.url, error = %fault.message, "falling back to listing data");
                    report.fallbacks += 1;
                    report.faults.push(fault);
                }
            }
        }

        stubs
            .into_iter()
            .zip(records)
            .map(|(stub, record)| NewsItem::new(&request.source_url, stub.url, record))
            .collect()
    }

    async fn fetch_batch(
        &self,
        fan: &BoundedFanOut,
        source: Arc<dyn NewsSource>,
        batch: Vec<(usize, ArticleStub)>,
        strategy: FetchStrategy,
        now: DateTime<Utc>,
    ) -> Vec<(usize, ArticleStub, TaskOutcome<ArticleRecord>)> {
        let fetcher = self.fetcher.clone();
        let timeout = self.timeout;
        let urls: Vec<String> = batch.iter().map(|(_, stub)| stub.url.clone()).collect();

        let outcomes = fan
            .run(urls, |url| (Stage::Article, url.clone()), move |url: String| {
                let fetcher = fetcher.clone();
                let source = source.clone();
                async move {
                    let markup = fetcher
                        .fetch(&url, strategy, timeout)
                        .await
                        .map_err(|failure| FaultRecord::new(Stage::Article, url.clone(), failure))?;
                    source
                        .extract_full_record(&markup, &url, now)
                        .ok_or_else(|| FaultRecord::new(Stage::Article, url.clone(), "article container not found"))
                }
            })
            .await;

        batch
            .into_iter()
            .zip(outcomes)
            .map(|((index, stub), outcome)| (index, stub, outcome))
            .collect()
    }
}

/// First occurrence of each article URL wins.
fn dedupe(stubs: Vec<ArticleStub>) -> Vec<ArticleStub> {
    let mut seen = HashSet::new();
    stubs.into_iter().filter(|stub| seen.insert(stub.url.clone())).collect()
}

fn finish(source_url: &str, items: Vec<NewsItem>, report: &ParseReport) -> NewsCollection {
    if report.pages_requested > 0 && report.pages_failed == report.pages_requested {
        return NewsCollection::failed(
            source_url,
            format!("all {} listing pages failed to load", report.pages_requested),
        );
    }
    if items.is_empty() {
        if report.pages_failed > 0 {
            return NewsCollection::failed(
                source_url,
                format!(
                    "no articles found; {} of {} listing pages failed to load",
                    report.pages_failed, report.pages_requested
                ),
            );
        }
        return NewsCollection::new(source_url, items, ParseStatus::NoData);
    }
    if report.faults.is_empty() {
        NewsCollection::success(source_url, items)
    } else {
        NewsCollection::new(source_url, items, ParseStatus::Partial).with_error(format!(
            "{} pages and {} articles could not be processed",
            report.pages_failed, report.fallbacks
        ))
    }
}
