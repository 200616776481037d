use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use np_core::storage::{NewsStorage, Page, ProductStorage};
use np_core::{
    Config, ContentFetcher, Error, NewsCollection, NewsItem, NewsRequest, NewsStatistics, ParseStatus, Product,
    ProductRequest, Result,
};

use crate::fetcher::{RetryingFetcher, StrategyFetcher};
use crate::pipeline::{Clock, NewsPipeline};
use crate::product::HotlineClient;
use crate::scrapers::SourceRegistry;

/// Label used for lookups that span every source.
pub const ALL_SOURCES: &str = "all";

/// Parses news and product offers and keeps the results in storage.
pub struct ScraperManager {
    registry: SourceRegistry,
    pipeline: NewsPipeline,
    products: HotlineClient,
    news_store: Arc<dyn NewsStorage>,
    product_store: Arc<dyn ProductStorage>,
    config: Config,
}

impl ScraperManager {
    /// Manager that fetches over the network, retrying transient failures.
    pub fn new(config: Config, news_store: Arc<dyn NewsStorage>, product_store: Arc<dyn ProductStorage>) -> Result<Self> {
        let fetcher = RetryingFetcher::new(
            StrategyFetcher::from_config(&config.http, &config.browser)?,
            config.http.max_retries,
            config.http.retry_base_delay(),
        );
        Self::with_fetcher(config, Arc::new(fetcher), news_store, product_store)
    }

    pub fn with_fetcher(
        config: Config,
        fetcher: Arc<dyn ContentFetcher>,
        news_store: Arc<dyn NewsStorage>,
        product_store: Arc<dyn ProductStorage>,
    ) -> Result<Self> {
        config.validate()?;
        let pipeline = NewsPipeline::new(fetcher, config.pipeline.clone(), config.http.timeout());
        let products = HotlineClient::new(&config.product, &config.http)?;
        Ok(Self {
            registry: SourceRegistry::with_defaults(),
            pipeline,
            products,
            news_store,
            product_store,
            config,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.pipeline = self.pipeline.with_clock(clock);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.pipeline.now()
    }

    /// Parses a news source and stores the result.
    ///
    /// Bad input and unknown domains are errors; everything that goes wrong
    /// while crawling is reported through the collection's status.
    pub async fn parse_news(&self, request: &NewsRequest) -> Result<NewsCollection> {
        request.validate(self.now())?;
        let source = self.registry.resolve(&request.source_url)?;
        let collection = self.pipeline.parse(source, request).await;

        // A failed parse carries no items and must not displace a good one.
        if collection.status != ParseStatus::Failed {
            let outcome = self.news_store.save_collection(&collection).await?;
            info!(source = %collection.source_url, ?outcome, "💾 stored news collection");
        } else {
            warn!(source = %collection.source_url, error = ?collection.error_message, "not storing failed parse");
        }
        Ok(collection)
    }

    pub async fn news_by_source(&self, source_url: &str, page: Page) -> Result<NewsCollection> {
        let items = self.news_store.get_by_source(source_url, page).await?;
        Ok(lookup_result(source_url, items))
    }

    pub async fn news_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_url: Option<&str>,
        page: Page,
    ) -> Result<NewsCollection> {
        if start > end {
            return Err(Error::Validation("start date must not be after end date".to_string()));
        }
        let items = self.news_store.get_by_date_range(start, end, source_url, page).await?;
        Ok(lookup_result(source_url.unwrap_or(ALL_SOURCES), items))
    }

    pub async fn search_news(&self, query: &str, source_url: Option<&str>, page: Page) -> Result<NewsCollection> {
        if query.trim().is_empty() {
            return Err(Error::Validation("search query cannot be empty".to_string()));
        }
        let items = self.news_store.search(query, source_url, page).await?;
        Ok(lookup_result(source_url.unwrap_or(ALL_SOURCES), items))
    }

    pub async fn news_statistics(&self) -> Result<NewsStatistics> {
        self.news_store.statistics().await
    }

    /// Looks up shop offers for a product and stores them.
    pub async fn parse_product(&self, request: &ProductRequest) -> Result<Product> {
        let product = self.products.parse_product(request).await?;
        let outcome = self.product_store.save_product(&product).await?;
        info!(url = %product.url, offers = product.total_offers(), ?outcome, "💾 stored product offers");
        Ok(product)
    }

    /// Drops news collections parsed more than `retention` ago.
    pub async fn cleanup(&self, retention: Duration) -> Result<usize> {
        let cutoff = self.now() - retention;
        let removed = self.news_store.delete_older_than(cutoff).await?;
        info!(removed, %cutoff, "🧹 removed old news collections");
        Ok(removed)
    }
}

fn lookup_result(source_url: &str, items: Vec<NewsItem>) -> NewsCollection {
    if items.is_empty() {
        NewsCollection::not_found(source_url)
    } else {
        NewsCollection::success(source_url, items)
    }
}
