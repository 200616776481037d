use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{NewsCollection, NewsItem, NewsStatistics, Product};
use crate::Result;

/// What a save did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Replaced,
}

/// Pagination window for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 100, offset: 0 }
    }
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

#[async_trait]
pub trait NewsStorage: Send + Sync {
    /// Store a collection, replacing a recent collection from the same source.
    async fn save_collection(&self, collection: &NewsCollection) -> Result<SaveOutcome>;

    /// Items stored for a source, newest publication first. An article kept
    /// by several collections is returned once, from the latest one.
    async fn get_by_source(&self, source_url: &str, page: Page) -> Result<Vec<NewsItem>>;

    /// Items published within `[start, end]`, optionally restricted to a source.
    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_url: Option<&str>,
        page: Page,
    ) -> Result<Vec<NewsItem>>;

    /// Case-insensitive search over titles and bodies.
    async fn search(&self, query: &str, source_url: Option<&str>, page: Page) -> Result<Vec<NewsItem>>;

    async fn statistics(&self) -> Result<NewsStatistics>;

    /// Remove collections parsed before `cutoff`. Returns how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait ProductStorage: Send + Sync {
    /// Upsert by product URL.
    async fn save_product(&self, product: &Product) -> Result<SaveOutcome>;

    async fn get_product(&self, url: &str) -> Result<Option<Product>>;
}
