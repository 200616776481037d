use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use np_core::config::StorageConfig;
use np_core::storage::{NewsStorage, Page, ProductStorage, SaveOutcome};
use np_core::{NewsCollection, NewsItem, NewsStatistics, Product, Result, SourceStatistics};

/// Process-local store for collections and products.
#[derive(Clone)]
pub struct InMemoryStorage {
    collections: Arc<RwLock<Vec<NewsCollection>>>,
    products: Arc<RwLock<HashMap<String, Product>>>,
    replace_window: Duration,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

impl InMemoryStorage {
    pub fn new(replace_window: Duration) -> Self {
        Self {
            collections: Arc::new(RwLock::new(Vec::new())),
            products: Arc::new(RwLock::new(HashMap::new())),
            replace_window,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(Duration::seconds(config.news_replace_window_secs))
    }

    /// Items of the matching collections, newest collection first, each
    /// article once.
    async fn flatten<P>(&self, keep: P) -> Vec<NewsItem>
    where
        P: Fn(&NewsCollection) -> bool,
    {
        let collections = self.collections.read().await;
        let mut matching: Vec<&NewsCollection> = collections.iter().filter(|c| keep(c)).collect();
        matching.sort_by(|a, b| b.parsed_at.cmp(&a.parsed_at));

        let mut seen = HashSet::new();
        matching
            .into_iter()
            .flat_map(|c| c.items().iter())
            .filter(|item| seen.insert(item.article_url.clone()))
            .cloned()
            .collect()
    }
}

fn matches_source(collection: &NewsCollection, source_url: Option<&str>) -> bool {
    source_url.map_or(true, |s| collection.source_url == s)
}

/// Newest publication first, undated items last.
fn paginate(mut items: Vec<NewsItem>, page: Page) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.record.published_at.cmp(&a.record.published_at));
    items.into_iter().skip(page.offset).take(page.limit).collect()
}

#[async_trait]
impl NewsStorage for InMemoryStorage {
    async fn save_collection(&self, collection: &NewsCollection) -> Result<SaveOutcome> {
        let mut collections = self.collections.write().await;
        let recent = collections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.source_url == collection.source_url)
            .filter(|(_, c)| {
                let gap = collection.parsed_at - c.parsed_at;
                gap <= self.replace_window && gap >= -self.replace_window
            })
            .max_by_key(|(_, c)| c.parsed_at)
            .map(|(index, _)| index);

        match recent {
            Some(index) => {
                collections[index] = collection.clone();
                debug!(source = %collection.source_url, "replaced recent collection");
                Ok(SaveOutcome::Replaced)
            }
            None => {
                collections.push(collection.clone());
                debug!(source = %collection.source_url, "stored new collection");
                Ok(SaveOutcome::Inserted)
            }
        }
    }

    async fn get_by_source(&self, source_url: &str, page: Page) -> Result<Vec<NewsItem>> {
        let items = self.flatten(|c| c.source_url == source_url).await;
        Ok(paginate(items, page))
    }

    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_url: Option<&str>,
        page: Page,
    ) -> Result<Vec<NewsItem>> {
        let items = self
            .flatten(|c| matches_source(c, source_url))
            .await
            .into_iter()
            .filter(|item| {
                item.record
                    .published_at
                    .map_or(false, |published| published >= start && published <= end)
            })
            .collect();
        Ok(paginate(items, page))
    }

    async fn search(&self, query: &str, source_url: Option<&str>, page: Page) -> Result<Vec<NewsItem>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let items = self
            .flatten(|c| matches_source(c, source_url))
            .await
            .into_iter()
            .filter(|item| {
                item.record.title.to_lowercase().contains(&needle)
                    || item.record.body.to_lowercase().contains(&needle)
            })
            .collect();
        Ok(paginate(items, page))
    }

    async fn statistics(&self) -> Result<NewsStatistics> {
        let collections = self.collections.read().await;
        let mut per_source: BTreeMap<&str, SourceStatistics> = BTreeMap::new();
        for collection in collections.iter() {
            let entry = per_source
                .entry(collection.source_url.as_str())
                .or_insert_with(|| SourceStatistics {
                    source_url: collection.source_url.clone(),
                    collections: 0,
                    items: 0,
                    last_parsed_at: None,
                });
            entry.collections += 1;
            entry.items += collection.total_items();
            entry.last_parsed_at = entry.last_parsed_at.max(Some(collection.parsed_at));
        }

        Ok(NewsStatistics {
            total_collections: collections.len(),
            total_items: collections.iter().map(NewsCollection::total_items).sum(),
            sources: per_source.into_values().collect(),
        })
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let before = collections.len();
        collections.retain(|c| c.parsed_at >= cutoff);
        Ok(before - collections.len())
    }
}

#[async_trait]
impl ProductStorage for InMemoryStorage {
    async fn save_product(&self, product: &Product) -> Result<SaveOutcome> {
        let mut products = self.products.write().await;
        match products.insert(product.url.clone(), product.clone()) {
            Some(_) => Ok(SaveOutcome::Replaced),
            None => Ok(SaveOutcome::Inserted),
        }
    }

    async fn get_product(&self, url: &str) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(url).cloned())
    }
}
