use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::text::ensure_https;

/// Title given to items whose listing and article pages both lacked one.
pub const UNTITLED: &str = "Untitled";

/// How page markup is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Plain HTTP GET.
    #[default]
    Http,
    /// Headless browser render, for pages that build their DOM with scripts.
    Browser,
}

impl FromStr for FetchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(FetchStrategy::Http),
            "browser" => Ok(FetchStrategy::Browser),
            other => Err(Error::Validation(format!(
                "unknown client '{}', expected 'http' or 'browser'",
                other
            ))),
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Http => write!(f, "http"),
            FetchStrategy::Browser => write!(f, "browser"),
        }
    }
}

/// Lightweight article reference found on a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleStub {
    pub title: String,
    pub url: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Extracted article content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RecordDocument")]
pub struct ArticleRecord {
    pub title: String,
    pub body: String,
    image_urls: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub view_count: Option<u64>,
    pub tags: Vec<String>,
    pub comments: Vec<String>,
    pub like_count: Option<u64>,
    pub dislike_count: Option<u64>,
    video_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    image_urls: Vec<String>,
    published_at: Option<DateTime<Utc>>,
    author: Option<String>,
    view_count: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    comments: Vec<String>,
    like_count: Option<u64>,
    dislike_count: Option<u64>,
    video_url: Option<String>,
}

impl From<RecordDocument> for ArticleRecord {
    fn from(doc: RecordDocument) -> Self {
        let mut record = ArticleRecord {
            title: doc.title,
            body: doc.body,
            published_at: doc.published_at,
            author: doc.author,
            view_count: doc.view_count,
            tags: doc.tags,
            comments: doc.comments,
            like_count: doc.like_count,
            dislike_count: doc.dislike_count,
            ..Default::default()
        };
        for url in &doc.image_urls {
            record.push_image(url);
        }
        if let Some(video) = doc.video_url {
            record.set_video_url(&video);
        }
        record
    }
}

impl ArticleRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Record built from listing data alone.
    pub fn from_stub(stub: &ArticleStub) -> Self {
        Self {
            title: stub.title.clone(),
            published_at: stub.timestamp,
            ..Default::default()
        }
    }

    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    /// Adds an image, upgraded to https. Values that cannot be made absolute
    /// and duplicates are dropped.
    pub fn push_image(&mut self, url: &str) {
        if let Some(url) = ensure_https(url) {
            if !self.image_urls.contains(&url) {
                self.image_urls.push(url);
            }
        }
    }

    pub fn set_video_url(&mut self, url: &str) {
        self.video_url = ensure_https(url);
    }
}

/// An article tied to the listing it was discovered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub source_url: String,
    pub article_url: String,
    pub record: ArticleRecord,
}

impl NewsItem {
    pub fn new(source_url: impl Into<String>, article_url: impl Into<String>, mut record: ArticleRecord) -> Self {
        if record.title.trim().is_empty() {
            record.title = UNTITLED.to_string();
        }
        Self {
            source_url: source_url.into(),
            article_url: article_url.into(),
            record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Success,
    Partial,
    Failed,
    NotFound,
    NoData,
    Error,
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseStatus::Success => "success",
            ParseStatus::Partial => "partial",
            ParseStatus::Failed => "failed",
            ParseStatus::NotFound => "not_found",
            ParseStatus::NoData => "no_data",
            ParseStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of one parse request.
///
/// `total_items` always equals the number of items and article URLs are
/// unique, both enforced at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CollectionDocument")]
pub struct NewsCollection {
    pub source_url: String,
    items: Vec<NewsItem>,
    pub parsed_at: DateTime<Utc>,
    total_items: usize,
    pub status: ParseStatus,
    pub error_message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionDocument {
    source_url: String,
    #[serde(default)]
    items: Vec<NewsItem>,
    parsed_at: DateTime<Utc>,
    status: ParseStatus,
    error_message: Option<String>,
}

impl From<CollectionDocument> for NewsCollection {
    fn from(doc: CollectionDocument) -> Self {
        let mut collection = NewsCollection::new(doc.source_url, doc.items, doc.status);
        collection.parsed_at = doc.parsed_at;
        collection.error_message = doc.error_message;
        collection
    }
}

impl NewsCollection {
    pub fn new(source_url: impl Into<String>, items: Vec<NewsItem>, status: ParseStatus) -> Self {
        let mut seen = HashSet::new();
        let items: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.article_url.clone()))
            .collect();
        Self {
            source_url: source_url.into(),
            total_items: items.len(),
            items,
            parsed_at: Utc::now(),
            status,
            error_message: None,
        }
    }

    pub fn success(source_url: impl Into<String>, items: Vec<NewsItem>) -> Self {
        Self::new(source_url, items, ParseStatus::Success)
    }

    pub fn failed(source_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_url, Vec::new(), ParseStatus::Failed).with_error(message)
    }

    pub fn not_found(source_url: impl Into<String>) -> Self {
        Self::new(source_url, Vec::new(), ParseStatus::NotFound)
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_parsed_at(mut self, parsed_at: DateTime<Utc>) -> Self {
        self.parsed_at = parsed_at;
        self
    }

    pub fn items(&self) -> &[NewsItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<NewsItem> {
        self.items
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A single shop offer for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOffer {
    pub offer_url: String,
    pub original_url: String,
    pub title: String,
    pub shop: String,
    pub price: f64,
    pub is_used: bool,
}

impl ProductOffer {
    /// Price is rounded to two decimals.
    pub fn new(
        offer_url: impl Into<String>,
        original_url: impl Into<String>,
        title: impl Into<String>,
        shop: impl Into<String>,
        price: f64,
        is_used: bool,
    ) -> Self {
        Self {
            offer_url: offer_url.into(),
            original_url: original_url.into(),
            title: title.into(),
            shop: shop.into(),
            price: (price * 100.0).round() / 100.0,
            is_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProductDocument")]
pub struct Product {
    pub url: String,
    offers: Vec<ProductOffer>,
    pub parsed_at: DateTime<Utc>,
    total_offers: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDocument {
    url: String,
    #[serde(default)]
    offers: Vec<ProductOffer>,
    parsed_at: DateTime<Utc>,
}

impl From<ProductDocument> for Product {
    fn from(doc: ProductDocument) -> Self {
        let mut product = Product::new(doc.url, doc.offers);
        product.parsed_at = doc.parsed_at;
        product
    }
}

impl Product {
    pub fn new(url: impl Into<String>, offers: Vec<ProductOffer>) -> Self {
        Self {
            url: url.into(),
            total_offers: offers.len(),
            offers,
            parsed_at: Utc::now(),
        }
    }

    pub fn offers(&self) -> &[ProductOffer] {
        &self.offers
    }

    pub fn total_offers(&self) -> usize {
        self.total_offers
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Price,
    PriceDesc,
    Shop,
    ShopDesc,
}

impl FromStr for SortBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(SortBy::Price),
            "price_desc" => Ok(SortBy::PriceDesc),
            "shop" => Ok(SortBy::Shop),
            "shop_desc" => Ok(SortBy::ShopDesc),
            other => Err(Error::Validation(format!(
                "unknown sort '{}', expected price, price_desc, shop or shop_desc",
                other
            ))),
        }
    }
}

/// Input of a news parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRequest {
    pub source_url: String,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub strategy: FetchStrategy,
}

impl NewsRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            until: None,
            strategy: FetchStrategy::Http,
        }
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Checks the URL shape and that the boundary is not in the future.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let url = url::Url::parse(&self.source_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.source_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::InvalidUrl(format!(
                "{}: expected an http(s) URL with a host",
                self.source_url
            )));
        }
        if let Some(until) = self.until {
            if until > now {
                return Err(Error::Validation(
                    "until date cannot be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Input of a product offer lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub url: String,
    pub timeout_secs: u64,
    pub count_limit: usize,
    #[serde(default)]
    pub sort_by: SortBy,
}

impl ProductRequest {
    pub const MIN_TIMEOUT_SECS: u64 = 5;
    pub const MAX_TIMEOUT_SECS: u64 = 300;
    pub const MAX_COUNT_LIMIT: usize = 1000;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
            count_limit: Self::MAX_COUNT_LIMIT,
            sort_by: SortBy::Price,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(Self::MIN_TIMEOUT_SECS..=Self::MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(Error::Validation(format!(
                "timeout_limit must be between {} and {} seconds",
                Self::MIN_TIMEOUT_SECS,
                Self::MAX_TIMEOUT_SECS
            )));
        }
        if !(1..=Self::MAX_COUNT_LIMIT).contains(&self.count_limit) {
            return Err(Error::Validation(format!(
                "count_limit must be between 1 and {}",
                Self::MAX_COUNT_LIMIT
            )));
        }
        Ok(())
    }
}

/// Per-source aggregate over stored collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatistics {
    pub source_url: String,
    pub collections: usize,
    pub items: usize,
    pub last_parsed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsStatistics {
    pub total_collections: usize,
    pub total_items: usize,
    pub sources: Vec<SourceStatistics>,
}
