use chrono::{DateTime, Utc};
use np_core::text::normalize_url;
use np_core::{ArticleRecord, ArticleStub, Error, Result};
use scraper::Html;

use crate::dates::{combine_page_date_and_time, page_date_from_url};
use crate::scrapers::extract::{extract_article, ArticleLayout};
use crate::scrapers::{date_sweep, utils, ListingPage, NewsSource, Pagination};

const LAYOUT: ArticleLayout = ArticleLayout {
    root: "div.post_news, article.post, div.post",
    title: "h1.post_news_title, h1.post_title, h1",
    author: ".post_news_author, .post_author",
    body: ".post_news_text, .post_text",
    ad_classes: &["banner", "adv", "promo", "read_also"],
    hero_image: ".post_news_photo img, .post_photo img",
    published: Some("time, .post_news_date, .post_time"),
    views: Some(".post_news_views, .post_views"),
    tags: ".post_news_tags a, .post_tags a",
    likes: None,
    dislikes: None,
    comments: None,
};

/// Economic news from Економічна правда.
#[derive(Debug, Clone, Default)]
pub struct EpravdaSource;

impl EpravdaSource {
    pub fn new() -> Self {
        Self
    }

    const BASE_URL: &'static str = "https://epravda.com.ua";
    const NEWS_URL: &'static str = "https://epravda.com.ua/news";
    const MIN_TITLE_CHARS: usize = 10;
}

impl NewsSource for EpravdaSource {
    fn name(&self) -> &'static str {
        "epravda"
    }

    fn domain(&self) -> &'static str {
        "epravda.com.ua"
    }

    fn default_url(&self) -> &'static str {
        "https://epravda.com.ua/news/"
    }

    fn pagination(&self) -> Pagination {
        Pagination::DateSweep
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["epravda", "ep"]
    }

    fn listing_urls_for(
        &self,
        _source_url: &str,
        boundary: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        max_pages: usize,
    ) -> Vec<ListingPage> {
        date_sweep(Self::NEWS_URL, boundary, now, max_pages)
    }

    fn extract_stubs(&self, markup: &str, page: &ListingPage, now: DateTime<Utc>) -> Result<Vec<ArticleStub>> {
        let document = Html::parse_document(markup);
        let container = utils::document_first(&document, "div.section_articles_grid_wrapper")
            .ok_or_else(|| Error::Scraping(format!("news container not found on {}", page.url)))?;
        let items = utils::parse_selector("div.article_news")?;
        let page_date = page.page_date.or_else(|| page_date_from_url(&page.url));

        let mut stubs = Vec::new();
        for item in container.select(&items) {
            let Some(link) = utils::select_first(&item, ".article_title a") else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let title = utils::element_text(&link);
            if title.chars().count() <= Self::MIN_TITLE_CHARS {
                continue;
            }
            let time = utils::extract_text(&item, ".article_date");
            stubs.push(ArticleStub {
                title,
                url: normalize_url(href, Self::BASE_URL),
                timestamp: Some(combine_page_date_and_time(page_date, time.as_deref(), now)),
            });
        }
        Ok(stubs)
    }

    fn extract_full_record(&self, markup: &str, article_url: &str, now: DateTime<Utc>) -> Option<ArticleRecord> {
        extract_article(markup, &LAYOUT, article_url, now)
    }
}
