use chrono::{DateTime, Utc};
use np_core::text::{normalize_url, same_site};
use np_core::{ArticleRecord, ArticleStub, Error, Result};
use scraper::Html;

use crate::dates::{combine_page_date_and_time, page_date_from_url};
use crate::scrapers::extract::{extract_article, ArticleLayout};
use crate::scrapers::{date_sweep, utils, ListingPage, NewsSource, Pagination};

const LAYOUT: ArticleLayout = ArticleLayout {
    root: "div.post, article.post, div.post_news",
    title: "h1.post_title, h1",
    author: ".post_author, .article_author",
    body: ".post_text",
    ad_classes: &["banner", "adv", "promo", "read_also"],
    hero_image: ".post_photo img, .post_img img",
    published: Some("time, .post_time"),
    views: Some(".post_views"),
    tags: ".post_tags a",
    likes: None,
    dislikes: None,
    comments: None,
};

/// Українська правда. Articles from its subdomains (life, eurointegration)
/// count as the same site.
#[derive(Debug, Clone, Default)]
pub struct PravdaSource;

impl PravdaSource {
    pub fn new() -> Self {
        Self
    }

    const BASE_URL: &'static str = "https://www.pravda.com.ua";
    const NEWS_URL: &'static str = "https://www.pravda.com.ua/news";
    const MIN_TITLE_CHARS: usize = 5;
}

impl NewsSource for PravdaSource {
    fn name(&self) -> &'static str {
        "pravda"
    }

    fn domain(&self) -> &'static str {
        "pravda.com.ua"
    }

    fn default_url(&self) -> &'static str {
        "https://www.pravda.com.ua/news/"
    }

    fn pagination(&self) -> Pagination {
        Pagination::DateSweep
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["pravda", "up"]
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
        let container = utils::document_first(&document, "div.container_sub_news_list_wrapper")
            .ok_or_else(|| Error::Scraping(format!("news container not found on {}", page.url)))?;
        let items = utils::parse_selector("div.article_news_list")?;
        let page_date = page.page_date.or_else(|| page_date_from_url(&page.url));

        let mut stubs = Vec::new();
        for item in container.select(&items) {
            let link = utils::select_first(&item, ".article_title a")
                .or_else(|| utils::select_first(&item, ".article_content a"));
            let Some(link) = link else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let title = utils::element_text(&link);
            if title.chars().count() <= Self::MIN_TITLE_CHARS {
                continue;
            }
            let time = utils::extract_text(&item, ".article_time");
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

    fn should_fetch_full_record(&self, source_url: &str, article_url: &str) -> bool {
        same_site(source_url, article_url, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    const LISTING: &str = r#"
        <html><body>
        <div class="container_sub_news_list_wrapper mode1">
            <div class="article_news_list">
                <div class="article_time">14:48</div>
                <div class="article_content"><a href="/news/2025/08/28/7528000/">Зеленський провів нараду зі Ставкою</a></div>
            </div>
            <div class="article_news_list">
                <div class="article_time">14:10</div>
                <div class="article_title"><a href="https://life.pravda.com.ua/society/2025/08/28/300100/">Як змінилося життя у Києві</a></div>
            </div>
            <div class="article_news_list">
                <div class="article_content"><a href="/news/x/">Коро</a></div>
            </div>
        </div>
        </body></html>
    "#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 29, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_stubs_with_fallback_link() {
        let page = ListingPage {
            url: "https://www.pravda.com.ua/news/date_28082025/".to_string(),
            page_date: NaiveDate::from_ymd_opt(2025, 8, 28),
        };
        let stubs = PravdaSource::new().extract_stubs(LISTING, &page, now()).unwrap();
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].url, "https://www.pravda.com.ua/news/2025/08/28/7528000/");
        assert_eq!(stubs[0].timestamp, Some(Utc.with_ymd_and_hms(2025, 8, 28, 14, 48, 0).unwrap()));
        assert_eq!(stubs[1].url, "https://life.pravda.com.ua/society/2025/08/28/300100/");
    }

    #[test]
    fn test_page_date_recovered_from_url() {
        let page = ListingPage::new("https://www.pravda.com.ua/news/date_27082025/");
        let stubs = PravdaSource::new().extract_stubs(LISTING, &page, now()).unwrap();
        assert_eq!(stubs[0].timestamp, Some(Utc.with_ymd_and_hms(2025, 8, 27, 14, 48, 0).unwrap()));
    }

    #[test]
    fn test_subdomains_are_fetched_in_full() {
        let source = PravdaSource::new();
        let listing = "https://www.pravda.com.ua/news/";
        assert!(source.should_fetch_full_record(listing, "https://life.pravda.com.ua/society/1/"));
        assert!(source.should_fetch_full_record(listing, "https://www.pravda.com.ua/news/1/"));
        assert!(!source.should_fetch_full_record(listing, "https://www.epravda.com.ua/news/1/"));
    }
}
