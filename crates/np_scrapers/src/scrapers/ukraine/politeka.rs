use chrono::{DateTime, Utc};
use np_core::text::normalize_url;
use np_core::{ArticleRecord, ArticleStub, Error, Result};
use scraper::{ElementRef, Html};

use crate::dates::parse_any_date;
use crate::scrapers::extract::{extract_article, ArticleLayout};
use crate::scrapers::{page_sweep, utils, ListingPage, NewsSource, Pagination};

const LAYOUT: ArticleLayout = ArticleLayout {
    root: "div.b_article, article, div.col-lg-8",
    title: "h1",
    author: ".b_article--author, .author",
    body: ".b_article-text, .b_article--text, .article-content",
    ad_classes: &["banner", "adv", "b_ad", "read-also"],
    hero_image: ".b_article--image img, .b_article-image img",
    published: Some(".b_article--date, time"),
    views: Some(".b_article--views, .views"),
    tags: ".b_article--tags a, .tags a",
    likes: Some(".b_rating--like"),
    dislikes: Some(".b_rating--dislike"),
    comments: Some(".b_comment--text"),
};

/// Title link candidates, most specific first.
const TITLE_LINKS: &[&str] = &[".b_post--title a", ".b_post--media a", "a.b_post--image"];

/// Politeka news feed, paginated with `?page=N`.
#[derive(Debug, Clone, Default)]
pub struct PolitekaSource;

impl PolitekaSource {
    pub fn new() -> Self {
        Self
    }

    const BASE_URL: &'static str = "https://politeka.net";
    const MAX_PAGES: usize = 10;
    const MIN_TITLE_CHARS: usize = 5;

    fn title_of(link: &ElementRef) -> String {
        let text = utils::element_text(link);
        if !text.is_empty() {
            return text;
        }
        link.value()
            .attr("title")
            .map(str::to_string)
            .or_else(|| utils::select_first(link, "img").and_then(|img| img.value().attr("alt").map(str::to_string)))
            .map(|t| np_core::text::clean_text(&t))
            .unwrap_or_default()
    }
}

impl NewsSource for PolitekaSource {
    fn name(&self) -> &'static str {
        "politeka"
    }

    fn domain(&self) -> &'static str {
        "politeka.net"
    }

    fn default_url(&self) -> &'static str {
        "https://politeka.net/uk/newsfeed"
    }

    fn pagination(&self) -> Pagination {
        Pagination::PageSweep {
            max_pages: Self::MAX_PAGES,
        }
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["politeka"]
    }

    fn listing_urls_for(
        &self,
        source_url: &str,
        _boundary: Option<DateTime<Utc>>,
        _now: DateTime<Utc>,
        max_pages: usize,
    ) -> Vec<ListingPage> {
        page_sweep(source_url, max_pages.min(Self::MAX_PAGES))
    }

    fn extract_stubs(&self, markup: &str, page: &ListingPage, now: DateTime<Utc>) -> Result<Vec<ArticleStub>> {
        let document = Html::parse_document(markup);
        let container = utils::document_first(&document, "div.col-lg-8.col-md-12")
            .ok_or_else(|| Error::Scraping(format!("news container not found on {}", page.url)))?;
        let items = utils::parse_selector("div.b_post")?;

        let mut stubs = Vec::new();
        for item in container.select(&items) {
            let link = TITLE_LINKS
                .iter()
                .filter_map(|selector| utils::select_first(&item, selector))
                .find(|link| link.value().attr("href").is_some());
            let Some(link) = link else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };

            let mut title = Self::title_of(&link);
            if title.chars().count() <= Self::MIN_TITLE_CHARS {
                // the image link often carries no text; fall back to any titled link
                title = TITLE_LINKS
                    .iter()
                    .filter_map(|selector| utils::select_first(&item, selector))
                    .map(|l| Self::title_of(&l))
                    .find(|t| t.chars().count() > Self::MIN_TITLE_CHARS)
                    .unwrap_or_default();
            }
            if title.is_empty() {
                continue;
            }

            let timestamp = utils::extract_text(&item, ".b_post--date")
                .map(|text| parse_any_date(&text, now).unwrap_or(now));

            stubs.push(ArticleStub {
                title,
                url: normalize_url(href, Self::BASE_URL),
                timestamp,
            });
        }
        Ok(stubs)
    }

    fn extract_full_record(&self, markup: &str, article_url: &str, now: DateTime<Utc>) -> Option<ArticleRecord> {
        extract_article(markup, &LAYOUT, article_url, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LISTING: &str = r#"
        <html><body>
        <div class="col-lg-8 col-md-12">
            <div class="b_post b_post--image-sm">
                <a class="b_post--image" href="/uk/newsfeed/1001-podatky"><img alt="Податки зростуть"></a>
                <div class="b_post--media"><a href="/uk/newsfeed/1001-podatky">Податки для ФОП зростуть з вересня</a></div>
                <div class="b_post--date">13:37 28.08</div>
            </div>
            <div class="b_post b_post--image-sm">
                <a class="b_post--image" href="https://politeka.net/uk/newsfeed/1002-pensii" title="Пенсії перерахують у жовтні"></a>
                <div class="b_post--date">вчора, 09:15</div>
            </div>
            <div class="b_post b_post--image-sm">
                <div class="b_post--media"><a href="/uk/newsfeed/1003">Без дати публікації</a></div>
            </div>
            <div class="b_post b_post--image-sm">
                <div class="b_post--media"><a href="/uk/newsfeed/1004">Невідома дата</a></div>
                <div class="b_post--date">колись давно</div>
            </div>
        </div>
        </body></html>
    "#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 29, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_listing_urls() {
        let source = PolitekaSource::new();
        let pages = source.listing_urls_for("https://politeka.net/uk/newsfeed", None, now(), 31);
        assert_eq!(pages.len(), 10);
        assert_eq!(pages[0].url, "https://politeka.net/uk/newsfeed");
        assert_eq!(pages[9].url, "https://politeka.net/uk/newsfeed?page=10");
    }

    #[test]
    fn test_extract_stubs() {
        let page = ListingPage::new("https://politeka.net/uk/newsfeed");
        let stubs = PolitekaSource::new().extract_stubs(LISTING, &page, now()).unwrap();
        assert_eq!(stubs.len(), 4);

        assert_eq!(stubs[0].url, "https://politeka.net/uk/newsfeed/1001-podatky");
        assert_eq!(stubs[0].title, "Податки для ФОП зростуть з вересня");
        assert_eq!(stubs[0].timestamp, Some(Utc.with_ymd_and_hms(2025, 8, 28, 13, 37, 0).unwrap()));

        assert_eq!(stubs[1].title, "Пенсії перерахують у жовтні");
        assert_eq!(stubs[1].timestamp, Some(Utc.with_ymd_and_hms(2025, 8, 28, 9, 15, 0).unwrap()));

        assert_eq!(stubs[2].timestamp, None);
        assert_eq!(stubs[3].timestamp, Some(now()));
    }
}
