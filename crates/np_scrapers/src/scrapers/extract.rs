//! Selector-driven extraction of full article records.
//!
//! Each source describes where things live on its article pages with an
//! [`ArticleLayout`]; the walking and cleanup is shared.

use chrono::{DateTime, Utc};
use np_core::text::{clean_text, first_integer, normalize_url};
use np_core::ArticleRecord;
use scraper::{ElementRef, Html};

use super::utils;
use crate::dates::parse_any_date;

/// Body paragraphs shorter than this are navigation crumbs or captions.
const MIN_FRAGMENT_CHARS: usize = 10;
const FRAGMENTS: &str = "p, li";
const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be", "vimeo.com", "video"];

/// Where each article field lives on a source's article page.
#[derive(Debug, Clone)]
pub struct ArticleLayout {
    /// Container that must exist for the page to count as an article.
    pub root: &'static str,
    pub title: &'static str,
    /// Byline block; the first link inside it wins over its plain text.
    pub author: &'static str,
    pub body: &'static str,
    /// Class fragments marking ad/promo blocks inside the body.
    pub ad_classes: &'static [&'static str],
    pub hero_image: &'static str,
    pub published: Option<&'static str>,
    pub views: Option<&'static str>,
    pub tags: &'static str,
    pub likes: Option<&'static str>,
    pub dislikes: Option<&'static str>,
    pub comments: Option<&'static str>,
}

pub fn extract_article(
    markup: &str,
    layout: &ArticleLayout,
    article_url: &str,
    now: DateTime<Utc>,
) -> Option<ArticleRecord> {
    let document = Html::parse_document(markup);
    let page = document.root_element();
    let root = utils::document_first(&document, layout.root)?;

    let title = utils::extract_text(&root, layout.title)
        .or_else(|| utils::extract_text(&page, "title"))
        .unwrap_or_default();

    let mut record = ArticleRecord::new(title);
    record.body = body_text(&root, layout);
    record.author = author(&page, layout.author);
    record.published_at = layout
        .published
        .and_then(|selector| published_at(&page, selector, now));
    record.view_count = layout.views.and_then(|s| count(&page, s));
    record.like_count = layout.likes.and_then(|s| count(&page, s));
    record.dislike_count = layout.dislikes.and_then(|s| count(&page, s));

    let mut tags = Vec::new();
    for tag in utils::extract_texts(&page, layout.tags) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    record.tags = tags;

    if let Some(selector) = layout.comments {
        record.comments = utils::extract_texts(&page, selector);
    }

    if let Some(src) = hero_image(&page, layout.hero_image) {
        record.push_image(&normalize_url(&src, article_url));
    }
    if let Some(src) = video_embed(&root, layout.body) {
        record.set_video_url(&normalize_url(&src, article_url));
    }

    Some(record)
}

fn has_ad_class(element: &ElementRef, ad_classes: &[&str]) -> bool {
    element
        .value()
        .classes()
        .any(|class| ad_classes.iter().any(|ad| class.contains(ad)))
}

/// Paragraph and list-item text inside the body, skipping ad blocks, nested
/// fragments and crumbs.
fn body_text(root: &ElementRef, layout: &ArticleLayout) -> String {
    let Some(body) = utils::select_first(root, layout.body) else {
        return String::new();
    };
    let Ok(fragments) = utils::parse_selector(FRAGMENTS) else {
        return String::new();
    };

    let mut parts = Vec::new();
    for fragment in body.select(&fragments) {
        if has_ad_class(&fragment, layout.ad_classes) {
            continue;
        }
        let mut skip = false;
        for node in fragment.ancestors() {
            if node.id() == body.id() {
                break;
            }
            if let Some(ancestor) = ElementRef::wrap(node) {
                let name = ancestor.value().name();
                if name == "p" || name == "li" || has_ad_class(&ancestor, layout.ad_classes) {
                    skip = true;
                    break;
                }
            }
        }
        if skip {
            continue;
        }
        let text = utils::element_text(&fragment);
        if text.chars().count() >= MIN_FRAGMENT_CHARS {
            parts.push(text);
        }
    }
    clean_text(&parts.join(" "))
}

fn author(page: &ElementRef, selector: &str) -> Option<String> {
    let byline = utils::select_first(page, selector)?;
    utils::extract_text(&byline, "a")
        .or_else(|| Some(utils::element_text(&byline)))
        .filter(|name| name.chars().count() > 2)
}

fn published_at(page: &ElementRef, selector: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let element = utils::select_first(page, selector)?;
    element
        .value()
        .attr("datetime")
        .or_else(|| element.value().attr("content"))
        .and_then(|value| parse_any_date(value, now))
        .or_else(|| parse_any_date(&utils::element_text(&element), now))
}

fn count(page: &ElementRef, selector: &str) -> Option<u64> {
    utils::extract_text(page, selector).and_then(|text| first_integer(&text))
}

fn hero_image(page: &ElementRef, selector: &str) -> Option<String> {
    utils::select_first(page, selector)
        .and_then(|img| {
            ["src", "data-src", "data-original"]
                .iter()
                .find_map(|attr| img.value().attr(attr))
                .map(str::to_string)
        })
        .or_else(|| {
            utils::select_first(page, "meta[property='og:image']")
                .and_then(|meta| meta.value().attr("content").map(str::to_string))
        })
        .filter(|src| !src.trim().is_empty())
}

fn video_embed(root: &ElementRef, body_selector: &str) -> Option<String> {
    let body = utils::select_first(root, body_selector)?;
    let iframes = utils::parse_selector("iframe").ok()?;
    let src = body
        .select(&iframes)
        .filter_map(|frame| frame.value().attr("src"))
        .find(|src| VIDEO_HOSTS.iter().any(|host| src.contains(host)))?;
    Some(src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LAYOUT: ArticleLayout = ArticleLayout {
        root: "article.post",
        title: "h1",
        author: ".post_author",
        body: ".post_text",
        ad_classes: &["banner", "adv"],
        hero_image: ".post_photo img",
        published: Some("time"),
        views: Some(".post_views"),
        tags: ".post_tags a",
        likes: Some(".likes"),
        dislikes: Some(".dislikes"),
        comments: Some(".comment_text"),
    };

    const ARTICLE: &str = r#"
        <html><head><title>Fallback title</title></head><body>
        <article class="post">
            <h1> Курс гривні   зміцнився </h1>
            <div class="post_author"><a href="/authors/1">Олена Петренко</a>, редакторка</div>
            <time datetime="2025-08-28T13:29:00+03:00">28 серпня 2025, 13:29</time>
            <div class="post_photo"><img data-src="//img.epravda.com.ua/hero.jpg"></div>
            <div class="post_views">Переглядів: 1 502</div>
            <div class="post_text">
                <p>Національний банк підвищив офіційний курс гривні.</p>
                <div class="banner_inline"><p>Підписуйтесь на наш канал у Telegram!</p></div>
                <p>Так.</p>
                <ul><li>Перший пункт переліку новин</li></ul>
                <iframe src="https://www.youtube.com/embed/abc"></iframe>
            </div>
            <div class="post_tags"><a>Економіка</a><a>Валюта</a><a>Економіка</a></div>
            <span class="likes">12</span><span class="dislikes">3</span>
            <div class="comment_text">Гарна новина</div>
        </article>
        </body></html>
    "#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 29, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_full_article() {
        let record = extract_article(ARTICLE, &LAYOUT, "https://epravda.com.ua/news/1", now()).unwrap();
        assert_eq!(record.title, "Курс гривні зміцнився");
        assert_eq!(record.author.as_deref(), Some("Олена Петренко"));
        assert_eq!(
            record.body,
            "Національний банк підвищив офіційний курс гривні. Перший пункт переліку новин"
        );
        assert_eq!(record.published_at, Some(Utc.with_ymd_and_hms(2025, 8, 28, 10, 29, 0).unwrap()));
        assert_eq!(record.image_urls(), &["https://img.epravda.com.ua/hero.jpg".to_string()]);
        assert_eq!(record.view_count, Some(1502));
        assert_eq!(record.tags, vec!["Економіка", "Валюта"]);
        assert_eq!(record.like_count, Some(12));
        assert_eq!(record.dislike_count, Some(3));
        assert_eq!(record.comments, vec!["Гарна новина"]);
        assert_eq!(record.video_url(), Some("https://www.youtube.com/embed/abc"));
    }

    #[test]
    fn test_missing_root_yields_none() {
        let markup = "<html><body><div class='other'>nothing</div></body></html>";
        assert!(extract_article(markup, &LAYOUT, "https://epravda.com.ua/news/1", now()).is_none());
    }

    #[test]
    fn test_title_falls_back_to_document_title() {
        let markup = r#"<html><head><title>Запасний заголовок</title></head>
            <body><article class="post"><div class="post_text"><p>Текст статті достатньої довжини.</p></div></article></body></html>"#;
        let record = extract_article(markup, &LAYOUT, "https://epravda.com.ua/news/1", now()).unwrap();
        assert_eq!(record.title, "Запасний заголовок");
        assert!(record.image_urls().is_empty());
        assert_eq!(record.author, None);
    }
}
