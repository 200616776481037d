use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use np_core::storage::Page;
use np_core::{Error, FetchStrategy, NewsCollection, NewsRequest, NewsStatistics, Product, ProductRequest, SortBy};
use np_scrapers::dates::parse_until;

use crate::error::ApiError;
use crate::AppState;

pub const MAX_PAGE_LIMIT: usize = 100;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ParseQuery {
    pub url: String,
    pub until_date: Option<String>,
    pub client: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub source: String,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct OffersQuery {
    pub url: String,
    pub timeout_limit: Option<u64>,
    pub count_limit: Option<usize>,
    pub sort_by: Option<String>,
}

fn page(limit: Option<usize>, offset: Option<usize>) -> Result<Page, ApiError> {
    let limit = limit.unwrap_or(MAX_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    Ok(Page::new(limit, offset.unwrap_or(0)))
}

fn require_https(url: &str) -> Result<(), ApiError> {
    if url.trim().to_ascii_lowercase().starts_with("https://") {
        Ok(())
    } else {
        Err(Error::InvalidUrl(format!("{}: expected an https URL", url)).into())
    }
}

/// A plain date as range end covers the whole day.
fn parse_range_end(text: &str) -> Result<DateTime<Utc>, ApiError> {
    match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
        Ok(date) => {
            let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
            Ok(Utc.from_utc_datetime(&date.and_time(last_second)))
        }
        Err(_) => Ok(parse_until(text)?),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": state.manager.registry().supported_domains(),
        "timestamp": Utc::now(),
    }))
}

pub async fn parse_news(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ParseQuery>, QueryRejection>,
) -> ApiResult<NewsCollection> {
    let Query(query) = query?;
    require_https(&query.url)?;
    let strategy: FetchStrategy = non_empty(query.client).as_deref().unwrap_or("http").parse()?;

    let mut request = NewsRequest::new(query.url.trim()).strategy(strategy);
    if let Some(until) = non_empty(query.until_date) {
        request = request.until(parse_until(&until)?);
    }

    info!(url = %request.source_url, until = ?request.until, %strategy, "news parse requested");
    Ok(Json(state.manager.parse_news(&request).await?))
}

pub async fn news_by_source(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SourceQuery>, QueryRejection>,
) -> ApiResult<NewsCollection> {
    let Query(query) = query?;
    let page = page(query.limit, query.offset)?;
    Ok(Json(state.manager.news_by_source(&query.source, page).await?))
}

pub async fn news_by_date_range(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<NewsCollection> {
    let Query(query) = query?;
    let page = page(query.limit, query.offset)?;
    let start = parse_until(&query.start)?;
    let end = parse_range_end(&query.end)?;
    let source = non_empty(query.source);
    Ok(Json(
        state
            .manager
            .news_by_date_range(start, end, source.as_deref(), page)
            .await?,
    ))
}

pub async fn search_news(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<NewsCollection> {
    let Query(query) = query?;
    let page = page(query.limit, query.offset)?;
    let source = non_empty(query.source);
    Ok(Json(state.manager.search_news(&query.q, source.as_deref(), page).await?))
}

pub async fn news_statistics(State(state): State<Arc<AppState>>) -> ApiResult<NewsStatistics> {
    Ok(Json(state.manager.news_statistics().await?))
}

pub async fn product_offers(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OffersQuery>, QueryRejection>,
) -> ApiResult<Product> {
    let Query(query) = query?;
    require_https(&query.url)?;
    let sort_by = match non_empty(query.sort_by) {
        Some(sort) => sort.parse::<SortBy>()?,
        None => SortBy::default(),
    };
    let request = ProductRequest {
        url: query.url.trim().to_string(),
        timeout_secs: query.timeout_limit.unwrap_or(30),
        count_limit: query
            .count_limit
            .unwrap_or(state.manager.config().product.default_count_limit),
        sort_by,
    };
    request.validate()?;

    info!(url = %request.url, sort = ?request.sort_by, "product offers requested");
    Ok(Json(state.manager.parse_product(&request).await?))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("no such endpoint")
}
