use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use np_core::Config;
use np_scrapers::ScraperManager;
use np_storage::{create_storage, Stores};
use np_web::{create_app, AppState};

fn app(api_keys: &[&str]) -> Router {
    let config = Config::default();
    let Stores { news, products } = create_storage(&config.storage).unwrap();
    let manager = ScraperManager::new(config, news, products).unwrap();
    create_app(AppState::new(
        Arc::new(manager),
        api_keys.iter().map(|k| k.to_string()),
    ))
}

async fn get(app: Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_is_public() {
    let (status, body) = get(app(&["secret"]), "/health", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_api_key_is_required_when_configured() {
    let (status, body) = get(app(&["secret"]), "/api/v1/news/stats", &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_type"], "AuthenticationError");
    assert_eq!(body["status_code"], 401);
    assert!(body["timestamp"].is_string());

    let (status, _) = get(app(&["secret"]), "/api/v1/news/stats", &[("Authorization", "Bearer wrong")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = get(app(&["secret"]), "/api/v1/news/stats", &[("Authorization", "Bearer secret")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCollections"], 0);

    let (status, _) = get(app(&["secret"]), "/api/v1/news/stats", &[("X-API-Key", "secret")]).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_parse_rejects_bad_input() {
    let (status, body) = get(app(&[]), "/api/v1/news/parse?url=http://epravda.com.ua/news/", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "InvalidUrl");

    let (status, body) = get(app(&[]), "/api/v1/news/parse?url=https://example.com/news", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "UnsupportedSource");

    let (status, body) = get(
        app(&[]),
        "/api/v1/news/parse?url=https://epravda.com.ua/news/&until_date=2999-01-01",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "ValidationError");

    let (status, _) = get(
        app(&[]),
        "/api/v1/news/parse?url=https://epravda.com.ua/news/&client=curl",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(app(&[]), "/api/v1/news/parse", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
}

#[tokio::test]
async fn test_offers_validate_limits() {
    let (status, body) = get(
        app(&[]),
        "/api/v1/products/offers?url=https://hotline.ua/ua/mobile-apple-iphone-15/&timeout_limit=2",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("timeout_limit"));

    let (status, _) = get(
        app(&[]),
        "/api/v1/products/offers?url=https://hotline.ua/ua/mobile-apple-iphone-15/&count_limit=5000",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(
        app(&[]),
        "/api/v1/products/offers?url=https://hotline.ua/ua/mobile-apple-iphone-15/&sort_by=rating",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lookups_on_empty_store() {
    let (status, body) = get(app(&[]), "/api/v1/news/source?source=https://epravda.com.ua/news/", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_found");
    assert_eq!(body["totalItems"], 0);

    let (status, body) = get(app(&[]), "/api/v1/news/search?q=%D0%B1%D1%8E%D0%B4%D0%B6%D0%B5%D1%82&limit=10", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_found");

    let (status, _) = get(app(&[]), "/api/v1/news/search?q=budget&limit=500", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(
        app(&[]),
        "/api/v1/news/range?start=2025-08-28&end=2025-08-27",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "ValidationError");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (status, body) = get(app(&[]), "/api/v1/unknown", &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], "NotFound");
}
