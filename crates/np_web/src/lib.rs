use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use np_core::Result;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    let api = Router::new()
        .route("/api/v1/news/parse", get(handlers::parse_news))
        .route("/api/v1/news/source", get(handlers::news_by_source))
        .route("/api/v1/news/range", get(handlers::news_by_date_range))
        .route("/api/v1/news/search", get(handlers::search_news))
        .route("/api/v1/news/stats", get(handlers::news_statistics))
        .route("/api/v1/products/offers", get(handlers::product_offers))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let auth = if state.auth_enabled() { "enabled" } else { "disabled" };
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("🌐 listening on http://{}:{} (API key auth {})", host, port, auth);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, ApiError, AppState};
    pub use np_core::{Error, Result};
}
