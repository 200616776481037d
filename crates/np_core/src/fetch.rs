use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::types::FetchStrategy;

/// Retrieves page markup.
///
/// Implementations never panic on remote errors; every failure is reported as
/// a [`FetchFailure`] so the caller can fall back or record it.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        strategy: FetchStrategy,
        timeout: Duration,
    ) -> std::result::Result<String, FetchFailure>;
}
