//! Runtime configuration.
//!
//! Every section has defaults; a JSON file may override any subset of fields
//! and the CLI overrides the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    pub pipeline: PipelineConfig,
    pub product: ProductConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_secs: u64,
    pub redirect_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            accept_language: "uk-UA,uk;q=0.9,en;q=0.8,ru;q=0.7".to_string(),
            timeout_secs: 30,
            redirect_timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn redirect_timeout(&self) -> Duration {
        Duration::from_secs(self.redirect_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Remote headless-browser service used by the browser fetch strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub settle_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            settle_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub page_concurrency: usize,
    pub article_concurrency: usize,
    pub article_batch_size: usize,
    /// Upper bound on listing pages generated by a date sweep.
    pub max_listing_pages: usize,
    /// Zero disables the overall deadline.
    pub parse_deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_concurrency: 5,
            article_concurrency: 10,
            article_batch_size: 20,
            max_listing_pages: 31,
            parse_deadline_secs: 600,
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.parse_deadline_secs > 0).then(|| Duration::from_secs(self.parse_deadline_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    pub base_url: String,
    pub graphql_path: String,
    pub redirect_concurrency: usize,
    pub default_count_limit: usize,
    pub city_id: u32,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hotline.ua".to_string(),
            graphql_path: "/svc/frontend-api/graphql".to_string(),
            redirect_concurrency: 10,
            default_count_limit: 1000,
            city_id: 370,
        }
    }
}

impl ProductConfig {
    pub fn graphql_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.graphql_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty disables authentication.
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: String,
    pub news_replace_window_secs: i64,
    pub retention_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            news_replace_window_secs: 3600,
            retention_days: 30,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("pipeline.page_concurrency", self.pipeline.page_concurrency),
            ("pipeline.article_concurrency", self.pipeline.article_concurrency),
            ("pipeline.article_batch_size", self.pipeline.article_batch_size),
            ("pipeline.max_listing_pages", self.pipeline.max_listing_pages),
            ("product.redirect_concurrency", self.product.redirect_concurrency),
            ("product.default_count_limit", self.product.default_count_limit),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Validation(format!("{} must be greater than zero", name)));
            }
        }
        if !(5..=300).contains(&self.http.timeout_secs) {
            return Err(Error::Validation(
                "http.timeout_secs must be between 5 and 300".to_string(),
            ));
        }
        if self.http.redirect_timeout_secs == 0 {
            return Err(Error::Validation(
                "http.redirect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.storage.news_replace_window_secs < 0 || self.storage.retention_days < 0 {
            return Err(Error::Validation(
                "storage windows cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.page_concurrency, 5);
        assert_eq!(config.pipeline.article_concurrency, 10);
        assert_eq!(config.pipeline.article_batch_size, 20);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.product.graphql_url(), "https://hotline.ua/svc/frontend-api/graphql");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"pipeline": {"page_concurrency": 2}, "server": {"port": 9000}}"#).unwrap();
        assert_eq!(config.pipeline.page_concurrency, 2);
        assert_eq!(config.pipeline.article_concurrency, 10);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.pipeline.article_concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_timeout_out_of_range() {
        let mut config = Config::default();
        config.http.timeout_secs = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadline_disabled_by_zero() {
        let mut pipeline = PipelineConfig::default();
        assert_eq!(pipeline.deadline(), Some(Duration::from_secs(600)));
        pipeline.parse_deadline_secs = 0;
        assert_eq!(pipeline.deadline(), None);
    }
}
