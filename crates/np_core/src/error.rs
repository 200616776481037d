use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Failed to fetch {url}: {failure}")]
    Fetch { url: String, failure: FetchFailure },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn fetch(url: impl Into<String>, failure: FetchFailure) -> Self {
        Error::Fetch {
            url: url.into(),
            failure,
        }
    }

    /// True for errors caused by the caller's input rather than by a remote site
    /// or by this service.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_) | Error::UnsupportedSource(_) | Error::Validation(_)
        )
    }
}

/// Why a single page fetch produced no markup.
///
/// Upstream HTTP status codes are folded into a handful of categories so that
/// callers can decide on retries and logging without inspecting raw codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("access forbidden (403)")]
    Forbidden,

    #[error("rate limited (429)")]
    RateLimited,

    #[error("client error ({0})")]
    ClientError(u16),

    #[error("server error ({0})")]
    ServerError(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("empty response body")]
    Empty,
}

impl FetchFailure {
    pub fn from_status(status: u16) -> Self {
        match status {
            403 => FetchFailure::Forbidden,
            429 => FetchFailure::RateLimited,
            500..=599 => FetchFailure::ServerError(status),
            _ => FetchFailure::ClientError(status),
        }
    }

    /// Failures worth another attempt after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchFailure::Timeout
                | FetchFailure::RateLimited
                | FetchFailure::ServerError(_)
                | FetchFailure::Connection(_)
        )
    }
}

impl From<&reqwest::Error> for FetchFailure {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout
        } else if let Some(status) = err.status() {
            FetchFailure::from_status(status.as_u16())
        } else {
            FetchFailure::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FetchFailure::from_status(403), FetchFailure::Forbidden);
        assert_eq!(FetchFailure::from_status(429), FetchFailure::RateLimited);
        assert_eq!(FetchFailure::from_status(404), FetchFailure::ClientError(404));
        assert_eq!(FetchFailure::from_status(503), FetchFailure::ServerError(503));
    }

    #[test]
    fn test_transient_failures() {
        assert!(FetchFailure::Timeout.is_transient());
        assert!(FetchFailure::ServerError(502).is_transient());
        assert!(!FetchFailure::Forbidden.is_transient());
        assert!(!FetchFailure::ClientError(404).is_transient());
        assert!(!FetchFailure::Empty.is_transient());
    }

    #[test]
    fn test_client_fault() {
        assert!(Error::Validation("bad".into()).is_client_fault());
        assert!(Error::UnsupportedSource("x.com".into()).is_client_fault());
        assert!(!Error::Scraping("boom".into()).is_client_fault());
    }
}
