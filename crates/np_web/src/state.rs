use std::collections::HashSet;
use std::sync::Arc;

use np_scrapers::ScraperManager;

pub struct AppState {
    pub manager: Arc<ScraperManager>,
    /// Empty disables authentication.
    pub api_keys: HashSet<String>,
}

impl AppState {
    pub fn new(manager: Arc<ScraperManager>, api_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            manager,
            api_keys: api_keys.into_iter().filter(|k| !k.trim().is_empty()).collect(),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }
}
