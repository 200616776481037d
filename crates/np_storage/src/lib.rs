use std::sync::Arc;

use np_core::config::StorageConfig;
use np_core::storage::{NewsStorage, ProductStorage};
use np_core::{Error, Result};

pub mod backends;

pub use backends::*;

/// News and product stores handed to the manager.
#[derive(Clone)]
pub struct Stores {
    pub news: Arc<dyn NewsStorage>,
    pub products: Arc<dyn ProductStorage>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: NewsStorage + ProductStorage + 'static,
    {
        Self {
            news: store.clone(),
            products: store,
        }
    }
}

/// Builds the backend named by `config.backend`.
pub fn create_storage(config: &StorageConfig) -> Result<Stores> {
    match config.backend.as_str() {
        "memory" => Ok(Stores::shared(Arc::new(InMemoryStorage::from_config(config)))),
        other => Err(Error::Validation(format!(
            "unsupported storage backend '{}', expected: memory",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, Stores};
}
