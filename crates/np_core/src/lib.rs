pub mod config;
pub mod error;
pub mod fetch;
pub mod storage;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::{Error, FetchFailure};
pub use fetch::ContentFetcher;
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
