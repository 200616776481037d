pub mod cli;
pub mod dates;
pub mod fanout;
pub mod fetcher;
pub mod logging;
pub mod manager;
pub mod pipeline;
pub mod product;
pub mod scrapers;

#[cfg(test)]
mod testing;

pub use cli::{handle_command, HumanDuration, ScraperArgs, ScraperCommands};
pub use fanout::{BoundedFanOut, FaultRecord, Stage, TaskOutcome};
pub use fetcher::{BrowserFetcher, HttpFetcher, RetryingFetcher, StrategyFetcher};
pub use logging::init_logging;
pub use manager::ScraperManager;
pub use pipeline::{NewsPipeline, ParseOutcome, ParseReport};
pub use product::HotlineClient;
pub use scrapers::{NewsSource, SourceRegistry};

pub mod prelude {
    pub use super::scrapers::NewsSource;
    pub use super::ScraperManager;
    pub use np_core::{Error, NewsCollection, NewsRequest, Product, ProductRequest, Result};
}
