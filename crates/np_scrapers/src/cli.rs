use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};
use tracing::{error, info};

use np_core::{Error, FetchStrategy, NewsCollection, NewsRequest, ParseStatus, ProductRequest, Result, SortBy};

use crate::dates::parse_until;
use crate::manager::ScraperManager;

/// Interval such as `30m`, `1h15m` or `90` (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total = 0u64;
        let mut digits = String::new();
        let mut seen_number = false;

        for c in s.trim().chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let value: u64 = digits
                .parse()
                .map_err(|_| format!("expected a number before '{}'", c))?;
            let unit: u64 = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(format!("unknown duration unit '{}'", c)),
            };
            total = value
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| format!("duration '{}' is too large", s.trim()))?;
            digits.clear();
            seen_number = true;
        }
        if !digits.is_empty() {
            let secs = digits.parse::<u64>().map_err(|e| e.to_string())?;
            total = total
                .checked_add(secs)
                .ok_or_else(|| format!("duration '{}' is too large", s.trim()))?;
            seen_number = true;
        }

        if !seen_number || total == 0 {
            return Err("duration must be a positive number with an optional s/m/h/d unit".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScraperArgs {
    #[command(subcommand)]
    pub command: ScraperCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScraperCommands {
    /// Parse a news source by URL or short name (e.g. epravda, up, politeka)
    News {
        source: String,
        /// Oldest publication date to keep (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        until: Option<String>,
        /// Fetch strategy: http or browser
        #[arg(long, default_value = "http")]
        client: FetchStrategy,
        /// Re-run periodically with the given interval (e.g. 30m, 1h)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Fetch shop offers for a hotline.ua product page
    Product {
        url: String,
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        #[arg(long, default_value_t = 1000)]
        count: usize,
        /// price, price_desc, shop or shop_desc
        #[arg(long, default_value = "price")]
        sort: SortBy,
    },
    /// List supported news sources
    List,
    /// Delete stored news older than the retention period
    Cleanup {
        #[arg(long)]
        days: Option<i64>,
    },
}

pub async fn handle_command(args: ScraperArgs, manager: &ScraperManager) -> Result<()> {
    match args.command {
        ScraperCommands::News {
            source,
            until,
            client,
            interval,
        } => {
            let source_url = resolve_source_url(manager, &source);
            let mut request = NewsRequest::new(source_url).strategy(client);
            if let Some(until) = until {
                request = request.until(parse_until(&until)?);
            }

            match interval {
                Some(HumanDuration(every)) => {
                    info!(every_secs = every.as_secs(), "running in periodic mode");
                    loop {
                        if let Err(e) = run_news(manager, &request).await {
                            error!(error = %e, "news parse failed");
                        }
                        info!("waiting {}s before the next parse", every.as_secs());
                        tokio::time::sleep(every).await;
                    }
                }
                None => run_news(manager, &request).await,
            }
        }
        ScraperCommands::Product {
            url,
            timeout,
            count,
            sort,
        } => {
            let request = ProductRequest {
                url,
                timeout_secs: timeout,
                count_limit: count,
                sort_by: sort,
            };
            let product = manager.parse_product(&request).await?;
            println!("🛒 {} offers for {}", product.total_offers(), product.url);
            for offer in product.offers() {
                let condition = if offer.is_used { " (used)" } else { "" };
                println!("  {:>10.2}  {}{} - {}", offer.price, offer.shop, condition, offer.original_url);
            }
            Ok(())
        }
        ScraperCommands::List => {
            println!("Available sources:");
            for source in manager.registry().sources() {
                println!(
                    "  {:<10} {:<16} {} [{}]",
                    source.name(),
                    source.domain(),
                    source.default_url(),
                    source.cli_names().join(", ")
                );
            }
            Ok(())
        }
        ScraperCommands::Cleanup { days } => {
            let days = days.unwrap_or(manager.config().storage.retention_days);
            if days < 0 {
                return Err(Error::Validation("retention days cannot be negative".to_string()));
            }
            let removed = manager.cleanup(chrono::Duration::days(days)).await?;
            println!("🧹 removed {} collections older than {} days", removed, days);
            Ok(())
        }
    }
}

/// Short source names map to the source's default listing URL.
fn resolve_source_url(manager: &ScraperManager, source: &str) -> String {
    match manager.registry().by_cli_name(&source.to_lowercase()) {
        Some(found) => found.default_url().to_string(),
        None => source.to_string(),
    }
}

async fn run_news(manager: &ScraperManager, request: &NewsRequest) -> Result<()> {
    let collection = manager.parse_news(request).await?;
    print_collection(&collection);
    Ok(())
}

fn print_collection(collection: &NewsCollection) {
    let emoji = match collection.status {
        ParseStatus::Success => "✅",
        ParseStatus::Partial => "⚠️",
        ParseStatus::NoData | ParseStatus::NotFound => "📭",
        ParseStatus::Failed | ParseStatus::Error => "❌",
    };
    println!(
        "{} {}: {} items from {}",
        emoji,
        collection.status,
        collection.total_items(),
        collection.source_url
    );
    if let Some(message) = &collection.error_message {
        println!("   {}", message);
    }
    for item in collection.items() {
        let published = item
            .record
            .published_at
            .map(|p| p.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "--".to_string());
        println!("📰 {} {} - {}", published, item.record.title, item.article_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use np_core::Config;
    use np_storage::InMemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_human_duration() {
        assert_eq!("90".parse::<HumanDuration>().unwrap().0, Duration::from_secs(90));
        assert_eq!("1h15m30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4530));
        assert_eq!("2d".parse::<HumanDuration>().unwrap().0, Duration::from_secs(172_800));
        assert!("1w".parse::<HumanDuration>().is_err());
        assert!("h".parse::<HumanDuration>().is_err());
        assert!("0s".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_human_duration_overflow_is_an_error() {
        let err = "999999999999999d".parse::<HumanDuration>().unwrap_err();
        assert!(err.contains("too large"));
        assert!("18446744073709551615s1s".parse::<HumanDuration>().is_err());
        assert!("18446744073709551615s1".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_resolve_source_url() {
        let store = Arc::new(InMemoryStorage::default());
        let manager =
            ScraperManager::with_fetcher(Config::default(), Arc::new(ScriptedFetcher::new()), store.clone(), store)
                .unwrap();

        assert_eq!(resolve_source_url(&manager, "UP"), "https://www.pravda.com.ua/news/");
        assert_eq!(resolve_source_url(&manager, "politeka"), "https://politeka.net/uk/newsfeed");
        assert_eq!(
            resolve_source_url(&manager, "https://epravda.com.ua/news/"),
            "https://epravda.com.ua/news/"
        );
    }
}
