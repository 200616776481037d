use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use np_core::{Config, Result};
use np_scrapers::{handle_command, init_logging, ScraperArgs, ScraperCommands, ScraperManager};
use np_storage::{create_storage, Stores};
use np_web::AppState;

#[derive(Parser, Debug)]
#[command(name = "np", author, version, about = "Ukrainian news and price parser", long_about = None)]
struct Cli {
    /// JSON configuration file; missing keys keep their defaults
    #[arg(long, env = "NP_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Log filter in RUST_LOG syntax (e.g. info,np_scrapers=debug)
    #[arg(long, env = "NP_LOG", global = true)]
    log: Option<String>,
    /// Emit logs as JSON lines
    #[arg(long, env = "NP_LOG_JSON", global = true)]
    log_json: bool,
    /// Base URL of the headless browser service used by `--client browser`
    #[arg(long, env = "NP_BROWSER_ENDPOINT", global = true)]
    browser_endpoint: Option<String>,
    #[arg(long, env = "NP_BROWSER_TOKEN", global = true, hide_env_values = true)]
    browser_token: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, env = "NP_HTTP_TIMEOUT", global = true)]
    http_timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "NP_HOST")]
        host: Option<String>,
        #[arg(long, env = "NP_PORT")]
        port: Option<u16>,
        /// Comma-separated API keys; none disables authentication
        #[arg(long, env = "NP_API_KEYS", value_delimiter = ',', hide_env_values = true)]
        api_keys: Vec<String>,
    },
    #[command(flatten)]
    Scraper(ScraperCommands),
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(endpoint) = &cli.browser_endpoint {
        config.browser.endpoint = Some(endpoint.clone());
    }
    if let Some(token) = &cli.browser_token {
        config.browser.token = Some(token.clone());
    }
    if let Some(timeout) = cli.http_timeout {
        config.http.timeout_secs = timeout;
    }
    if let Commands::Serve { host, port, api_keys } = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        if !api_keys.is_empty() {
            config.server.api_keys = api_keys.clone();
        }
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref(), cli.log_json);

    let config = load_config(&cli)?;
    let Stores { news, products } = create_storage(&config.storage)?;
    info!("💾 storage initialized (using {})", config.storage.backend);

    let manager = ScraperManager::new(config.clone(), news, products)?;
    let domains = manager.registry().supported_domains();
    info!("🦗 sources initialized: {}", domains.join(", "));

    match cli.command {
        Commands::Serve { .. } => {
            let state = AppState::new(Arc::new(manager), config.server.api_keys.clone());
            np_web::serve(state, &config.server.host, config.server.port).await
        }
        Commands::Scraper(command) => handle_command(ScraperArgs { command }, &manager).await,
    }
}
