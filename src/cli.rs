//! Command line entry point: `page <id>` and `search <term>`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::scraping::{CancelSignal, CookieSet, Scraper, ScraperConfig};

/// Scrape thread metadata and search results.
#[derive(Parser, Debug)]
#[command(name = "thread-scraper")]
#[command(about = "Scrapes thread metadata and search results")]
#[command(version)]
pub struct Args {
    /// JSON config file; missing keys take their defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file with the login cookies
    #[arg(short = 'k', long)]
    pub cookies: Option<PathBuf>,

    /// WebDriver endpoint for the bypass renderer (overrides `WEBDRIVER_URL`)
    #[arg(long)]
    pub webdriver: Option<String>,

    /// Run the bypass renderer without a visible window
    #[arg(long)]
    pub headless: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Scraper operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape one thread page by id
    Page {
        /// Thread id
        id: String,
    },
    /// Search threads by name
    Search {
        /// Search term
        term: String,
    },
}

/// Parse arguments, run the requested operation and print JSON to stdout.
///
/// # Returns
/// `ExitCode::SUCCESS` when the operation completed, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match rt.block_on(execute(args)) {
        Ok(json) => {
            #[allow(clippy::print_stdout)]
            {
                println!("{json}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn execute(args: Args) -> anyhow::Result<String> {
    let config = load_config(&args)?;
    let cookies = match &args.cookies {
        Some(path) => CookieSet::from_file(path)
            .with_context(|| format!("failed to load cookies from {}", path.display()))?,
        None => {
            tracing::warn!("No cookies given; protected pages will require a login");
            CookieSet::new()
        }
    };

    let scraper = Scraper::with_defaults(config, cookies)?;

    let (handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            handle.cancel();
        }
    });

    let json = match &args.command {
        Command::Page { id } => {
            let page = scraper.fetch_page(id, &cancel).await?;
            serde_json::to_string_pretty(&page)?
        }
        Command::Search { term } => {
            let results = scraper.search(term, &cancel).await?;
            serde_json::to_string_pretty(&results)?
        }
    };
    Ok(json)
}

fn load_config(args: &Args) -> anyhow::Result<ScraperConfig> {
    let mut config = match &args.config {
        Some(path) => ScraperConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ScraperConfig::new(),
    }
    .with_env_overrides();

    if let Some(webdriver) = &args.webdriver {
        config = config.with_webdriver_url(webdriver.clone());
    }
    if args.headless {
        config.renderer.headless = true;
    }

    config.validate()?;
    Ok(config)
}
