//! Binary entrypoint for the thread scraper.

use std::process::ExitCode;

use thread_scraper::cli;

/// Scrape a thread page or run a search and print the result as JSON.
fn main() -> ExitCode {
    cli::run()
}
