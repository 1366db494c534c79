//! Thread metadata scraper for a single forum site.
//!
//! Fetches thread pages with the user's login cookies, gets past the site's
//! bot protection with a one-shot browser bypass when needed, and extracts
//! name, version, developer, description, labels, tags, rating, images and
//! related links. Also turns a search term into candidate threads.

#![deny(unsafe_code)]
#![deny(non_camel_case_types)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(overflowing_literals)]
#![warn(missing_docs)]

/// Command line interface.
pub mod cli;
/// Fetching, bot-protection handling and extraction.
pub mod scraping;
