//! Crawl controllers and domain logic for paperfeed.
//!
//! This crate ties the source adapters to the record store: the windowed
//! crawl ([`crawl_window`]) for date-sorted listings, the on-demand fetch
//! ([`fetch_collection`]) for finite collections, and the flat-text ledger
//! used to exchange papers with other tools.

pub mod filter;
pub mod ledger;
pub mod on_demand;
pub mod progress;
pub mod window;

#[cfg(test)]
mod testing;

pub use filter::{in_interest_set, should_skip};
pub use ledger::export_date;
pub use on_demand::{FetchReport, fetch_collection};
pub use progress::{ProgressReporter, SilentProgress};
pub use window::{CrawlReport, crawl_window};
