//! Progress callbacks for long-running controllers.

/// Progress callback for reporting crawl and fetch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a listing page arrives.
    fn page_fetched(&self, offset: u32, entries: usize);
    /// Called after each submission of a collection is handled.
    fn item_processed(&self, url: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _offset: u32, _entries: usize) {}
    fn item_processed(&self, _url: &str, _current: usize, _total: usize) {}
}
