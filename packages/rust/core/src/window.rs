//! Windowed crawl: collect one day's entries from a date-sorted listing.
//!
//! The listing is newest first, so the scan walks pages until it meets the
//! first entry dated before the target and stops there. Later-dated entries
//! are passed over; target-date entries go through the category filter, the
//! keyword filter and URL dedup before being staged. One commit at the end.

use std::cmp::Ordering;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use paperfeed_shared::{CrawlPolicy, Paper, PaperfeedError, Result};
use paperfeed_sources::ListingSource;
use paperfeed_storage::PaperStore;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::filter::{in_interest_set, should_skip};
use crate::progress::ProgressReporter;

/// Counters for one windowed crawl. Stored as the run's stats.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub target: NaiveDate,
    pub pages_requested: usize,
    pub entries_seen: usize,
    pub appended: usize,
    pub skipped_category: usize,
    pub skipped_keyword: usize,
    pub skipped_duplicate: usize,
    pub skipped_later: usize,
    pub skipped_malformed: usize,
    /// Papers written by the final commit.
    pub committed: usize,
    /// Whether an earlier-dated entry ended the scan (vs. an empty page).
    pub window_exited: bool,
    pub elapsed_ms: u64,
}

impl CrawlReport {
    fn new(target: NaiveDate) -> Self {
        Self {
            target,
            pages_requested: 0,
            entries_seen: 0,
            appended: 0,
            skipped_category: 0,
            skipped_keyword: 0,
            skipped_duplicate: 0,
            skipped_later: 0,
            skipped_malformed: 0,
            committed: 0,
            window_exited: false,
            elapsed_ms: 0,
        }
    }
}

/// Crawl `source` for entries published on `target` and stage them in `store`.
///
/// A fetch failure aborts the crawl; nothing staged by this run is committed.
#[instrument(skip_all, fields(%target, source = source.name()))]
pub async fn crawl_window<S: ListingSource>(
    source: &S,
    store: &mut PaperStore,
    policy: &CrawlPolicy,
    target: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<CrawlReport> {
    if policy.page_size == 0 {
        return Err(PaperfeedError::validation("page size must be at least 1"));
    }
    if policy.categories.is_empty() {
        warn!("category interest set is empty; no entry will be stored");
    }

    let start = Instant::now();
    let started_at = Utc::now();
    let mut report = CrawlReport::new(target);
    let mut offset = 0u32;

    progress.phase("Scanning listing");

    'pages: loop {
        let page = source.fetch_page(offset, policy.page_size).await?;
        report.pages_requested += 1;
        progress.page_fetched(offset, page.len());

        if page.is_empty() {
            debug!(offset, "listing exhausted");
            break;
        }

        for draft in &page {
            report.entries_seen += 1;

            let paper = match draft.normalize() {
                Ok(paper) => paper,
                Err(e) if e.is_soft_skip() => {
                    warn!(url = %draft.url, error = %e, "skipping entry");
                    report.skipped_malformed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match paper.date_published.cmp(&target) {
                Ordering::Greater => report.skipped_later += 1,
                Ordering::Less => {
                    debug!(url = %paper.url, date = %paper.date_published, "window exited");
                    report.window_exited = true;
                    break 'pages;
                }
                Ordering::Equal => admit(paper, policy, store, &mut report),
            }
        }

        offset = offset.checked_add(policy.page_size).ok_or_else(|| {
            PaperfeedError::validation(format!(
                "listing offset overflowed after {} pages of {}",
                report.pages_requested, policy.page_size
            ))
        })?;
    }

    if report.appended > 0 {
        progress.phase("Committing");
        report.committed = store.commit().await?;
    }
    report.elapsed_ms = start.elapsed().as_millis() as u64;

    if report.committed > 0 {
        record_run(store, started_at, &report).await;
    }

    info!(
        pages = report.pages_requested,
        seen = report.entries_seen,
        appended = report.appended,
        committed = report.committed,
        elapsed_ms = report.elapsed_ms,
        "windowed crawl complete"
    );

    Ok(report)
}

/// Category, then keyword, then dedup.
fn admit(paper: Paper, policy: &CrawlPolicy, store: &mut PaperStore, report: &mut CrawlReport) {
    if !in_interest_set(&paper.category, &policy.categories) {
        debug!(url = %paper.url, category = %paper.category, "outside interest set");
        report.skipped_category += 1;
        return;
    }
    if should_skip(&paper.abstract_text, &policy.exclude_keywords) {
        debug!(url = %paper.url, "excluded by keyword");
        report.skipped_keyword += 1;
        return;
    }
    if store.append(paper) {
        report.appended += 1;
    } else {
        report.skipped_duplicate += 1;
    }
}

/// Run stats are bookkeeping; a failure to save them is only logged.
async fn record_run(store: &PaperStore, started_at: DateTime<Utc>, report: &CrawlReport) {
    let stats = match serde_json::to_string(report) {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "failed to serialize crawl stats");
            return;
        }
    };
    let target = report.target.to_string();
    if let Err(e) = store.record_run("crawl", &target, started_at, &stats).await {
        warn!(error = %e, "failed to record crawl run");
    }
}
