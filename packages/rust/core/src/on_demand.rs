//! On-demand fetch: migrate a whole submission collection into the store.
//!
//! Dedup is replayed against both the store and a previously exported
//! ledger. Every stored paper is committed immediately, so an aborted run
//! keeps what it already wrote.

use std::path::Path;
use std::time::Instant;

use paperfeed_shared::Result;
use paperfeed_sources::SubmissionSource;
use paperfeed_storage::PaperStore;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::ledger;
use crate::progress::ProgressReporter;

/// Counters for one on-demand fetch. Stored as the run's stats.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub collection: String,
    pub submissions: usize,
    pub stored: usize,
    pub skipped_ledger: usize,
    pub skipped_duplicate: usize,
    pub skipped_malformed: usize,
    pub elapsed_ms: u64,
}

/// Fetch every submission of `collection_id` and store the new ones.
///
/// No date window, category filter or keyword filter applies here. The
/// stored papers carry `collection_id` as their source.
#[instrument(skip_all, fields(collection = collection_id, ledger = %ledger_path.display()))]
pub async fn fetch_collection<S: SubmissionSource>(
    source: &S,
    store: &mut PaperStore,
    collection_id: &str,
    ledger_path: &Path,
    progress: &dyn ProgressReporter,
) -> Result<FetchReport> {
    let start = Instant::now();

    progress.phase("Reading ledger");
    let exclusions = ledger::load_exclusions(ledger_path)?;

    let run_id = store.start_run("fetch", collection_id).await?;

    progress.phase("Fetching submissions");
    let drafts = source.fetch_submissions(collection_id).await?;
    let total = drafts.len();
    info!(submissions = total, excluded = exclusions.len(), "collection fetched");

    let mut report = FetchReport {
        collection: collection_id.to_string(),
        submissions: total,
        stored: 0,
        skipped_ledger: 0,
        skipped_duplicate: 0,
        skipped_malformed: 0,
        elapsed_ms: 0,
    };

    progress.phase("Storing submissions");
    for (i, draft) in drafts.iter().enumerate() {
        progress.item_processed(&draft.url, i + 1, total);

        let mut paper = match draft.normalize() {
            Ok(paper) => paper,
            Err(e) if e.is_soft_skip() => {
                warn!(url = %draft.url, error = %e, "skipping submission");
                report.skipped_malformed += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        paper.source = collection_id.to_string();

        if exclusions.contains(&paper.url) {
            debug!(url = %paper.url, "already in ledger");
            report.skipped_ledger += 1;
            continue;
        }
        if !store.append(paper) {
            report.skipped_duplicate += 1;
            continue;
        }

        store.commit().await?;
        report.stored += 1;
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;
    match serde_json::to_string(&report) {
        Ok(stats) => {
            if let Err(e) = store.finish_run(&run_id, &stats).await {
                warn!(run_id, error = %e, "failed to record fetch run");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize fetch stats"),
    }

    info!(
        stored = report.stored,
        skipped_ledger = report.skipped_ledger,
        skipped_duplicate = report.skipped_duplicate,
        elapsed_ms = report.elapsed_ms,
        "on-demand fetch complete"
    );

    Ok(report)
}
