//! Flat-text ledger of exported papers.
//!
//! One paper per line, `|`-delimited:
//! `title|authors|url|date_published|source`. Field 2 (the URL) is the only
//! field read back.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use paperfeed_shared::{Paper, PaperfeedError, Result};
use paperfeed_storage::PaperStore;
use tracing::{debug, info};

const DELIMITER: char = '|';

/// Index of the URL field.
const URL_FIELD: usize = 2;

/// URLs already recorded in the ledger at `path`. A missing file is empty.
pub fn load_exclusions(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        debug!(?path, "no ledger yet");
        return Ok(HashSet::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| PaperfeedError::io(path, e))?;
    let urls: HashSet<String> = content.lines().filter_map(url_of_line).collect();

    debug!(?path, urls = urls.len(), "ledger loaded");
    Ok(urls)
}

fn url_of_line(line: &str) -> Option<String> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() <= URL_FIELD {
        return None;
    }
    let url = fields[URL_FIELD].trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Render one ledger line (no trailing newline).
pub fn format_line(paper: &Paper) -> String {
    [
        clean(&paper.title),
        clean(&paper.authors),
        clean(&paper.url),
        paper.date_published.format("%Y-%m-%d").to_string(),
        clean(&paper.source),
    ]
    .join("|")
}

/// Field text with the delimiter replaced so lines stay splittable.
fn clean(field: &str) -> String {
    field.replace(DELIMITER, "/")
}

/// Append `papers` to the ledger at `path`, creating it if needed.
/// Returns the number of lines written.
pub fn append_papers(path: &Path, papers: &[Paper]) -> Result<usize> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| PaperfeedError::io(dir, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PaperfeedError::io(path, e))?;

    for paper in papers {
        writeln!(file, "{}", format_line(paper)).map_err(|e| PaperfeedError::io(path, e))?;
    }

    Ok(papers.len())
}

/// Append every stored paper published on `date` to the ledger.
pub async fn export_date(store: &PaperStore, date: NaiveDate, path: &Path) -> Result<usize> {
    let papers = store.papers_for_date(date).await?;
    let written = append_papers(path, &papers)?;
    info!(%date, ?path, written, "ledger export complete");
    Ok(written)
}
