//! Core domain types: the normalized [`Paper`] record and the raw
//! [`PaperDraft`] adapters produce before normalization.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{PaperfeedError, Result};

/// Separator used when joining author names and keywords.
const LIST_SEPARATOR: &str = ", ";

// ---------------------------------------------------------------------------
// Paper
// ---------------------------------------------------------------------------

/// A normalized paper record, as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Title, whitespace-collapsed (no newlines).
    pub title: String,
    /// Abstract, whitespace-collapsed (no newlines).
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Canonical URL. Sole dedup key.
    pub url: String,
    /// Comma-joined author display names.
    pub authors: String,
    /// Publication date (`YYYY-MM-DD`).
    pub date_published: NaiveDate,
    /// Origin tag, e.g. `arxiv` or an OpenReview venue id.
    pub source: String,
    /// Comma-joined keywords; empty when the source provides none.
    #[serde(default)]
    pub keywords: String,
    /// Subject/category tag; empty when the source has no taxonomy.
    #[serde(default)]
    pub category: String,
}

// ---------------------------------------------------------------------------
// PaperDraft
// ---------------------------------------------------------------------------

/// Raw entry as returned by a source adapter, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperDraft {
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub authors: Vec<String>,
    /// Published timestamp as the source wrote it (ISO date or datetime).
    pub published: String,
    pub source: String,
    pub keywords: Vec<String>,
    /// Primary category; empty when the source has none.
    pub category: String,
}

impl PaperDraft {
    /// Normalize into a [`Paper`].
    ///
    /// Fails with [`PaperfeedError::MalformedDate`] when `published` cannot be
    /// reduced to a calendar date.
    pub fn normalize(&self) -> Result<Paper> {
        Ok(Paper {
            title: normalize_text(&self.title),
            abstract_text: normalize_text(&self.abstract_text),
            url: self.url.trim().to_string(),
            authors: join_names(&self.authors),
            date_published: normalize_date(&self.published)?,
            source: self.source.clone(),
            keywords: join_names(&self.keywords),
            category: self.category.trim().to_string(),
        })
    }
}

fn join_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| normalize_text(n))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Collapse every whitespace run (newlines included) into a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a timestamp to the calendar date it was written in.
///
/// Accepts RFC 3339 (`2024-03-01T12:00:00Z`, `2024-03-01T23:30:00-05:00`),
/// naive datetimes with or without a trailing `Z`, and plain dates. The
/// date component is kept as written; no timezone conversion is applied.
pub fn normalize_date(raw: &str) -> Result<NaiveDate> {
    let value = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }

    let stripped = value.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, fmt) {
            return Ok(dt.date());
        }
    }

    NaiveDate::parse_from_str(stripped, "%Y-%m-%d").map_err(|_| PaperfeedError::MalformedDate {
        value: raw.to_string(),
    })
}
