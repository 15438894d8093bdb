//! Streaming parser for arXiv's Atom query responses.

use paperfeed_shared::{PaperfeedError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Marker arXiv uses in the `<id>` of error entries.
const API_ERROR_MARKER: &str = "/api/errors";

/// One `<entry>` of an arXiv feed, fields as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomEntry {
    pub id: String,
    /// `<link rel="alternate">` target, when present.
    pub link: Option<String>,
    pub title: String,
    pub summary: String,
    pub published: String,
    pub authors: Vec<String>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
}

impl AtomEntry {
    /// Canonical URL: the alternate link, else the entry id.
    pub fn url(&self) -> &str {
        self.link.as_deref().unwrap_or(&self.id)
    }

    /// Primary category, else the first listed category.
    pub fn category(&self) -> Option<&str> {
        self.primary_category
            .as_deref()
            .or_else(|| self.categories.first().map(String::as_str))
    }
}

/// Parse an Atom feed body into its entries, in document order.
///
/// An arXiv error entry (id under `/api/errors`) is reported as a parse error
/// carrying the API's message.
pub fn parse_feed(body: &str) -> Result<Vec<AtomEntry>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut in_author = false;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"entry" => current = Some(AtomEntry::default()),
                    b"author" => in_author = true,
                    _ => {}
                }
                if let Some(entry) = current.as_mut() {
                    read_attributes(&e, entry);
                }
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    read_attributes(&e, entry);
                }
            }
            Ok(Event::Text(t)) => {
                let chunk = t
                    .unescape()
                    .map_err(|e| PaperfeedError::parse(format!("atom text: {e}")))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(e)) => {
                let value = std::mem::take(&mut text);
                match e.local_name().as_ref() {
                    b"entry" => {
                        if let Some(entry) = current.take() {
                            if entry.id.contains(API_ERROR_MARKER) {
                                return Err(PaperfeedError::parse(format!(
                                    "arXiv API error: {}",
                                    entry.summary.trim()
                                )));
                            }
                            entries.push(entry);
                        }
                    }
                    b"author" => in_author = false,
                    name => {
                        if let Some(entry) = current.as_mut() {
                            match name {
                                b"name" if in_author => entry.authors.push(value),
                                b"id" => entry.id = value,
                                b"title" => entry.title = value,
                                b"summary" => entry.summary = value,
                                b"published" => entry.published = value,
                                _ => {}
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PaperfeedError::parse(format!(
                    "atom feed at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(PaperfeedError::parse("atom feed ended inside an entry"));
    }

    Ok(entries)
}

/// Pick up categories and alternate links from element attributes.
fn read_attributes(e: &BytesStart, entry: &mut AtomEntry) {
    let name = e.local_name();
    match name.as_ref() {
        b"primary_category" => {
            if let Some(term) = attribute(e, b"term") {
                entry.primary_category = Some(term);
            }
        }
        b"category" => {
            if let Some(term) = attribute(e, b"term") {
                entry.categories.push(term);
            }
        }
        b"link" => {
            let rel = attribute(e, b"rel");
            if rel.as_deref().is_none_or(|r| r == "alternate") {
                if let Some(href) = attribute(e, b"href") {
                    entry.link = Some(href);
                }
            }
        }
        _ => {}
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
