//! Nature article scrape adapter.

use std::sync::LazyLock;

use paperfeed_shared::{PaperfeedError, Result, normalize_text};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::instrument;
use url::Url;

use super::PaperSource;
use crate::http::{DEFAULT_TIMEOUT, build_client, fetch_text, last_segment};

static DIV_WITH_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[id]").expect("valid selector"));

/// Nature numbers its sections; the abstract body is `Abs<n>-content`.
static ABSTRACT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Abs\d+-content$").expect("valid regex"));

/// Scrapes the abstract block from a Nature article page.
pub struct NatureSource {
    client: Client,
    base_url: Url,
}

impl NatureSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            PaperfeedError::config(format!("invalid Nature base URL {base_url:?}: {e}"))
        })?;
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url,
        })
    }

    fn article_url(&self, id: &str) -> Result<Url> {
        self.base_url
            .join(&format!("articles/{id}"))
            .map_err(|e| PaperfeedError::validation(format!("bad Nature article id {id:?}: {e}")))
    }
}

impl PaperSource for NatureSource {
    fn name(&self) -> &str {
        "nature"
    }

    #[instrument(skip(self))]
    async fn fetch_abstract(&self, reference: &str) -> Result<String> {
        let id = last_segment(reference).ok_or_else(|| {
            PaperfeedError::validation(format!("no Nature article id in {reference:?}"))
        })?;
        let url = self.article_url(id)?;

        let body = fetch_text(self.client.get(url.clone()), url.as_str()).await?;
        extract_abstract(&body)
            .ok_or_else(|| PaperfeedError::parse(format!("no abstract region in {url}")))
    }
}

/// Inner text of the first `Abs<n>-content` block.
fn extract_abstract(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&DIV_WITH_ID)
        .find(|el| el.value().id().is_some_and(|id| ABSTRACT_ID.is_match(id)))
        .map(|el| normalize_text(&el.text().collect::<String>()))
}
