//! arXiv listing adapter (Atom query API).

use std::collections::BTreeSet;

use paperfeed_shared::{AppConfig, PaperDraft, PaperfeedError, Result, normalize_text};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{ListingSource, PaperSource};
use crate::atom::{self, AtomEntry};
use crate::http::{DEFAULT_TIMEOUT, build_client, fetch_text};

/// Origin tag stamped on every arXiv entry.
const SOURCE_TAG: &str = "arxiv";

/// Lists recent submissions in a set of categories, newest first.
pub struct ArxivSource {
    client: Client,
    endpoint: Url,
    /// Sorted for a stable query string.
    categories: BTreeSet<String>,
}

impl ArxivSource {
    pub fn new(endpoint: &str, categories: impl IntoIterator<Item = String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            PaperfeedError::config(format!("invalid arXiv endpoint {endpoint:?}: {e}"))
        })?;
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            endpoint,
            categories: categories.into_iter().collect(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.arxiv.endpoint, config.arxiv.categories.iter().cloned())
    }

    /// `cat:cs.AI OR cat:cs.LG`
    fn category_query(&self) -> String {
        self.categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Vec<AtomEntry>> {
        let request = self.client.get(self.endpoint.clone()).query(params);
        let body = fetch_text(request, "arXiv query").await?;
        atom::parse_feed(&body)
    }
}

impl PaperSource for ArxivSource {
    fn name(&self) -> &str {
        SOURCE_TAG
    }

    #[instrument(skip(self))]
    async fn fetch_abstract(&self, reference: &str) -> Result<String> {
        let id = arxiv_id(reference).ok_or_else(|| {
            PaperfeedError::validation(format!("no arXiv id in {reference:?}"))
        })?;

        let entries = self
            .query(&[
                ("search_query", format!("id:{id}")),
                ("sortBy", "submittedDate".into()),
                ("sortOrder", "descending".into()),
                ("max_results", "1".into()),
            ])
            .await?;

        entries
            .into_iter()
            .next()
            .map(|e| normalize_text(&e.summary))
            .ok_or_else(|| PaperfeedError::parse(format!("arXiv returned no entry for {id}")))
    }
}

impl ListingSource for ArxivSource {
    #[instrument(skip(self))]
    async fn fetch_page(&self, offset: u32, page_size: u32) -> Result<Vec<PaperDraft>> {
        if self.categories.is_empty() {
            warn!("no arXiv categories configured; listing is empty");
            return Ok(Vec::new());
        }

        let entries = self
            .query(&[
                ("search_query", self.category_query()),
                ("start", offset.to_string()),
                ("max_results", page_size.to_string()),
                ("sortBy", "submittedDate".into()),
                ("sortOrder", "descending".into()),
            ])
            .await?;

        debug!(entries = entries.len(), "listing page parsed");
        Ok(entries.iter().map(to_draft).collect())
    }
}

/// Identifier from an abstract or PDF URL, an `arXiv:` reference or a bare
/// id. Old-style ids keep their archive prefix (`hep-th/9901001`).
fn arxiv_id(reference: &str) -> Option<String> {
    let reference = reference.trim();
    let id = match Url::parse(reference)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
    {
        Some(url) => {
            let path = url.path().trim_matches('/');
            let id = ["abs/", "pdf/"].iter().find_map(|p| path.strip_prefix(p))?;
            id.to_string()
        }
        None => reference.strip_prefix("arXiv:").unwrap_or(reference).to_string(),
    };

    let id = id.trim_end_matches('/');
    let id = id.strip_suffix(".pdf").unwrap_or(id);
    (!id.is_empty()).then(|| id.to_string())
}

fn to_draft(entry: &AtomEntry) -> PaperDraft {
    PaperDraft {
        title: entry.title.clone(),
        abstract_text: entry.summary.clone(),
        url: entry.url().to_string(),
        authors: entry.authors.clone(),
        published: entry.published.clone(),
        source: SOURCE_TAG.into(),
        keywords: Vec::new(),
        category: entry.category().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/atom/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn source(server: &MockServer, categories: &[&str]) -> ArxivSource {
        ArxivSource::new(
            &format!("{}/api/query", server.uri()),
            categories.iter().map(|c| c.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn category_query_is_sorted_or_expression() {
        let source = ArxivSource::new(
            "http://export.arxiv.org/api/query",
            ["cs.LG".to_string(), "cs.AI".to_string()],
        )
        .unwrap();
        assert_eq!(source.category_query(), "cat:cs.AI OR cat:cs.LG");
    }

    #[test]
    fn arxiv_id_forms() {
        assert_eq!(arxiv_id("http://arxiv.org/abs/2403.00801v1").as_deref(), Some("2403.00801v1"));
        assert_eq!(arxiv_id("https://arxiv.org/abs/hep-th/9901001").as_deref(), Some("hep-th/9901001"));
        assert_eq!(arxiv_id("https://arxiv.org/pdf/2403.00801v1.pdf").as_deref(), Some("2403.00801v1"));
        assert_eq!(arxiv_id("https://arxiv.org/pdf/math.GT/0309136v1/").as_deref(), Some("math.GT/0309136v1"));
        assert_eq!(arxiv_id("arXiv:2403.00801").as_deref(), Some("2403.00801"));
        assert_eq!(arxiv_id(" hep-th/9901001 ").as_deref(), Some("hep-th/9901001"));
        assert_eq!(arxiv_id("https://arxiv.org/list/cs.LG/recent"), None);
        assert_eq!(arxiv_id("https://arxiv.org/abs/"), None);
        assert_eq!(arxiv_id("   "), None);
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        let err = ArxivSource::new("not a url", Vec::new()).err().unwrap();
        assert!(matches!(err, PaperfeedError::Config { .. }));
    }

    #[tokio::test]
    async fn fetch_page_sends_listing_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "cat:cs.AI OR cat:cs.LG"))
            .and(query_param("start", "200"))
            .and(query_param("max_results", "100"))
            .and(query_param("sortBy", "submittedDate"))
            .and(query_param("sortOrder", "descending"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("arxiv_listing.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let drafts = source(&server, &["cs.LG", "cs.AI"])
            .fetch_page(200, 100)
            .await
            .expect("page");

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].url, "http://arxiv.org/abs/2403.00801v1");
        assert_eq!(drafts[0].source, "arxiv");
        assert_eq!(drafts[0].category, "cs.LG");
        assert_eq!(drafts[1].category, "cs.DB");

        let paper = drafts[0].normalize().unwrap();
        assert_eq!(paper.date_published.to_string(), "2024-03-01");
        assert_eq!(paper.title, "Sparse Mixtures of Experts for Tabular Data");
        assert_eq!(paper.authors, "Jane Doe, Wei Zhang");
    }

    #[tokio::test]
    async fn empty_categories_skip_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let drafts = source(&server, &[]).fetch_page(0, 100).await.unwrap();
        assert!(drafts.is_empty());
    }

    #[tokio::test]
    async fn http_failure_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source(&server, &["cs.LG"]).fetch_page(0, 100).await.unwrap_err();
        assert!(matches!(err, PaperfeedError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fetch_abstract_queries_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "id:2403.00801v1"))
            .and(query_param("max_results", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("arxiv_listing.xml")))
            .mount(&server)
            .await;

        let text = source(&server, &["cs.LG"])
            .fetch_abstract("http://arxiv.org/abs/2403.00801v1")
            .await
            .expect("abstract");
        assert_eq!(
            text,
            "We study sparse mixtures of experts for tabular learning & show that routing improves calibration."
        );
    }

    #[tokio::test]
    async fn fetch_abstract_keeps_old_style_archive_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "id:hep-th/9901001"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("arxiv_listing.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let text = source(&server, &["hep-th"])
            .fetch_abstract("https://arxiv.org/abs/hep-th/9901001")
            .await
            .expect("abstract");
        assert!(text.starts_with("We study sparse mixtures of experts"));
    }

    #[tokio::test]
    async fn fetch_abstract_accepts_pdf_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "id:2403.00801v1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("arxiv_listing.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let text = source(&server, &["cs.LG"])
            .fetch_abstract("https://arxiv.org/pdf/2403.00801v1.pdf")
            .await
            .expect("abstract");
        assert!(text.ends_with("routing improves calibration."));
    }

    #[tokio::test]
    async fn fetch_abstract_rejects_reference_without_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = source(&server, &["cs.LG"])
            .fetch_abstract("https://arxiv.org/list/cs.LG/recent")
            .await
            .unwrap_err();
        assert!(matches!(err, PaperfeedError::Validation { .. }));
    }

    #[tokio::test]
    async fn fetch_abstract_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("arxiv_error.xml")))
            .mount(&server)
            .await;

        let err = source(&server, &["cs.LG"])
            .fetch_abstract("http://arxiv.org/abs/bogus")
            .await
            .unwrap_err();
        assert!(matches!(err, PaperfeedError::Parse { .. }));
    }
}
