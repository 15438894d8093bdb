//! OpenReview submissions adapter (API v2 JSON).

use chrono::{DateTime, Utc};
use paperfeed_shared::{PaperDraft, PaperfeedError, Result, normalize_text};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use super::{PaperSource, SubmissionSource};
use crate::http::{DEFAULT_TIMEOUT, build_client, fetch_text, last_segment};

/// Largest page the notes endpoint serves.
const MAX_PAGE_LIMIT: u32 = 1000;

/// Enumerates venue submissions and resolves forum abstracts.
pub struct OpenReviewSource {
    client: Client,
    api_url: Url,
    forum_url: Url,
    token: Option<String>,
    page_limit: u32,
}

#[derive(Debug, Deserialize)]
struct NotesResponse {
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Debug, Deserialize)]
struct Note {
    id: String,
    #[serde(default)]
    forum: Option<String>,
    #[serde(default)]
    pdate: Option<i64>,
    #[serde(default)]
    cdate: Option<i64>,
    #[serde(default)]
    content: NoteContent,
}

#[derive(Debug, Default, Deserialize)]
struct NoteContent {
    title: Option<Field<String>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<Field<String>>,
    authors: Option<Field<Vec<String>>>,
    keywords: Option<Field<Vec<String>>>,
}

/// API v2 wraps every content value as `{"value": ...}`.
#[derive(Debug, Deserialize)]
struct Field<T> {
    value: T,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    id: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl OpenReviewSource {
    /// `token`, when present, is sent as a bearer credential on every request.
    pub fn new(api_url: &str, forum_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            api_url: parse_base(api_url, "OpenReview API URL")?,
            forum_url: parse_base(forum_url, "OpenReview forum URL")?,
            token,
            page_limit: MAX_PAGE_LIMIT,
        })
    }

    /// Exchange account credentials for a token, then build the adapter.
    #[instrument(skip(password))]
    pub async fn login(
        api_url: &str,
        forum_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let mut source = Self::new(api_url, forum_url, None)?;
        let endpoint = source.endpoint("login")?;

        let request = source.client.post(endpoint).json(&LoginRequest {
            id: username,
            password,
        });
        let body = fetch_text(request, "OpenReview login").await?;
        let response: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| PaperfeedError::parse(format!("OpenReview login response: {e}")))?;

        info!("logged in to OpenReview");
        source.token = Some(response.token);
        Ok(source)
    }

    /// Override the page size used when enumerating a venue.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| PaperfeedError::config(format!("bad OpenReview endpoint {path:?}: {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn notes(&self, params: &[(&str, String)]) -> Result<Vec<Note>> {
        let request = self.authorize(self.client.get(self.endpoint("notes")?).query(params));
        let body = fetch_text(request, "OpenReview notes").await?;
        let response: NotesResponse = serde_json::from_str(&body)
            .map_err(|e| PaperfeedError::parse(format!("OpenReview notes: {e}")))?;
        Ok(response.notes)
    }

    fn forum_link(&self, note: &Note) -> String {
        let forum = note.forum.as_deref().unwrap_or(&note.id);
        let mut url = self.forum_url.clone();
        url.set_path("forum");
        url.query_pairs_mut().clear().append_pair("id", forum);
        url.to_string()
    }

    fn to_draft(&self, note: Note, venue: &str) -> PaperDraft {
        let published = note
            .pdate
            .or(note.cdate)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let url = self.forum_link(&note);
        let content = note.content;

        PaperDraft {
            title: content.title.map(|f| f.value).unwrap_or_default(),
            abstract_text: content.abstract_text.map(|f| f.value).unwrap_or_default(),
            url,
            authors: content.authors.map(|f| f.value).unwrap_or_default(),
            published,
            source: venue.to_string(),
            keywords: content.keywords.map(|f| f.value).unwrap_or_default(),
            category: String::new(),
        }
    }
}

impl PaperSource for OpenReviewSource {
    fn name(&self) -> &str {
        "openreview"
    }

    #[instrument(skip(self))]
    async fn fetch_abstract(&self, reference: &str) -> Result<String> {
        let id = forum_id(reference).ok_or_else(|| {
            PaperfeedError::validation(format!("no OpenReview forum id in {reference:?}"))
        })?;

        let notes = self.notes(&[("id", id.clone())]).await?;
        notes
            .into_iter()
            .next()
            .and_then(|n| n.content.abstract_text)
            .map(|f| normalize_text(&f.value))
            .ok_or_else(|| PaperfeedError::parse(format!("OpenReview has no abstract for {id}")))
    }
}

impl SubmissionSource for OpenReviewSource {
    #[instrument(skip(self))]
    async fn fetch_submissions(&self, collection_id: &str) -> Result<Vec<PaperDraft>> {
        let mut drafts = Vec::new();
        let mut offset = 0u32;

        loop {
            let page = self
                .notes(&[
                    ("content.venueid", collection_id.to_string()),
                    ("offset", offset.to_string()),
                    ("limit", self.page_limit.to_string()),
                ])
                .await?;
            let count = page.len() as u32;
            debug!(offset, count, "notes page received");

            drafts.extend(page.into_iter().map(|n| self.to_draft(n, collection_id)));

            if count < self.page_limit {
                break;
            }
            offset += self.page_limit;
        }

        info!(venue = collection_id, submissions = drafts.len(), "venue enumerated");
        Ok(drafts)
    }
}

fn parse_base(raw: &str, what: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| PaperfeedError::config(format!("invalid {what} {raw:?}: {e}")))
}

/// `https://openreview.net/forum?id=abc` → `abc`; bare ids pass through.
fn forum_id(reference: &str) -> Option<String> {
    if let Ok(url) = Url::parse(reference.trim()) {
        if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "id") {
            return Some(id.into_owned()).filter(|id| !id.is_empty());
        }
        return url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|s| !s.is_empty() && s != "forum");
    }
    last_segment(reference).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VENUE: &str = "ICLR.cc/2024/Conference";

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/json/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn source(server: &MockServer, token: Option<&str>) -> OpenReviewSource {
        OpenReviewSource::new(
            &server.uri(),
            "https://openreview.net",
            token.map(String::from),
        )
        .unwrap()
    }

    #[test]
    fn forum_id_from_urls_and_bare_ids() {
        assert_eq!(
            forum_id("https://openreview.net/forum?id=aB3xQ9kLm2").as_deref(),
            Some("aB3xQ9kLm2")
        );
        assert_eq!(
            forum_id("https://openreview.net/pdf/aB3xQ9kLm2").as_deref(),
            Some("aB3xQ9kLm2")
        );
        assert_eq!(forum_id("aB3xQ9kLm2").as_deref(), Some("aB3xQ9kLm2"));
        assert_eq!(forum_id("https://openreview.net/forum"), None);
    }

    #[tokio::test]
    async fn maps_notes_to_drafts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes"))
            .and(query_param("content.venueid", VENUE))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "1000"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("openreview_notes.json")))
            .expect(1)
            .mount(&server)
            .await;

        let drafts = source(&server, Some("secret-token"))
            .fetch_submissions(VENUE)
            .await
            .expect("submissions");
        assert_eq!(drafts.len(), 2);

        let first = drafts[0].normalize().unwrap();
        assert_eq!(first.url, "https://openreview.net/forum?id=aB3xQ9kLm2");
        assert_eq!(first.title, "Learning Rate Warmup Revisited");
        assert_eq!(first.authors, "Maria Garcia, Tom Becker");
        assert_eq!(first.keywords, "optimization, warmup");
        assert_eq!(first.source, VENUE);
        assert_eq!(first.date_published.to_string(), "2024-01-19");
        assert!(first.category.is_empty());

        let second = drafts[1].normalize().unwrap();
        assert_eq!(second.date_published.to_string(), "2023-09-22");
        assert!(second.keywords.is_empty());
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let server = MockServer::start().await;
        let note = |id: &str| {
            json!({
                "id": id,
                "forum": id,
                "pdate": 1705622400000i64,
                "content": { "title": { "value": id }, "abstract": { "value": "x" } }
            })
        };
        Mock::given(method("GET"))
            .and(path("/notes"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "notes": [note("a"), note("b")] })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/notes"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "notes": [note("c")] })))
            .expect(1)
            .mount(&server)
            .await;

        let drafts = source(&server, None)
            .with_page_limit(2)
            .fetch_submissions(VENUE)
            .await
            .unwrap();
        let titles: Vec<_> = drafts.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn note_without_dates_fails_normalization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "notes": [{ "id": "n1", "content": { "title": { "value": "Undated" } } }]
            })))
            .mount(&server)
            .await;

        let drafts = source(&server, None).fetch_submissions(VENUE).await.unwrap();
        let err = drafts[0].normalize().unwrap_err();
        assert!(err.is_soft_skip());
    }

    #[tokio::test]
    async fn forbidden_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = source(&server, None).fetch_submissions(VENUE).await.unwrap_err();
        assert!(matches!(err, PaperfeedError::Network(_)));
    }

    #[tokio::test]
    async fn login_exchanges_credentials_for_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(json!({ "id": "me@example.org", "password": "hunter2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/notes"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "notes": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let source = OpenReviewSource::login(
            &server.uri(),
            "https://openreview.net",
            "me@example.org",
            "hunter2",
        )
        .await
        .expect("login");
        assert!(source.is_authenticated());
        assert!(source.fetch_submissions(VENUE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_abstract_by_forum_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes"))
            .and(query_param("id", "aB3xQ9kLm2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("openreview_notes.json")))
            .mount(&server)
            .await;

        let text = source(&server, None)
            .fetch_abstract("https://openreview.net/forum?id=aB3xQ9kLm2")
            .await
            .unwrap();
        assert_eq!(text, "We revisit warmup schedules for adaptive optimizers.");
    }

    #[tokio::test]
    async fn fetch_abstract_missing_note_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "notes": [] })))
            .mount(&server)
            .await;

        let err = source(&server, None).fetch_abstract("nope").await.unwrap_err();
        assert!(matches!(err, PaperfeedError::Parse { .. }));
    }
}
