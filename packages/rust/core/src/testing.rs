//! In-memory sources and temp stores shared by controller tests.

use std::sync::Mutex;

use paperfeed_shared::{PaperDraft, PaperfeedError, Result};
use paperfeed_sources::{ListingSource, PaperSource, SubmissionSource};
use paperfeed_storage::PaperStore;

pub fn temp_db() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("pf_core_{}.db", uuid::Uuid::now_v7()))
}

pub async fn temp_store() -> PaperStore {
    PaperStore::open(&temp_db()).await.expect("open test db")
}

pub fn draft(id: &str, published: &str, category: &str, abstract_text: &str) -> PaperDraft {
    PaperDraft {
        title: format!("Paper {id}"),
        abstract_text: abstract_text.into(),
        url: format!("http://arxiv.org/abs/{id}"),
        authors: vec!["Jane Doe".into()],
        published: published.into(),
        source: "arxiv".into(),
        keywords: Vec::new(),
        category: category.into(),
    }
}

/// Serves fixed pages and records every requested offset.
pub struct FakeListing {
    pages: Vec<Vec<PaperDraft>>,
    fail_at: Option<u32>,
    pub offsets: Mutex<Vec<u32>>,
}

impl FakeListing {
    pub fn new(pages: Vec<Vec<PaperDraft>>) -> Self {
        Self {
            pages,
            fail_at: None,
            offsets: Mutex::new(Vec::new()),
        }
    }

    /// Fail with a network error when `offset` is requested.
    pub fn failing_at(mut self, offset: u32) -> Self {
        self.fail_at = Some(offset);
        self
    }

    pub fn requested(&self) -> Vec<u32> {
        self.offsets.lock().unwrap().clone()
    }
}

impl PaperSource for FakeListing {
    fn name(&self) -> &str {
        "fake-listing"
    }

    async fn fetch_abstract(&self, _reference: &str) -> Result<String> {
        Err(PaperfeedError::unsupported(self.name(), "abstract fetch"))
    }
}

impl ListingSource for FakeListing {
    async fn fetch_page(&self, offset: u32, page_size: u32) -> Result<Vec<PaperDraft>> {
        self.offsets.lock().unwrap().push(offset);
        if self.fail_at == Some(offset) {
            return Err(PaperfeedError::Network("connection reset".into()));
        }
        let index = (offset / page_size) as usize;
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

/// Returns a fixed collection, or a network error.
pub struct FakeSubmissions {
    drafts: Vec<PaperDraft>,
    fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSubmissions {
    pub fn new(drafts: Vec<PaperDraft>) -> Self {
        Self {
            drafts,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }
}

impl SubmissionSource for FakeSubmissions {
    async fn fetch_submissions(&self, collection_id: &str) -> Result<Vec<PaperDraft>> {
        self.calls.lock().unwrap().push(collection_id.to_string());
        if self.fail {
            return Err(PaperfeedError::Network("HTTP 503".into()));
        }
        Ok(self.drafts.clone())
    }
}
