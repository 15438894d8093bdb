//! Source adapter traits and the built-in adapters.
//!
//! Every source answers [`PaperSource`]. A listing source additionally pages
//! through a reverse-chronological feed ([`ListingSource`]); a submission
//! source enumerates a whole collection at once ([`SubmissionSource`]).

mod arxiv;
mod nature;
mod openreview;

use paperfeed_shared::{AppConfig, PaperDraft, PaperfeedError, Result};
use url::Url;

pub use arxiv::ArxivSource;
pub use nature::NatureSource;
pub use openreview::OpenReviewSource;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Capabilities every source offers for a single paper.
#[allow(async_fn_in_trait)]
pub trait PaperSource {
    /// Short name for tracing and error messages.
    fn name(&self) -> &str;

    /// Abstract text for an opaque reference (URL or id).
    async fn fetch_abstract(&self, reference: &str) -> Result<String>;

    /// Full document text. Sources decline with [`PaperfeedError::Unsupported`].
    async fn fetch_full_text(&self, _reference: &str) -> Result<String> {
        Err(PaperfeedError::unsupported(self.name(), "full-text fetch"))
    }
}

/// A paginated feed sorted by submission date, newest first.
#[allow(async_fn_in_trait)]
pub trait ListingSource: PaperSource {
    /// Up to `page_size` entries starting at `offset`. An empty page means
    /// the feed is exhausted.
    async fn fetch_page(&self, offset: u32, page_size: u32) -> Result<Vec<PaperDraft>>;
}

/// A finite collection returned in full.
#[allow(async_fn_in_trait)]
pub trait SubmissionSource {
    /// Every submission in `collection_id`, in source order.
    async fn fetch_submissions(&self, collection_id: &str) -> Result<Vec<PaperDraft>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A borrowed adapter picked by [`SourceRegistry::detect`].
pub enum AnySource<'a> {
    Arxiv(&'a ArxivSource),
    Nature(&'a NatureSource),
    OpenReview(&'a OpenReviewSource),
}

impl PaperSource for AnySource<'_> {
    fn name(&self) -> &str {
        match self {
            Self::Arxiv(s) => s.name(),
            Self::Nature(s) => s.name(),
            Self::OpenReview(s) => s.name(),
        }
    }

    async fn fetch_abstract(&self, reference: &str) -> Result<String> {
        match self {
            Self::Arxiv(s) => s.fetch_abstract(reference).await,
            Self::Nature(s) => s.fetch_abstract(reference).await,
            Self::OpenReview(s) => s.fetch_abstract(reference).await,
        }
    }

    async fn fetch_full_text(&self, reference: &str) -> Result<String> {
        match self {
            Self::Arxiv(s) => s.fetch_full_text(reference).await,
            Self::Nature(s) => s.fetch_full_text(reference).await,
            Self::OpenReview(s) => s.fetch_full_text(reference).await,
        }
    }
}

/// Holds one configured adapter per known host.
pub struct SourceRegistry {
    arxiv: ArxivSource,
    nature: NatureSource,
    openreview: OpenReviewSource,
}

impl SourceRegistry {
    pub fn new(arxiv: ArxivSource, nature: NatureSource, openreview: OpenReviewSource) -> Self {
        Self {
            arxiv,
            nature,
            openreview,
        }
    }

    /// Build every adapter from config. OpenReview is anonymous here; public
    /// notes do not need a token.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            ArxivSource::from_config(config)?,
            NatureSource::new(&config.nature.base_url)?,
            OpenReviewSource::new(
                &config.openreview.api_url,
                &config.openreview.forum_url,
                None,
            )?,
        ))
    }

    /// Pick the adapter for a paper URL by host.
    pub fn detect(&self, reference: &str) -> Result<AnySource<'_>> {
        let url = Url::parse(reference.trim()).map_err(|e| {
            PaperfeedError::validation(format!("expected a paper URL, got {reference:?}: {e}"))
        })?;
        let host = url.host_str().unwrap_or("");

        if host_matches(host, "arxiv.org") {
            Ok(AnySource::Arxiv(&self.arxiv))
        } else if host_matches(host, "nature.com") {
            Ok(AnySource::Nature(&self.nature))
        } else if host_matches(host, "openreview.net") {
            Ok(AnySource::OpenReview(&self.openreview))
        } else {
            Err(PaperfeedError::validation(format!(
                "no source handles host {host:?}"
            )))
        }
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SourceRegistry {
        SourceRegistry::from_config(&AppConfig::default()).expect("registry")
    }

    #[test]
    fn detects_by_host() {
        let registry = registry();
        let cases = [
            ("http://arxiv.org/abs/2403.00801v1", "arxiv"),
            ("https://export.arxiv.org/abs/2403.00801", "arxiv"),
            ("https://www.nature.com/articles/s41586-023-06735-9", "nature"),
            ("https://openreview.net/forum?id=aB3xQ9kLm2", "openreview"),
        ];
        for (url, expected) in cases {
            let source = registry.detect(url).expect("detect");
            assert_eq!(source.name(), expected, "{url}");
        }
    }

    #[test]
    fn rejects_unknown_hosts_and_bare_ids() {
        let registry = registry();
        assert!(registry.detect("https://example.com/paper/1").is_err());
        assert!(registry.detect("https://notarxiv.org/abs/1").is_err());
        assert!(registry.detect("2403.00801").is_err());
    }

    #[tokio::test]
    async fn full_text_is_unsupported_everywhere() {
        let registry = registry();
        for url in [
            "http://arxiv.org/abs/2403.00801v1",
            "https://www.nature.com/articles/s41586-023-06735-9",
            "https://openreview.net/forum?id=aB3xQ9kLm2",
        ] {
            let source = registry.detect(url).unwrap();
            let err = source.fetch_full_text(url).await.unwrap_err();
            assert!(err.is_unsupported(), "{url}: {err}");
        }
    }
}
