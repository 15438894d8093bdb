//! Shared HTTP plumbing for source adapters.

use std::time::Duration;

use paperfeed_shared::{PaperfeedError, Result};
use reqwest::{Client, RequestBuilder};
use tracing::debug;

/// User-Agent string for source requests.
pub const USER_AGENT: &str = concat!("paperfeed/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout. The core imposes none of its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client adapters share.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| PaperfeedError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send `request` and return the body, treating non-2xx as a network error.
pub(crate) async fn fetch_text(request: RequestBuilder, what: &str) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| PaperfeedError::Network(format!("{what}: {e}")))?;

    let status = response.status();
    debug!(what, status = status.as_u16(), "response received");

    if !status.is_success() {
        return Err(PaperfeedError::Network(format!("{what}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| PaperfeedError::Network(format!("{what}: body read failed: {e}")))
}

/// Last non-empty path segment of a URL or bare identifier.
///
/// `https://www.nature.com/articles/s41586-023-06735-9/` → `s41586-023-06735-9`.
pub(crate) fn last_segment(reference: &str) -> Option<&str> {
    reference
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment_of_urls_and_ids() {
        assert_eq!(
            last_segment("https://www.nature.com/articles/s41586-023-06735-9"),
            Some("s41586-023-06735-9")
        );
        assert_eq!(last_segment("http://arxiv.org/abs/2403.00801v1/"), Some("2403.00801v1"));
        assert_eq!(last_segment("2403.00801"), Some("2403.00801"));
        assert_eq!(last_segment("  "), None);
    }

    #[test]
    fn client_builds() {
        assert!(build_client(DEFAULT_TIMEOUT).is_ok());
    }
}
