//! Paper source adapters for paperfeed.
//!
//! Each adapter talks to one external catalogue and hands back raw
//! [`PaperDraft`](paperfeed_shared::PaperDraft)s; normalization and filtering
//! happen in the controllers.

pub mod adapters;
pub mod atom;
pub mod http;

pub use adapters::{
    AnySource, ArxivSource, ListingSource, NatureSource, OpenReviewSource, PaperSource,
    SourceRegistry, SubmissionSource,
};
pub use atom::{AtomEntry, parse_feed};
pub use http::{DEFAULT_TIMEOUT, USER_AGENT, build_client};
