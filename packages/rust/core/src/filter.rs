//! Admission filters applied by the windowed crawl.

use std::collections::BTreeSet;

/// Whether `abstract_text` mentions any excluded keyword, ignoring case.
pub fn should_skip(abstract_text: &str, exclusions: &[String]) -> bool {
    let haystack = abstract_text.to_lowercase();
    exclusions
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| haystack.contains(&k))
}

/// Whether `category` is in the interest set. An empty set admits nothing.
pub fn in_interest_set(category: &str, interests: &BTreeSet<String>) -> bool {
    interests.contains(category)
}
