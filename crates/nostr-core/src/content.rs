//! Small content helpers: subjects, hashtags, reposts.

use crate::event::{Event, KIND_REPOST};
use regex::Regex;
use std::sync::LazyLock;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#(\w+)").expect("hashtag pattern is valid"));

/// NIP-14 subject line, if present and non-blank.
pub fn subject(event: &Event) -> Option<&str> {
    event
        .first_tag_value("subject")
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Hashtags in order of first appearance, lowercased and without `#`.
pub fn hashtags(content: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in HASHTAG_RE.captures_iter(content) {
        let tag = caps[1].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Kind 6 repost (NIP-18).
pub fn is_repost(event: &Event) -> bool {
    event.kind == KIND_REPOST
}

/// Id of the reposted note, taken from the first `e` tag.
pub fn reposted_id(event: &Event) -> Option<&str> {
    is_repost(event).then(|| event.first_tag_value("e")).flatten()
}
